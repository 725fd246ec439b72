//! Gomory mixed-integer cuts from an optimal simplex tableau.
//!
//! For a basic integer column with fractional value, the tableau row
//! `x_v + sum_j alpha_j x_j = 0` over the nonbasic variables of `[A | -I]`
//! is shifted so every nonbasic variable is a nonnegative distance `t_j`
//! from its active bound, and the GMI inequality `sum_j g_j t_j >= 1` is
//! derived. Substituting back (row logicals expand through their rows)
//! gives a cut on the structural columns, stored as `a^T x <= rhs`.
//!
//! Cuts are only globally valid when the tableau comes from the root LP
//! with global bounds.

use solver_core::linalg::factor::BasisFactor;
use solver_core::linalg::sparse::{self, SparseVec};
use solver_core::util::numerics::sparse_dot;
use solver_core::{Basis, BasisStatus, Model};

use crate::master::{CutSource, LinearCut};
use crate::model::MipProblem;

/// Gomory separator settings.
#[derive(Debug, Clone)]
pub struct GomorySettings {
    /// Maximum cuts returned per call.
    pub max_cuts: usize,

    /// Rows whose basic value has fractionality below this are skipped.
    pub min_fractionality: f64,

    /// Largest allowed ratio of absolute cut coefficients.
    pub max_dynamism: f64,

    /// Minimum violation / ||a|| at the LP point.
    pub min_efficacy: f64,
}

impl Default for GomorySettings {
    fn default() -> Self {
        Self {
            max_cuts: 50,
            min_fractionality: 0.005,
            max_dynamism: 1e8,
            min_efficacy: 1e-6,
        }
    }
}

/// Separates GMI cuts from the tableau of an optimal basis.
pub struct GomorySeparator {
    settings: GomorySettings,
}

/// The LP a tableau belongs to, in computational form.
struct Tableau<'a> {
    lp: &'a Model,
    basis: &'a Basis,
    factor: &'a BasisFactor,
    columns: Vec<SparseVec>,
    rows: Vec<SparseVec>,
    /// Values of all n + m variables at the LP solution.
    values: Vec<f64>,
}

impl<'a> Tableau<'a> {
    fn bounds(&self, var: usize) -> (f64, f64) {
        let n = self.lp.num_col();
        if var < n {
            (self.lp.col_lower[var], self.lp.col_upper[var])
        } else {
            (self.lp.row_lower[var - n], self.lp.row_upper[var - n])
        }
    }

    /// Tableau row of basic slot `slot`: alpha_j for every nonbasic j.
    fn row(&self, slot: usize) -> Vec<(usize, f64)> {
        let n = self.lp.num_col();
        let m = self.lp.num_row();
        let mut e = vec![0.0; m];
        e[slot] = 1.0;
        let rho = self.factor.btran(&e);
        (0..n + m)
            .filter(|&j| !self.basis.status(j).is_basic())
            .filter_map(|j| {
                let alpha = if j < n { sparse_dot(&self.columns[j], &rho) } else { -rho[j - n] };
                (alpha.abs() > 1e-11).then_some((j, alpha))
            })
            .collect()
    }
}

impl GomorySeparator {
    pub fn new(settings: GomorySettings) -> Self {
        Self { settings }
    }

    /// Separate cuts violated by the optimal vertex `x` of `lp`.
    ///
    /// `basis` and `factor` must describe the final basis of `lp`, with
    /// factor slot `k` holding `basis.basic_index[k]`.
    pub fn separate(
        &self,
        lp: &Model,
        basis: &Basis,
        factor: &BasisFactor,
        x: &[f64],
        prob: &MipProblem,
    ) -> Vec<LinearCut> {
        let n = lp.num_col();
        let m = lp.num_row();
        if !basis.valid || basis.basic_index.len() != m || factor.dim() != m || x.len() != n {
            return Vec::new();
        }

        let mut values = x.to_vec();
        values.extend(lp.row_activity(x));
        let tableau = Tableau {
            lp,
            basis,
            factor,
            columns: sparse::to_columns(&lp.a_matrix),
            rows: sparse::to_rows(&lp.a_matrix),
            values,
        };

        // Most fractional rows first.
        let mut candidates: Vec<(usize, usize, f64)> = basis
            .basic_index
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v < n && prob.is_integer(v))
            .filter_map(|(slot, &v)| {
                let f0 = x[v] - x[v].floor();
                let min = self.settings.min_fractionality;
                (f0 >= min && f0 <= 1.0 - min).then_some((slot, v, f0))
            })
            .collect();
        candidates.sort_by(|a, b| (a.2 - 0.5).abs().total_cmp(&(b.2 - 0.5).abs()));

        let mut cuts = Vec::new();
        for (slot, var, f0) in candidates {
            if cuts.len() >= self.settings.max_cuts {
                break;
            }
            if let Some(cut) = self.cut_from_row(&tableau, slot, var, f0, prob) {
                cuts.push(cut);
            }
        }
        log::debug!("gomory: {} cuts from {} rows", cuts.len(), m);
        cuts
    }

    fn cut_from_row(
        &self,
        tab: &Tableau<'_>,
        slot: usize,
        var: usize,
        f0: f64,
        prob: &MipProblem,
    ) -> Option<LinearCut> {
        let n = tab.lp.num_col();
        let row = tab.row(slot);

        // The row must reproduce the basic value; otherwise the factor does
        // not belong to this basis.
        let implied: f64 = -row.iter().map(|&(j, a)| a * tab.values[j]).sum::<f64>();
        if (implied - tab.values[var]).abs() > 1e-6 * (1.0 + tab.values[var].abs()) {
            log::debug!("gomory: row of column {} inconsistent ({} vs {})", var, implied, tab.values[var]);
            return None;
        }

        // sum_j coef_j x_j >= rhs
        let mut coef = vec![0.0; n];
        let mut rhs = 1.0;
        for (j, alpha) in row {
            let (lower, upper) = tab.bounds(j);
            let (a, sign, bound) = match tab.basis.status(j) {
                BasisStatus::Fixed => continue,
                _ if lower == upper => continue,
                BasisStatus::AtLower => (alpha, 1.0, lower),
                BasisStatus::AtUpper => (-alpha, -1.0, upper),
                // A free nonbasic column has no bound to measure t_j from.
                BasisStatus::Free | BasisStatus::Basic => return None,
            };
            if !bound.is_finite() {
                return None;
            }

            let g = if j < n && prob.is_integer(j) {
                let fj = a - a.floor();
                if fj <= f0 {
                    fj / f0
                } else {
                    (1.0 - fj) / (1.0 - f0)
                }
            } else if a >= 0.0 {
                a / f0
            } else {
                -a / (1.0 - f0)
            };
            if g == 0.0 {
                continue;
            }

            // t_j = sign * (x_j - bound)
            rhs += g * sign * bound;
            if j < n {
                coef[j] += g * sign;
            } else {
                for &(col, a_ij) in &tab.rows[j - n] {
                    coef[col] += g * sign * a_ij;
                }
            }
        }

        self.finish(tab.lp, coef, rhs, var, &tab.values[..n])
    }

    /// Turn `coef^T x >= rhs` into a clean `<=` cut, or reject it.
    fn finish(&self, lp: &Model, coef: Vec<f64>, rhs: f64, var: usize, x: &[f64]) -> Option<LinearCut> {
        let max_abs = coef.iter().fold(0.0f64, |m, c| m.max(c.abs()));
        if max_abs < 1e-9 {
            return None;
        }

        // -coef^T x <= -rhs; tiny coefficients are moved into the rhs using
        // the column bound that keeps the cut valid.
        let mut beta = -rhs;
        let mut coefs: SparseVec = Vec::new();
        for (j, c) in coef.into_iter().enumerate() {
            let d = -c;
            if d.abs() > 1e-9 * max_abs {
                coefs.push((j, d));
            } else if d != 0.0 {
                let bound = if d > 0.0 { lp.col_lower[j] } else { lp.col_upper[j] };
                if !bound.is_finite() {
                    return None;
                }
                beta -= d * bound;
            }
        }

        let min_abs = coefs.iter().fold(f64::INFINITY, |m, &(_, d)| m.min(d.abs()));
        if coefs.is_empty() || max_abs / min_abs > self.settings.max_dynamism {
            return None;
        }

        let mut cut = LinearCut::new(coefs, beta, CutSource::Gomory { basic_var: var });
        cut.normalize();
        (cut.is_valid() && cut.efficacy(x) >= self.settings.min_efficacy).then_some(cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::{MasterBackend, MasterRequest, MasterStatus, RelaxationMaster};
    use crate::model::integrality;
    use solver_core::SolveContext;

    /// max x0 + x1  s.t.  2 x0 + 2 x1 <= 3,  -x0 + x1 <= 0.5,  x in [0, 5]^2 integer
    fn problem() -> MipProblem {
        let a = sparse::from_triplets(
            2,
            2,
            vec![(0, 0, 2.0), (0, 1, 2.0), (1, 0, -1.0), (1, 1, 1.0)],
        );
        let model = Model::new(
            vec![-1.0, -1.0],
            vec![0.0; 2],
            vec![5.0; 2],
            vec![f64::NEG_INFINITY; 2],
            vec![3.0, 0.5],
            a,
        )
        .with_integrality(integrality(2, &[0, 1]));
        MipProblem::new(&model).unwrap()
    }

    /// Every integer point of the problem.
    fn integer_points(prob: &MipProblem) -> Vec<Vec<f64>> {
        let mut points = Vec::new();
        for a in 0..=5 {
            for b in 0..=5 {
                let x = vec![a as f64, b as f64];
                if prob.is_feasible(&x, 1e-9, 1e-9) {
                    points.push(x);
                }
            }
        }
        points
    }

    #[test]
    fn test_cuts_are_violated_and_valid() {
        let prob = problem();
        let master = RelaxationMaster::new(&prob);
        let ctx = SolveContext::default();
        let r = master.solve(&MasterRequest::new(&[], &[]), &ctx);
        assert_eq!(r.status, MasterStatus::Optimal);
        assert!((r.obj_val + 1.5).abs() < 1e-9);

        let lp = master.node_model(&[], &[]);
        let factor = r.factor.as_ref().unwrap();
        let sep = GomorySeparator::new(GomorySettings::default());
        let cuts = sep.separate(&lp, &r.basis, factor, &r.x, &prob);
        assert!(!cuts.is_empty());

        let points = integer_points(&prob);
        assert!(!points.is_empty());
        for cut in &cuts {
            assert!(cut.is_violated(&r.x, 1e-7));
            for p in &points {
                assert!(cut.violation(p) <= 1e-7, "cut {:?} removes {:?}", cut, p);
            }
        }
    }

    #[test]
    fn test_integral_vertex_gives_no_cuts() {
        // max x0 s.t. x0 <= 2
        let a = sparse::from_triplets(1, 1, vec![(0, 0, 1.0)]);
        let model = Model::new(vec![-1.0], vec![0.0], vec![5.0], vec![f64::NEG_INFINITY], vec![2.0], a)
            .with_integrality(integrality(1, &[0]));
        let prob = MipProblem::new(&model).unwrap();
        let master = RelaxationMaster::new(&prob);
        let r = master.solve(&MasterRequest::new(&[], &[]), &SolveContext::default());
        let lp = master.node_model(&[], &[]);
        let sep = GomorySeparator::new(GomorySettings::default());
        let cuts = sep.separate(&lp, &r.basis, r.factor.as_ref().unwrap(), &r.x, &prob);
        assert!(cuts.is_empty());
    }
}
