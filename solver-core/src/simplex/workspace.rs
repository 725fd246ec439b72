//! Simplex working state in computational form.
//!
//! The LP `min cᵀx, L ≤ Ax ≤ U, l ≤ x ≤ u` is handled as
//!
//! ```text
//! [A  -I] (x, r) = 0,   l ≤ x ≤ u,   L ≤ r ≤ U
//! ```
//!
//! so every row contributes a logical variable `r_i = a_iᵀx` with column
//! `-e_i`. Variables are indexed `0..n` (structurals) then `n..n+m`
//! (logicals). The basis holds `m` variables in slots; nonbasic variables
//! sit at a bound (or at zero when free).

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::context::SolveContext;
use crate::linalg::factor::{BasisFactor, FactorError, UpdateStatus};
use crate::linalg::sparse::{self, SparseVec};
use crate::problem::Model;
use crate::solution::{Basis, BasisStatus};

/// Marker for "not in the basis" in `slot_of`.
pub(crate) const NONBASIC: usize = usize::MAX;

/// Entries of ftran'd columns / pivot rows below this are treated as zero
/// by the ratio tests.
pub(crate) const PIVOT_ZERO: f64 = 1e-9;

/// Attempts at repairing a singular basis before giving up.
const REPAIR_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FactorOutcome {
    Ok,
    Failed,
}

pub(crate) struct SimplexWorkspace<'a> {
    pub ctx: &'a SolveContext,
    pub n: usize,
    pub m: usize,
    /// Columns of `[A -I]`
    pub columns: Vec<SparseVec>,
    /// Working costs (possibly perturbed)
    pub cost: Vec<f64>,
    /// Working bounds (possibly perturbed)
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub orig_cost: Vec<f64>,
    pub orig_lower: Vec<f64>,
    pub orig_upper: Vec<f64>,
    pub x: Vec<f64>,
    /// Reduced costs, zero for basic variables
    pub dual: Vec<f64>,
    pub status: Vec<BasisStatus>,
    pub basic: Vec<usize>,
    pub slot_of: Vec<usize>,
    pub factor: BasisFactor,
    pub iterations: usize,
    pub primal_tol: f64,
    pub dual_tol: f64,
    pub costs_perturbed: bool,
    pub bounds_perturbed: bool,
    pub rng: ChaCha8Rng,
}

impl<'a> SimplexWorkspace<'a> {
    pub fn new(model: &Model, ctx: &'a SolveContext) -> Self {
        let n = model.num_col();
        let m = model.num_row();
        let mut columns = sparse::to_columns(&model.a_matrix);
        columns.extend((0..m).map(|i| vec![(i, -1.0)]));

        let mut cost = model.col_cost.clone();
        cost.extend(std::iter::repeat(0.0).take(m));
        let mut lower = model.col_lower.clone();
        lower.extend_from_slice(&model.row_lower);
        let mut upper = model.col_upper.clone();
        upper.extend_from_slice(&model.row_upper);

        let s = ctx.settings();
        Self {
            ctx,
            n,
            m,
            columns,
            orig_cost: cost.clone(),
            orig_lower: lower.clone(),
            orig_upper: upper.clone(),
            cost,
            lower,
            upper,
            x: vec![0.0; n + m],
            dual: vec![0.0; n + m],
            status: vec![BasisStatus::Basic; n + m],
            basic: Vec::new(),
            slot_of: vec![NONBASIC; n + m],
            factor: BasisFactor::new(m, s),
            iterations: 0,
            primal_tol: s.primal_feasibility_tolerance,
            dual_tol: s.dual_feasibility_tolerance,
            costs_perturbed: false,
            bounds_perturbed: false,
            rng: ChaCha8Rng::seed_from_u64(s.random_seed),
        }
    }

    pub fn num_vars(&self) -> usize {
        self.n + self.m
    }

    /// Install a starting basis, repairing statuses inconsistent with the
    /// bounds and fixing the basic count at `m`.
    pub fn install_basis(&mut self, basis: &Basis) {
        let nt = self.num_vars();
        let usable = basis.num_col() == self.n && basis.num_row() == self.m;
        for v in 0..nt {
            let st = if usable {
                basis.status(v)
            } else if v < self.n {
                BasisStatus::nonbasic_for(self.lower[v], self.upper[v])
            } else {
                BasisStatus::Basic
            };
            self.status[v] = if st.consistent_with(self.lower[v], self.upper[v]) {
                st
            } else {
                BasisStatus::nonbasic_for(self.lower[v], self.upper[v])
            };
        }

        let mut basic: Vec<usize> = if usable && basis.is_consistent() {
            basis.basic_index.clone()
        } else {
            (0..nt).filter(|&v| self.status[v].is_basic()).collect()
        };
        while basic.len() > self.m {
            if let Some(v) = basic.pop() {
                self.status[v] = BasisStatus::nonbasic_for(self.lower[v], self.upper[v]);
            }
        }
        if basic.len() < self.m {
            for i in 0..self.m {
                if basic.len() == self.m {
                    break;
                }
                let v = self.n + i;
                if !self.status[v].is_basic() {
                    self.status[v] = BasisStatus::Basic;
                    basic.push(v);
                }
            }
        }
        self.set_basic(basic);
        for v in 0..nt {
            if !self.status[v].is_basic() {
                self.x[v] = self.status[v].nonbasic_value(self.lower[v], self.upper[v]);
            }
        }
    }

    fn set_basic(&mut self, basic: Vec<usize>) {
        self.slot_of.iter_mut().for_each(|s| *s = NONBASIC);
        for (k, &v) in basic.iter().enumerate() {
            self.slot_of[v] = k;
        }
        self.basic = basic;
    }

    /// Factorize the current basis, swapping rank-deficient slots for
    /// logicals of unpivoted rows.
    pub fn factorize(&mut self) -> FactorOutcome {
        for _ in 0..=REPAIR_ATTEMPTS {
            let cols: Vec<SparseVec> = self.basic.iter().map(|&v| self.columns[v].clone()).collect();
            match self.factor.factorize(&cols) {
                Ok(()) => return FactorOutcome::Ok,
                Err(FactorError::Singular {
                    deficient_slots,
                    free_rows,
                    ..
                }) => {
                    log::debug!("repairing {} singular basis slots", deficient_slots.len());
                    for (&slot, &row) in deficient_slots.iter().zip(&free_rows) {
                        let logical = self.n + row;
                        if self.status[logical].is_basic() {
                            continue;
                        }
                        let out = self.basic[slot];
                        self.make_nonbasic_nearest(out);
                        self.slot_of[out] = NONBASIC;
                        self.basic[slot] = logical;
                        self.slot_of[logical] = slot;
                        self.status[logical] = BasisStatus::Basic;
                    }
                }
                Err(e) => {
                    log::warn!("factorization failed: {}", e);
                    return FactorOutcome::Failed;
                }
            }
        }
        FactorOutcome::Failed
    }

    /// Fresh factorization followed by recomputed primal and dual values.
    pub fn refresh(&mut self) -> FactorOutcome {
        let outcome = self.factorize();
        if outcome == FactorOutcome::Ok {
            self.compute_primal();
            self.compute_dual();
        }
        outcome
    }

    /// Make `v` nonbasic at the bound nearest its current value.
    pub fn make_nonbasic_nearest(&mut self, v: usize) {
        let (l, u) = (self.lower[v], self.upper[v]);
        let st = if l == u {
            BasisStatus::Fixed
        } else if l.is_finite() && u.is_finite() {
            if (self.x[v] - l).abs() <= (u - self.x[v]).abs() {
                BasisStatus::AtLower
            } else {
                BasisStatus::AtUpper
            }
        } else {
            BasisStatus::nonbasic_for(l, u)
        };
        self.status[v] = st;
        self.x[v] = st.nonbasic_value(l, u);
    }

    /// Replace the basis by the slack basis.
    pub fn reset_to_slack(&mut self) {
        let slack = Basis::slack(&self.lower[..self.n], &self.upper[..self.n], self.m);
        self.install_basis(&slack);
    }

    /// Recompute basic values from the nonbasic ones.
    pub fn compute_primal(&mut self) {
        let mut rhs = vec![0.0; self.m];
        for v in 0..self.num_vars() {
            if self.slot_of[v] == NONBASIC && self.x[v] != 0.0 {
                for &(i, a) in &self.columns[v] {
                    rhs[i] -= a * self.x[v];
                }
            }
        }
        let xb = self.factor.ftran(&rhs);
        for (k, &v) in self.basic.iter().enumerate() {
            self.x[v] = xb[k];
        }
    }

    /// Row duals for the given cost vector.
    pub fn row_duals(&self, cost: &[f64]) -> Vec<f64> {
        let cb: Vec<f64> = self.basic.iter().map(|&v| cost[v]).collect();
        self.factor.btran(&cb)
    }

    /// Reduced costs `d = c - [A -I]ᵀ y` for the given cost vector.
    pub fn reduced_costs(&self, cost: &[f64]) -> Vec<f64> {
        let y = self.row_duals(cost);
        (0..self.num_vars())
            .map(|v| {
                if self.slot_of[v] != NONBASIC {
                    0.0
                } else {
                    cost[v] - sparse_dot(&self.columns[v], &y)
                }
            })
            .collect()
    }

    /// Recompute `self.dual` from the working costs.
    pub fn compute_dual(&mut self) {
        self.dual = self.reduced_costs(&self.cost);
    }

    /// Row `slot` of B⁻¹[A -I] restricted to nonbasic variables:
    /// returns (ρ_r, α_r) with α_r indexed by variable.
    pub fn pivot_row(&self, slot: usize) -> (Vec<f64>, Vec<f64>) {
        let mut e = vec![0.0; self.m];
        e[slot] = 1.0;
        let rho = self.factor.btran(&e);
        let alpha_row = (0..self.num_vars())
            .map(|v| {
                if self.slot_of[v] != NONBASIC {
                    0.0
                } else {
                    sparse_dot(&self.columns[v], &rho)
                }
            })
            .collect();
        (rho, alpha_row)
    }

    /// B⁻¹ a_v.
    pub fn ftran_column(&self, v: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.m];
        for &(i, a) in &self.columns[v] {
            dense[i] = a;
        }
        self.factor.ftran(&dense)
    }

    /// Infeasibility of variable `v` against the working bounds.
    pub fn infeasibility(&self, v: usize) -> f64 {
        let x = self.x[v];
        if x < self.lower[v] - self.primal_tol {
            self.lower[v] - x
        } else if x > self.upper[v] + self.primal_tol {
            x - self.upper[v]
        } else {
            0.0
        }
    }

    /// (count, max, sum) of basic primal infeasibilities.
    pub fn primal_infeasibility(&self) -> (usize, f64, f64) {
        let mut count = 0;
        let mut max = 0.0_f64;
        let mut sum = 0.0;
        for &v in &self.basic {
            let inf = self.infeasibility(v);
            if inf > 0.0 {
                count += 1;
                max = max.max(inf);
                sum += inf;
            }
        }
        (count, max, sum)
    }

    /// Dual infeasibility of nonbasic `v` given reduced cost `d`.
    pub fn dual_infeasibility_of(&self, v: usize, d: f64) -> f64 {
        match self.status[v] {
            BasisStatus::Basic | BasisStatus::Fixed => 0.0,
            BasisStatus::AtLower => {
                // A boxed variable can flip, an upper bound only at +inf cannot.
                (-d).max(0.0)
            }
            BasisStatus::AtUpper => d.max(0.0),
            BasisStatus::Free => d.abs(),
        }
    }

    /// (count, max) of dual infeasibilities for the given reduced costs.
    pub fn dual_infeasibility(&self, dual: &[f64]) -> (usize, f64) {
        let mut count = 0;
        let mut max = 0.0_f64;
        for v in 0..self.num_vars() {
            let inf = self.dual_infeasibility_of(v, dual[v]);
            if inf > self.dual_tol {
                count += 1;
                max = max.max(inf);
            }
        }
        (count, max)
    }

    /// Objective with the original costs.
    pub fn objective(&self) -> f64 {
        self.orig_cost
            .iter()
            .zip(&self.x)
            .map(|(c, x)| c * x)
            .sum()
    }

    /// Objective with the working costs.
    pub fn working_objective(&self) -> f64 {
        self.cost.iter().zip(&self.x).map(|(c, x)| c * x).sum()
    }

    /// Apply a basis change: `entering` takes slot `slot`, the leaving
    /// variable becomes nonbasic with `leaving_status` at value
    /// `leaving_value`. The factor is updated first; on a rejected pivot
    /// nothing changes.
    pub fn pivot(
        &mut self,
        entering: usize,
        slot: usize,
        alpha: &[f64],
        leaving_status: BasisStatus,
        leaving_value: f64,
    ) -> Result<UpdateStatus, FactorError> {
        let status = self.factor.update(alpha, slot)?;
        let leaving = self.basic[slot];
        self.basic[slot] = entering;
        self.slot_of[entering] = slot;
        self.slot_of[leaving] = NONBASIC;
        self.status[entering] = BasisStatus::Basic;
        self.status[leaving] = leaving_status;
        self.x[leaving] = leaving_value;
        Ok(status)
    }

    /// Nonbasic status for a variable that left at `value`.
    pub fn status_at(&self, v: usize, value: f64) -> BasisStatus {
        let (l, u) = (self.lower[v], self.upper[v]);
        if l == u {
            BasisStatus::Fixed
        } else if value == l {
            BasisStatus::AtLower
        } else if value == u {
            BasisStatus::AtUpper
        } else if (value - l).abs() <= (value - u).abs() {
            BasisStatus::AtLower
        } else {
            BasisStatus::AtUpper
        }
    }

    /// Snap nonbasic variables onto their (working) bounds.
    pub fn reset_nonbasic_values(&mut self) {
        for v in 0..self.num_vars() {
            if self.slot_of[v] == NONBASIC {
                let st = self.status[v];
                let st = if st.consistent_with(self.lower[v], self.upper[v]) {
                    st
                } else {
                    BasisStatus::nonbasic_for(self.lower[v], self.upper[v])
                };
                self.status[v] = st;
                if st != BasisStatus::Free {
                    self.x[v] = st.nonbasic_value(self.lower[v], self.upper[v]);
                }
            }
        }
    }

    /// Export the current basis.
    pub fn basis(&self) -> Basis {
        Basis {
            valid: true,
            col_status: self.status[..self.n].to_vec(),
            row_status: self.status[self.n..].to_vec(),
            basic_index: self.basic.clone(),
        }
    }

    /// Uniform random number in [0, 1).
    pub fn random(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

#[inline]
pub(crate) fn sparse_dot(col: &[(usize, f64)], dense: &[f64]) -> f64 {
    col.iter().map(|&(i, a)| a * dense[i]).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::from_triplets;

    fn model() -> Model {
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 1, 1.0)]);
        Model::new(
            vec![-1.0, -1.0],
            vec![0.0, 0.0],
            vec![f64::INFINITY; 2],
            vec![f64::NEG_INFINITY; 2],
            vec![4.0, 6.0],
            a,
        )
    }

    #[test]
    fn test_slack_basis_values() {
        let ctx = SolveContext::default();
        let lp = model();
        let mut ws = SimplexWorkspace::new(&lp, &ctx);
        ws.reset_to_slack();
        assert_eq!(ws.factorize(), FactorOutcome::Ok);
        ws.compute_primal();
        assert_eq!(ws.x, vec![0.0; 4]);
        ws.compute_dual();
        assert_eq!(&ws.dual[..2], &[-1.0, -1.0]);
    }

    #[test]
    fn test_singular_basis_is_repaired() {
        let ctx = SolveContext::default();
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (1, 0, 1.0), (0, 1, 1.0), (1, 1, 1.0)]);
        let lp = Model::new(
            vec![0.0, 0.0],
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            vec![2.0, 2.0],
            a,
        );
        let mut ws = SimplexWorkspace::new(&lp, &ctx);
        let mut basis = Basis::slack(&lp.col_lower, &lp.col_upper, 2);
        basis.col_status = vec![BasisStatus::Basic; 2];
        basis.row_status = vec![BasisStatus::AtLower; 2];
        basis.basic_index = vec![0, 1];
        ws.install_basis(&basis);
        assert_eq!(ws.factorize(), FactorOutcome::Ok);
        assert_eq!(ws.basic.iter().filter(|&&v| v >= 2).count(), 1);
    }

    #[test]
    fn test_install_fixes_basic_count() {
        let ctx = SolveContext::default();
        let lp = model();
        let mut ws = SimplexWorkspace::new(&lp, &ctx);
        let mut basis = Basis::slack(&lp.col_lower, &lp.col_upper, 2);
        basis.row_status[0] = BasisStatus::AtUpper;
        basis.basic_index.clear();
        ws.install_basis(&basis);
        assert_eq!(ws.basic.len(), 2);
    }
}
