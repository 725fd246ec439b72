//! Equilibration of the LP before the simplex.
//!
//! Ruiz iterations divide every row and column of A by the square root of
//! its largest entry until all of them are close to one. The accumulated
//! factors are rounded to powers of two, so scaling and unscaling are exact,
//! and clamped to `2^±allowed_simplex_matrix_scale_factor`.
//!
//! With `A' = R A C` and cost factor `σ` the scaled LP has
//! - columns `x' = x / C`, bounds `l / C`, costs `C c / σ`
//! - rows `r' = R r`, bounds `R L`
//!
//! and its solution maps back as `x = C x'`, `r = r' / R`, `y = σ R y'`,
//! `d = σ d' / C`.

use crate::linalg::sparse;
use crate::problem::Model;
use crate::settings::SolverSettings;
use crate::solution::BasisStatus;

use super::SimplexResult;

const RUIZ_ITERATIONS: usize = 10;

/// Stop once every row and column norm is within this of one.
const RUIZ_TOLERANCE: f64 = 0.1;

/// Power-of-two row, column and cost factors.
#[derive(Debug, Clone)]
pub(crate) struct SimplexScaling {
    pub row: Vec<f64>,
    pub col: Vec<f64>,
    pub cost: f64,
}

fn power_of_two(factor: f64, limit: i32) -> f64 {
    let limit = f64::from(limit);
    2f64.powf(factor.log2().round().clamp(-limit, limit))
}

impl SimplexScaling {
    /// Factors for `model`, or `None` if every factor comes out as one.
    pub fn compute(model: &Model, settings: &SolverSettings) -> Option<Self> {
        let (m, n) = (model.num_row(), model.num_col());
        let entries: Vec<(usize, usize, f64)> = model
            .a_matrix
            .iter()
            .map(|(&v, (i, j))| (i, j, v.abs()))
            .filter(|&(_, _, v)| v > 0.0)
            .collect();

        let mut row = vec![1.0; m];
        let mut col = vec![1.0; n];
        for _ in 0..RUIZ_ITERATIONS {
            let mut row_norm = vec![0.0_f64; m];
            let mut col_norm = vec![0.0_f64; n];
            for &(i, j, v) in &entries {
                let scaled = v * row[i] * col[j];
                row_norm[i] = row_norm[i].max(scaled);
                col_norm[j] = col_norm[j].max(scaled);
            }
            let mut converged = true;
            for (factor, &norm) in row.iter_mut().zip(&row_norm).chain(col.iter_mut().zip(&col_norm)) {
                if norm > 0.0 {
                    converged &= (norm - 1.0).abs() <= RUIZ_TOLERANCE;
                    *factor /= norm.sqrt();
                }
            }
            if converged {
                break;
            }
        }

        let limit = settings.simplex_matrix_scale_limit;
        row.iter_mut().for_each(|f| *f = power_of_two(*f, limit));
        col.iter_mut().for_each(|f| *f = power_of_two(*f, limit));

        let max_cost = model
            .col_cost
            .iter()
            .zip(&col)
            .map(|(c, f)| (c * f).abs())
            .fold(0.0_f64, f64::max);
        let cost = if max_cost > 0.0 {
            power_of_two(max_cost, settings.simplex_cost_scale_limit)
        } else {
            1.0
        };

        let identity = cost == 1.0 && row.iter().chain(&col).all(|&f| f == 1.0);
        (!identity).then_some(Self { row, col, cost })
    }

    /// The scaled LP. The quadratic term is dropped.
    pub fn apply(&self, model: &Model) -> Model {
        let (m, n) = (model.num_row(), model.num_col());
        let mut scaled = model.clone();
        scaled.hessian = None;
        scaled.a_matrix = sparse::from_triplets(
            m,
            n,
            model
                .a_matrix
                .iter()
                .map(|(&v, (i, j))| (i, j, v * self.row[i] * self.col[j])),
        );
        for j in 0..n {
            scaled.col_cost[j] = model.col_cost[j] * self.col[j] / self.cost;
            scaled.col_lower[j] = model.col_lower[j] / self.col[j];
            scaled.col_upper[j] = model.col_upper[j] / self.col[j];
        }
        for i in 0..m {
            scaled.row_lower[i] = model.row_lower[i] * self.row[i];
            scaled.row_upper[i] = model.row_upper[i] * self.row[i];
        }
        scaled.offset = model.offset / self.cost;
        scaled
    }

    /// Map a result of the scaled LP back to `model`. Infeasibilities and
    /// the objective are recomputed on `model`; the factor of the scaled
    /// basis is dropped.
    pub fn unscale(&self, model: &Model, mut r: SimplexResult, settings: &SolverSettings) -> SimplexResult {
        for (j, x) in r.col_value.iter_mut().enumerate() {
            *x *= self.col[j];
        }
        for (i, x) in r.row_value.iter_mut().enumerate() {
            *x /= self.row[i];
        }
        for (j, d) in r.col_dual.iter_mut().enumerate() {
            *d *= self.cost / self.col[j];
        }
        for (i, y) in r.row_dual.iter_mut().enumerate() {
            *y *= self.cost * self.row[i];
        }
        r.objective = model.offset + model.col_cost.iter().zip(&r.col_value).map(|(c, x)| c * x).sum::<f64>();

        let primal_tol = settings.primal_feasibility_tolerance;
        let violations = r
            .col_value
            .iter()
            .zip(model.col_lower.iter().zip(&model.col_upper))
            .chain(r.row_value.iter().zip(model.row_lower.iter().zip(&model.row_upper)))
            .map(|(&x, (&l, &u))| (l - x).max(x - u).max(0.0))
            .filter(|&v| v > primal_tol);
        let (count, max) = violations.fold((0, 0.0_f64), |(c, m), v| (c + 1, m.max(v)));
        r.num_primal_infeasibilities = count;
        r.max_primal_infeasibility = max;

        let dual_tol = settings.dual_feasibility_tolerance;
        let reduced = r.col_dual.iter().chain(&r.row_dual);
        let statuses = r.basis.col_status.iter().chain(&r.basis.row_status);
        let violations = reduced
            .zip(statuses)
            .map(|(&d, status)| match status {
                BasisStatus::Basic | BasisStatus::Fixed => 0.0,
                BasisStatus::AtLower => (-d).max(0.0),
                BasisStatus::AtUpper => d.max(0.0),
                BasisStatus::Free => d.abs(),
            })
            .filter(|&v| v > dual_tol);
        let (count, max) = violations.fold((0, 0.0_f64), |(c, m), v| (c + 1, m.max(v)));
        r.num_dual_infeasibilities = count;
        r.max_dual_infeasibility = max;

        r.factor = None;
        r
    }
}
