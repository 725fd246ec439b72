//! Residuals and termination tests for the IPM.
//!
//! Checks for:
//! - Optimality: relative primal and dual residuals and the relative
//!   duality gap below the optimality tolerance
//! - Divergence: iterates growing without bound, which signals a primal or
//!   dual infeasible model

use crate::linalg::sparse;
use crate::problem::Model;

use super::workspace::{BoundKind, IpmState};

/// Norm beyond which the iterate is considered divergent.
const DIVERGENCE_NORM: f64 = 1e12;

/// Residuals of the current iterate.
#[derive(Debug, Clone)]
pub struct Residuals {
    /// r - Ax
    pub r_p: Vec<f64>,
    /// Dual residual over (x, r); zero for fixed variables
    pub r_d: Vec<f64>,
    /// Relative max-norm of `r_p`
    pub primal: f64,
    /// Relative max-norm of `r_d`
    pub dual: f64,
    pub primal_objective: f64,
    pub dual_objective: f64,
    /// Relative duality gap
    pub gap: f64,
}

/// Termination decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Optimal,
    Diverged,
}

/// Reduced costs `c + Qx - Aᵀy` of the structurals.
pub fn reduced_costs(model: &Model, st: &IpmState) -> Vec<f64> {
    let qx = model.hessian_product(st.x());
    let aty = sparse::spmv_transpose(&model.a_matrix, &st.y);
    (0..st.n).map(|j| model.col_cost[j] + qx[j] - aty[j]).collect()
}

pub fn residuals(model: &Model, st: &IpmState) -> Residuals {
    let (n, m) = (st.n, st.m);
    let ax = sparse::spmv(&model.a_matrix, st.x());
    let r_p: Vec<f64> = (0..m).map(|i| st.z[n + i] - ax[i]).collect();

    let d = reduced_costs(model, st);
    let mut r_d = vec![0.0; n + m];
    let mut dual_objective = 0.0;
    for v in 0..n + m {
        let grad = if v < n { d[v] } else { st.y[v - n] };
        if st.kind[v] == BoundKind::Fixed {
            dual_objective += st.lower[v] * grad;
            continue;
        }
        r_d[v] = grad - st.wl[v] + st.wu[v];
        if st.kind[v].has_lower() {
            dual_objective += st.lower[v] * st.wl[v];
        }
        if st.kind[v].has_upper() {
            dual_objective -= st.upper[v] * st.wu[v];
        }
    }
    let quad = model.hessian.as_ref().map_or(0.0, |q| 0.5 * sparse::quad_form(q, st.x()));
    dual_objective -= quad;
    let linear: f64 = model.col_cost.iter().zip(st.x()).map(|(c, x)| c * x).sum();
    let primal_objective = linear + quad;

    let bound_scale = st
        .lower
        .iter()
        .chain(&st.upper)
        .filter(|v| v.is_finite())
        .fold(1.0_f64, |acc, v| acc.max(v.abs()));
    let cost_scale = model.col_cost.iter().fold(1.0_f64, |acc, c| acc.max(c.abs()));
    let primal = r_p.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())) / bound_scale;
    let dual = r_d.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())) / cost_scale;
    let gap = (primal_objective - dual_objective).abs() / (1.0 + primal_objective.abs());

    Residuals {
        r_p,
        r_d,
        primal,
        dual,
        primal_objective,
        dual_objective,
        gap,
    }
}

/// Check termination for the given tolerance.
pub fn check(res: &Residuals, st: &IpmState, tol: f64) -> Option<Termination> {
    if res.primal <= tol && res.dual <= tol && res.gap <= tol {
        return Some(Termination::Optimal);
    }
    let norm = st
        .z
        .iter()
        .chain(&st.y)
        .chain(&st.wl)
        .chain(&st.wu)
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if !norm.is_finite() || norm > DIVERGENCE_NORM {
        return Some(Termination::Diverged);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::from_triplets;

    #[test]
    fn test_residuals_at_optimum() {
        // min x s.t. x >= 1 (as a row), x free
        let a = from_triplets(1, 1, vec![(0, 0, 1.0)]);
        let model = Model::new(
            vec![1.0],
            vec![f64::NEG_INFINITY],
            vec![f64::INFINITY],
            vec![1.0],
            vec![f64::INFINITY],
            a,
        );
        let mut st = IpmState::initial(&model);
        st.z = vec![1.0 + 1e-12, 1.0 + 1e-12];
        st.y = vec![1.0];
        st.wl = vec![0.0, 1.0];
        let res = residuals(&model, &st);
        assert!(res.primal < 1e-12);
        assert!(res.dual < 1e-12);
        assert!((res.dual_objective - 1.0).abs() < 1e-12);
        assert_eq!(check(&res, &st, 1e-8), Some(Termination::Optimal));
    }
}
