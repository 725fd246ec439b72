//! Rounding heuristics.

use solver_core::SolveContext;

use super::{HeuristicOutcome, HeuristicSolution};
use crate::master::{LinearCut, MasterBackend, MasterRequest, MasterStatus, WarmStart};
use crate::model::MipProblem;
use crate::search::BoundChange;

/// Round every integer column of `x` to the nearest value in its bounds and
/// keep the point if it is feasible.
pub fn simple_rounding(prob: &MipProblem, x: &[f64], feas_tol: f64, int_tol: f64) -> Option<HeuristicSolution> {
    let mut rounded = x.to_vec();
    for &j in &prob.integer_vars {
        rounded[j] = x[j].round().clamp(prob.var_lb[j], prob.var_ub[j]);
    }
    prob.is_feasible(&rounded, feas_tol, int_tol).then(|| HeuristicSolution {
        obj_val: prob.objective(&rounded),
        x: rounded,
    })
}

/// Fix every integer column at its rounded value and re-optimize the
/// continuous columns.
pub fn fix_and_solve<M: MasterBackend>(
    prob: &MipProblem,
    master: &M,
    x: &[f64],
    cuts: &[(usize, LinearCut)],
    warm: Option<&WarmStart>,
    iteration_limit: usize,
    feas_tol: f64,
    ctx: &SolveContext,
) -> HeuristicOutcome {
    let changes: Vec<BoundChange> = prob
        .integer_vars
        .iter()
        .map(|&j| {
            let (lb, ub) = (prob.var_lb[j], prob.var_ub[j]);
            BoundChange::fix(j, lb, ub, x[j].round().clamp(lb, ub))
        })
        .collect();
    let request = MasterRequest::new(&changes, cuts)
        .with_warm(warm)
        .with_iteration_limit(iteration_limit);
    let r = master.solve(&request, ctx);

    let solution = (r.status == MasterStatus::Optimal && prob.is_feasible(&r.x, feas_tol, feas_tol.max(1e-9)))
        .then(|| HeuristicSolution {
            obj_val: prob.objective(&r.x),
            x: r.x,
        });
    HeuristicOutcome {
        solution,
        iterations: r.iterations,
    }
}
