//! Fractional diving.
//!
//! Repeatedly rounds the least fractional integer column in its nearer
//! direction and re-solves the relaxation, trying the other direction once
//! when a rounding makes the LP infeasible.

use solver_core::SolveContext;

use super::{HeuristicOutcome, HeuristicSolution};
use crate::master::{LinearCut, MasterBackend, MasterRequest, MasterStatus, WarmStart};
use crate::model::MipProblem;
use crate::search::{apply_changes, BoundChange};

/// Limits and tolerances of one dive.
#[derive(Debug, Clone)]
pub struct DiveSettings {
    /// Maximum roundings.
    pub max_depth: usize,

    /// Iteration limit of each LP.
    pub lp_iteration_limit: usize,

    /// Total iterations the dive may spend.
    pub iteration_budget: usize,

    /// Abandon the dive once the LP objective reaches this value.
    pub cutoff: f64,

    pub feasibility_tolerance: f64,
    pub integrality_tolerance: f64,
}

/// Dive from a node with bound changes `start` and relaxation solution `x`.
pub fn fractional_dive<M: MasterBackend>(
    prob: &MipProblem,
    master: &M,
    start: &[BoundChange],
    x: &[f64],
    warm: Option<&WarmStart>,
    cuts: &[(usize, LinearCut)],
    settings: &DiveSettings,
    ctx: &SolveContext,
) -> HeuristicOutcome {
    let int_tol = settings.integrality_tolerance;
    let mut changes = start.to_vec();
    let mut x = x.to_vec();
    let mut warm = warm.cloned();
    let mut iterations = 0;

    for _ in 0..settings.max_depth {
        if prob.is_integer_feasible(&x, int_tol) || iterations >= settings.iteration_budget {
            break;
        }
        let Some((var, value, _)) = prob
            .get_fractional_vars(&x, int_tol)
            .into_iter()
            .min_by(|a, b| a.2.total_cmp(&b.2))
        else {
            break;
        };

        let (lb, ub) = apply_changes(&changes, &prob.var_lb, &prob.var_ub);
        let down = BoundChange::down_branch(var, lb[var], ub[var], value);
        let up = BoundChange::up_branch(var, lb[var], ub[var], value);
        let order = if value - value.floor() < 0.5 { [down, up] } else { [up, down] };

        let mut next = None;
        for change in order {
            if change.is_infeasible() {
                continue;
            }
            changes.push(change);
            let request = MasterRequest::new(&changes, cuts)
                .with_warm(warm.as_ref())
                .with_iteration_limit(settings.lp_iteration_limit);
            let r = master.solve(&request, ctx);
            iterations += r.iterations;
            if r.status == MasterStatus::Optimal && r.obj_val < settings.cutoff {
                next = Some(r);
                break;
            }
            changes.pop();
        }

        match next {
            Some(r) => {
                warm = r.warm_start();
                x = r.x;
            }
            None => break,
        }
    }

    let solution = (prob.is_integer_feasible(&x, int_tol)
        && prob.is_feasible(&x, settings.feasibility_tolerance, int_tol))
    .then(|| HeuristicSolution {
        obj_val: prob.objective(&x),
        x,
    });
    log::debug!(
        "dive: {} bound changes, {} iterations, solution {}",
        changes.len() - start.len(),
        iterations,
        solution.is_some()
    );
    HeuristicOutcome { solution, iterations }
}
