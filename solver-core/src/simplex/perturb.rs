//! Cost and bound perturbation.
//!
//! Perturbations are random, scaled by the configured multiplier and pushed
//! in the direction that keeps the current basis feasible: costs of
//! variables at a lower bound grow, those at an upper bound shrink, and
//! bounds are relaxed outwards. Both are removed before a solution is
//! reported.

use crate::solution::BasisStatus;

use super::workspace::SimplexWorkspace;

/// Base relative size of a cost perturbation.
const COST_BASE: f64 = 5e-7;
/// Base relative size of a bound perturbation.
const BOUND_BASE: f64 = 1e-7;

/// Perturb the working costs of structural variables.
pub(crate) fn perturb_costs(ws: &mut SimplexWorkspace<'_>) {
    let mult = ws.ctx.settings().cost_perturbation;
    if mult <= 0.0 {
        return;
    }
    let max_cost = ws.orig_cost[..ws.n].iter().fold(0.0_f64, |m, c| m.max(c.abs()));
    let scale = mult * COST_BASE * (1.0 + max_cost).min(1e3);
    for v in 0..ws.n {
        let (l, u) = (ws.lower[v], ws.upper[v]);
        if l == u {
            continue;
        }
        let xi = scale * (1.0 + ws.orig_cost[v].abs()) * (1.0 + ws.random());
        let sign = match ws.status[v] {
            BasisStatus::AtLower => 1.0,
            BasisStatus::AtUpper => -1.0,
            BasisStatus::Fixed | BasisStatus::Free => 0.0,
            BasisStatus::Basic if l.is_finite() => 1.0,
            BasisStatus::Basic if u.is_finite() => -1.0,
            BasisStatus::Basic => 0.0,
        };
        ws.cost[v] = ws.orig_cost[v] + sign * xi;
    }
    ws.costs_perturbed = true;
    log::debug!("costs perturbed with scale {:e}", scale);
}

/// Restore the original costs. Duals must be recomputed by the caller.
pub(crate) fn remove_cost_perturbation(ws: &mut SimplexWorkspace<'_>) {
    ws.cost.copy_from_slice(&ws.orig_cost);
    ws.costs_perturbed = false;
}

/// Relax every non-fixed finite bound outwards and move nonbasic variables
/// onto the relaxed bounds.
pub(crate) fn perturb_bounds(ws: &mut SimplexWorkspace<'_>) {
    let mult = ws.ctx.settings().bound_perturbation;
    if mult <= 0.0 {
        return;
    }
    for v in 0..ws.num_vars() {
        let (l, u) = (ws.orig_lower[v], ws.orig_upper[v]);
        if l == u {
            continue;
        }
        if l.is_finite() {
            let xi = mult * BOUND_BASE * (1.0 + l.abs()) * (1.0 + ws.random());
            ws.lower[v] = l - xi;
        }
        if u.is_finite() {
            let xi = mult * BOUND_BASE * (1.0 + u.abs()) * (1.0 + ws.random());
            ws.upper[v] = u + xi;
        }
    }
    ws.bounds_perturbed = true;
    ws.reset_nonbasic_values();
    ws.compute_primal();
}

/// Restore the original bounds and recompute basic values.
pub(crate) fn remove_bound_perturbation(ws: &mut SimplexWorkspace<'_>) {
    ws.lower.copy_from_slice(&ws.orig_lower);
    ws.upper.copy_from_slice(&ws.orig_upper);
    ws.bounds_perturbed = false;
    ws.reset_nonbasic_values();
    ws.compute_primal();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SolveContext;
    use crate::linalg::sparse::from_triplets;
    use crate::problem::Model;

    fn lp() -> Model {
        let a = from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);
        Model::new(
            vec![1.0, -2.0],
            vec![0.0, 0.0],
            vec![3.0, 3.0],
            vec![1.0],
            vec![4.0],
            a,
        )
    }

    #[test]
    fn test_cost_perturbation_direction_and_removal() {
        let ctx = SolveContext::default();
        let model = lp();
        let mut ws = SimplexWorkspace::new(&model, &ctx);
        ws.reset_to_slack();
        ws.status[1] = BasisStatus::AtUpper;
        perturb_costs(&mut ws);
        assert!(ws.cost[0] > 1.0);
        assert!(ws.cost[1] < -2.0);
        remove_cost_perturbation(&mut ws);
        assert_eq!(ws.cost, ws.orig_cost);
        assert!(!ws.costs_perturbed);
    }

    #[test]
    fn test_bound_perturbation_relaxes_and_restores() {
        let ctx = SolveContext::default();
        let model = lp();
        let mut ws = SimplexWorkspace::new(&model, &ctx);
        ws.reset_to_slack();
        ws.factorize();
        perturb_bounds(&mut ws);
        assert!(ws.lower[0] < 0.0 && ws.upper[0] > 3.0);
        assert!(ws.lower[2] < 1.0 && ws.upper[2] > 4.0);
        remove_bound_perturbation(&mut ws);
        assert_eq!(ws.lower, ws.orig_lower);
        assert_eq!(ws.x[0], 0.0);
    }
}
