//! Dual revised simplex.
//!
//! Requires a dual feasible basis (see [`make_dual_feasible`]). Each
//! iteration removes the most attractive primal infeasibility by pivoting
//! its basic variable out to the violated bound.

use crate::linalg::factor::{FactorError, UpdateStatus};
use crate::solution::BasisStatus;
use crate::util::logging::{LogEvent, SimplexKind};

use super::pricing::DualPricing;
use super::ratio::dual_ratio;
use super::workspace::{FactorOutcome, SimplexWorkspace, NONBASIC};
use super::LoopOutcome;

/// Disagreement between the row and column computation of the pivot that
/// triggers a refactorization.
const PIVOT_MISMATCH: f64 = 1e-7;
const MAX_RECOVERIES: usize = 10;

/// Flip boxed variables with wrong-signed reduced costs to their other
/// bound. Returns false if a dual infeasibility remains that cannot be
/// removed by flipping.
pub(crate) fn make_dual_feasible(ws: &mut SimplexWorkspace<'_>) -> bool {
    let mut flipped = false;
    for v in 0..ws.num_vars() {
        if ws.slot_of[v] != NONBASIC {
            continue;
        }
        let d = ws.dual[v];
        if ws.dual_infeasibility_of(v, d) <= ws.dual_tol {
            continue;
        }
        let (l, u) = (ws.lower[v], ws.upper[v]);
        if !(l.is_finite() && u.is_finite()) {
            return false;
        }
        let st = if d < 0.0 {
            BasisStatus::AtUpper
        } else {
            BasisStatus::AtLower
        };
        ws.status[v] = st;
        ws.x[v] = st.nonbasic_value(l, u);
        flipped = true;
    }
    if flipped {
        ws.compute_primal();
    }
    true
}

/// Absorb small dual infeasibilities left by the Harris tolerance into the
/// working costs.
fn shift_costs(ws: &mut SimplexWorkspace<'_>) {
    for v in 0..ws.num_vars() {
        if ws.slot_of[v] != NONBASIC {
            continue;
        }
        let d = ws.dual[v];
        if ws.dual_infeasibility_of(v, d) > 0.0 {
            ws.cost[v] -= d;
            ws.dual[v] = 0.0;
            ws.costs_perturbed = true;
        }
    }
}

/// Run the dual simplex from the workspace's factorized, dual feasible
/// basis.
pub(crate) fn run(ws: &mut SimplexWorkspace<'_>) -> LoopOutcome {
    let ctx = ws.ctx;
    let settings = ctx.settings();
    let limit = settings.simplex_iteration_limit;
    let objective_bound = settings.objective_bound;
    let mut pricing = DualPricing::new(ws);
    let mut recoveries = 0;
    // Rows whose last pivot was rejected; skipped until the basis changes.
    let mut bad_rows = vec![false; ws.m];

    loop {
        if ctx.time_limit_reached() {
            return LoopOutcome::TimeLimit;
        }
        if !ws.costs_perturbed && objective_bound.is_finite() && ws.working_objective() > objective_bound {
            return LoopOutcome::ObjectiveBound;
        }

        if ctx.report_iteration(ws.iterations) {
            let (_, _, sum_inf) = ws.primal_infeasibility();
            ctx.emit(LogEvent::SimplexIteration {
                kind: SimplexKind::Dual,
                iteration: ws.iterations,
                phase: 2,
                objective: ws.working_objective(),
                primal_infeasibility: sum_inf,
                dual_infeasibility: 0.0,
            });
        }

        let Some(r) = pricing.choose_leaving(ws, &bad_rows) else {
            if !bad_rows.contains(&true) {
                return LoopOutcome::Optimal;
            }
            // Only rejected rows are infeasible: refactorize and retry them.
            recoveries += 1;
            if recoveries > MAX_RECOVERIES {
                return LoopOutcome::Stalled;
            }
            if ws.refresh() != FactorOutcome::Ok {
                return LoopOutcome::Failed;
            }
            bad_rows.fill(false);
            pricing.reset(ws);
            continue;
        };
        if ws.iterations >= limit {
            return LoopOutcome::IterationLimit;
        }

        let p = ws.basic[r];
        let to_lower = ws.x[p] < ws.lower[p];
        let bound = if to_lower { ws.lower[p] } else { ws.upper[p] };
        let s = if to_lower { -1.0 } else { 1.0 };

        let (rho, alpha_row) = ws.pivot_row(r);
        pricing.check_exact(r, &rho);
        let Some(q) = dual_ratio(ws, &alpha_row, &ws.dual, s) else {
            return LoopOutcome::Infeasible;
        };
        let alpha_q = ws.ftran_column(q);
        let pivot = alpha_q[r];
        if (pivot - alpha_row[q]).abs() > PIVOT_MISMATCH * (1.0 + pivot.abs()) {
            log::debug!(
                "dual pivot mismatch: column {:e}, row {:e}; refactorizing",
                pivot,
                alpha_row[q]
            );
            recoveries += 1;
            if recoveries > MAX_RECOVERIES || ws.refresh() != FactorOutcome::Ok {
                return LoopOutcome::Failed;
            }
            pricing.reset(ws);
            continue;
        }
        if !ws.factor.accepts_pivot(&alpha_q, r) {
            log::debug!("dual pivot {:e} in slot {} rejected, choosing another row", pivot, r);
            bad_rows[r] = true;
            continue;
        }

        let theta_d = ws.dual[q] / pivot;
        let theta_p = (ws.x[p] - bound) / pivot;
        let leave_status = ws.status_at(p, bound);

        pricing.update(ws, r, &alpha_q, &rho);
        for v in 0..ws.num_vars() {
            if ws.slot_of[v] == NONBASIC && alpha_row[v] != 0.0 {
                ws.dual[v] -= theta_d * alpha_row[v];
            }
        }
        ws.dual[q] = 0.0;
        ws.dual[p] = -theta_d;
        let previous_basic = ws.basic.clone();
        for (k, &v) in previous_basic.iter().enumerate() {
            ws.x[v] -= theta_p * alpha_q[k];
        }
        ws.x[q] += theta_p;

        match ws.pivot(q, r, &alpha_q, leave_status, bound) {
            Ok(status) => {
                ws.iterations += 1;
                bad_rows.fill(false);
                shift_costs(ws);
                if status == UpdateStatus::NeedsRefactorization && ws.refresh() != FactorOutcome::Ok {
                    return LoopOutcome::Failed;
                }
            }
            Err(FactorError::PivotTooSmall { pivot }) => {
                log::debug!("dual pivot {:e} rejected", pivot);
                bad_rows[r] = true;
                recoveries += 1;
                ws.reset_nonbasic_values();
                if recoveries > MAX_RECOVERIES || ws.refresh() != FactorOutcome::Ok {
                    return LoopOutcome::Failed;
                }
                pricing.reset(ws);
            }
            Err(e) => {
                log::warn!("dual simplex update failed: {}", e);
                return LoopOutcome::Failed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SolveContext;
    use crate::linalg::sparse::from_triplets;
    use crate::problem::Model;
    use crate::settings::SolverSettings;

    fn prepare<'a>(lp: &Model, ctx: &'a SolveContext) -> SimplexWorkspace<'a> {
        let mut ws = SimplexWorkspace::new(lp, ctx);
        ws.reset_to_slack();
        assert_eq!(ws.refresh(), FactorOutcome::Ok);
        ws
    }

    // min x + 2y  s.t. x + y >= 2, x - y <= 1, x, y >= 0
    fn covering() -> Model {
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, -1.0)]);
        Model::new(
            vec![1.0, 2.0],
            vec![0.0, 0.0],
            vec![f64::INFINITY; 2],
            vec![2.0, f64::NEG_INFINITY],
            vec![f64::INFINITY, 1.0],
            a,
        )
    }

    #[test]
    fn test_dual_from_slack_basis() {
        let ctx = SolveContext::default();
        let lp = covering();
        let mut ws = prepare(&lp, &ctx);
        assert!(make_dual_feasible(&mut ws));
        assert_eq!(run(&mut ws), LoopOutcome::Optimal);
        assert!((ws.objective() - 2.5).abs() < 1e-9);
        assert!((ws.x[0] - 1.5).abs() < 1e-9);
        assert!((ws.x[1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_dual_detects_infeasibility() {
        let ctx = SolveContext::default();
        // x + y >= 3 with x, y in [0, 1]
        let a = from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);
        let lp = Model::new(
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![3.0],
            vec![f64::INFINITY],
            a,
        );
        let mut ws = prepare(&lp, &ctx);
        assert!(make_dual_feasible(&mut ws));
        assert_eq!(run(&mut ws), LoopOutcome::Infeasible);
    }

    #[test]
    fn test_rejected_pivot_row_is_skipped() {
        let settings = SolverSettings {
            factor_pivot_tolerance: 0.9,
            ..Default::default()
        };
        let ctx = SolveContext::new(settings, None);
        // min x + 10y  s.t.  0.5x + 2y >= 3,  y >= 1.5: the first row
        // prices out x with pivot -0.5, the second row is taken instead.
        let a = from_triplets(2, 2, vec![(0, 0, 0.5), (0, 1, 2.0), (1, 1, 1.0)]);
        let lp = Model::new(
            vec![1.0, 10.0],
            vec![0.0; 2],
            vec![f64::INFINITY; 2],
            vec![3.0, 1.5],
            vec![f64::INFINITY; 2],
            a,
        );
        let mut ws = prepare(&lp, &ctx);
        assert!(make_dual_feasible(&mut ws));
        assert_eq!(run(&mut ws), LoopOutcome::Optimal);
        assert_eq!(ws.iterations, 1);
        assert!((ws.objective() - 15.0).abs() < 1e-9);
        assert!(ws.x[0].abs() < 1e-9);
        assert!((ws.x[1] - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_dual_stops_at_objective_bound() {
        let mut settings = SolverSettings::default();
        settings.objective_bound = 1.0;
        let ctx = SolveContext::new(settings, None);
        let lp = covering();
        let mut ws = prepare(&lp, &ctx);
        assert!(make_dual_feasible(&mut ws));
        assert_eq!(run(&mut ws), LoopOutcome::ObjectiveBound);
    }
}
