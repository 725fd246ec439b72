//! Primal revised simplex.
//!
//! Phase 1 minimizes the sum of basic infeasibilities with the composite
//! cost (-1 below the lower bound, +1 above the upper bound); phase 2
//! minimizes the working costs. The phase is re-evaluated every iteration.

use crate::linalg::factor::{FactorError, UpdateStatus};
use crate::util::logging::{LogEvent, SimplexKind};

use super::pricing::{PricingRule, PrimalPricing};
use super::ratio::{primal_ratio, PrimalStep};
use super::workspace::{FactorOutcome, SimplexWorkspace};
use super::LoopOutcome;

/// Consecutive rejected pivots tolerated before giving up.
const MAX_REJECTIONS: usize = 20;

fn phase_one_costs(ws: &SimplexWorkspace<'_>) -> Vec<f64> {
    let mut cost = vec![0.0; ws.num_vars()];
    for &v in &ws.basic {
        if ws.x[v] < ws.lower[v] - ws.primal_tol {
            cost[v] = -1.0;
        } else if ws.x[v] > ws.upper[v] + ws.primal_tol {
            cost[v] = 1.0;
        }
    }
    cost
}

/// Run the primal simplex from the workspace's factorized basis.
pub(crate) fn run(ws: &mut SimplexWorkspace<'_>) -> LoopOutcome {
    let ctx = ws.ctx;
    let limit = ctx.settings().simplex_iteration_limit;
    let mut pricing = PrimalPricing::new(ws);
    let mut rejected = vec![false; ws.num_vars()];
    let mut rejections = 0;

    loop {
        if ctx.time_limit_reached() {
            return LoopOutcome::TimeLimit;
        }
        let (num_inf, _, sum_inf) = ws.primal_infeasibility();
        let phase_one = num_inf > 0;
        let cost = if phase_one {
            phase_one_costs(ws)
        } else {
            ws.cost.clone()
        };
        let dual = ws.reduced_costs(&cost);
        if !phase_one {
            ws.dual.clone_from(&dual);
        }

        if ctx.report_iteration(ws.iterations) {
            let (_, dual_inf) = ws.dual_infeasibility(&dual);
            ctx.emit(LogEvent::SimplexIteration {
                kind: SimplexKind::Primal,
                iteration: ws.iterations,
                phase: if phase_one { 1 } else { 2 },
                objective: ws.working_objective(),
                primal_infeasibility: sum_inf,
                dual_infeasibility: dual_inf,
            });
        }

        let Some((q, dir)) = pricing.choose_entering(ws, &dual, &rejected) else {
            if rejected.contains(&true) {
                // Only rejected candidates remain: the point may still be
                // optimal once values are recomputed from a fresh factor.
                if ws.refresh() != FactorOutcome::Ok {
                    return LoopOutcome::Failed;
                }
                let optimal = ws.primal_infeasibility().0 == 0 && ws.dual_infeasibility(&ws.dual).0 == 0;
                return if optimal {
                    LoopOutcome::Optimal
                } else {
                    LoopOutcome::Stalled
                };
            }
            return if phase_one {
                LoopOutcome::Infeasible
            } else {
                LoopOutcome::Optimal
            };
        };
        if ws.iterations >= limit {
            return LoopOutcome::IterationLimit;
        }

        let alpha = ws.ftran_column(q);
        match primal_ratio(ws, q, dir, &alpha, phase_one) {
            PrimalStep::Flip { step } => {
                let delta = dir * step;
                for (k, &a) in alpha.iter().enumerate() {
                    let v = ws.basic[k];
                    ws.x[v] -= delta * a;
                }
                ws.x[q] += delta;
                ws.status[q] = ws.status_at(q, ws.x[q]);
                ws.x[q] = ws.status[q].nonbasic_value(ws.lower[q], ws.upper[q]);
                ws.iterations += 1;
            }
            PrimalStep::Unbounded => {
                if !phase_one {
                    return LoopOutcome::Unbounded;
                }
                rejected[q] = true;
                rejections += 1;
            }
            PrimalStep::Pivot {
                slot,
                step,
                leave_value,
            } => {
                if !ws.factor.accepts_pivot(&alpha, slot) {
                    log::debug!("primal pivot {:e} rejected for variable {}", alpha[slot], q);
                    rejected[q] = true;
                    rejections += 1;
                    if rejections > MAX_REJECTIONS {
                        return LoopOutcome::Stalled;
                    }
                    continue;
                }
                let leaving = ws.basic[slot];
                let leave_status = ws.status_at(leaving, leave_value);
                let alpha_row = if pricing.rule == PricingRule::Dantzig {
                    Vec::new()
                } else {
                    ws.pivot_row(slot).1
                };

                let delta = dir * step;
                let mut values: Vec<f64> = ws.basic.iter().map(|&v| ws.x[v]).collect();
                for (k, &a) in alpha.iter().enumerate() {
                    values[k] -= delta * a;
                }
                let entering_value = ws.x[q] + delta;

                if pricing.rule != PricingRule::Dantzig {
                    pricing.update(ws, q, leaving, slot, &alpha, &alpha_row);
                }
                let previous_basic = ws.basic.clone();
                match ws.pivot(q, slot, &alpha, leave_status, leave_value) {
                    Ok(status) => {
                        for (k, &v) in previous_basic.iter().enumerate() {
                            if k != slot {
                                ws.x[v] = values[k];
                            }
                        }
                        ws.x[q] = entering_value;
                        ws.iterations += 1;
                        rejections = 0;
                        rejected.iter_mut().for_each(|r| *r = false);
                        if status == UpdateStatus::NeedsRefactorization
                            && ws.refresh() != FactorOutcome::Ok
                        {
                            return LoopOutcome::Failed;
                        }
                    }
                    Err(FactorError::PivotTooSmall { pivot }) => {
                        log::debug!("primal pivot {:e} rejected for variable {}", pivot, q);
                        rejected[q] = true;
                        rejections += 1;
                        if ws.refresh() != FactorOutcome::Ok {
                            return LoopOutcome::Failed;
                        }
                        pricing.reset(ws);
                    }
                    Err(e) => {
                        log::warn!("primal simplex update failed: {}", e);
                        return LoopOutcome::Failed;
                    }
                }
            }
        }
        if rejections > MAX_REJECTIONS {
            return LoopOutcome::Stalled;
        }
    }
}
