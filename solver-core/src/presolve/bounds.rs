//! Activity-based reductions: infeasible and redundant rows, implied column
//! bounds, dominated columns.

use crate::postsolve::{Reduction, ReductionStack};

use super::workspace::PresolveWorkspace;
use super::RuleOutcome;

/// Implied bounds beyond this magnitude are not installed.
const MAX_IMPLIED_BOUND: f64 = 1e8;
/// Minimum improvement for an integer bound to count as tightened.
const INTEGER_IMPROVEMENT: f64 = 0.5;

/// Compare each row's activity range with its bounds.
///
/// Rows that can never be satisfied make the model infeasible; rows that are
/// always satisfied are dropped. Otherwise the activity range implies bounds
/// on the row's columns, which are installed for integer columns and for
/// continuous columns whose bound is infinite.
pub fn propagate_row_bounds(ws: &mut PresolveWorkspace, stack: &mut ReductionStack) -> RuleOutcome {
    let mut applied = false;
    for i in 0..ws.num_row() {
        if !ws.row_active[i] || ws.rows[i].is_empty() {
            continue;
        }
        let (lower, upper) = (ws.row_lower[i], ws.row_upper[i]);
        let act = ws.activity(i);
        let slack = ws.tol * (1.0 + lower.abs().min(upper.abs()).min(1e6));
        if act.min() > upper + slack || act.max() < lower - slack {
            log::debug!(
                "presolve: row {} activity [{}, {}] misses bounds [{}, {}]",
                i,
                act.min(),
                act.max(),
                lower,
                upper
            );
            return RuleOutcome::Infeasible;
        }
        if act.min() >= lower && act.max() <= upper {
            ws.remove_row(i);
            stack.push(Reduction::RedundantRow { row: i });
            applied = true;
            continue;
        }

        // At most one tightening per row and pass; activities are stale after it.
        let entries = ws.rows[i].clone();
        for (j, a) in entries {
            if ws.quadratic[j] {
                continue;
            }
            let (old_l, old_u) = (ws.col_lower[j], ws.col_upper[j]);
            let (lo_contrib, hi_contrib) = if a > 0.0 {
                (a * old_l, a * old_u)
            } else {
                (a * old_u, a * old_l)
            };
            let rest_min = act.min_without(lo_contrib);
            let rest_max = act.max_without(hi_contrib);
            let (implied_l, implied_u) = if a > 0.0 {
                ((lower - rest_max) / a, (upper - rest_min) / a)
            } else {
                ((upper - rest_min) / a, (lower - rest_max) / a)
            };
            let (implied_l, implied_u) = ws.rounded(j, implied_l, implied_u);

            let accept = |implied: f64, current: f64, tighter: bool| {
                implied.is_finite()
                    && implied.abs() < MAX_IMPLIED_BOUND
                    && tighter
                    && if ws.integer[j] {
                        (implied - current).abs() >= INTEGER_IMPROVEMENT
                    } else {
                        !current.is_finite()
                    }
            };
            let new_l = if accept(implied_l, old_l, implied_l > old_l) { implied_l } else { old_l };
            let new_u = if accept(implied_u, old_u, implied_u < old_u) { implied_u } else { old_u };
            if new_l == old_l && new_u == old_u {
                continue;
            }
            if new_l > new_u + ws.tol * (1.0 + new_u.abs()) {
                return RuleOutcome::Infeasible;
            }
            ws.col_lower[j] = new_l;
            ws.col_upper[j] = new_u.max(new_l);
            stack.push(Reduction::BoundTightening {
                col: j,
                row: i,
                coef: a,
                old_lower: old_l,
                old_upper: old_u,
                new_lower: new_l,
                new_upper: ws.col_upper[j],
            });
            applied = true;
            break;
        }
    }
    RuleOutcome::from_applied(applied)
}

/// Fix columns whose cost pushes them toward a bound no row prevents them
/// from reaching.
pub fn fix_dominated_columns(ws: &mut PresolveWorkspace, stack: &mut ReductionStack) -> RuleOutcome {
    let mut applied = false;
    for j in 0..ws.num_col() {
        if !ws.col_active[j] || ws.quadratic[j] || ws.cols[j].is_empty() {
            continue;
        }
        // A lock: moving the column in that direction can violate a row.
        let mut down_locks = 0;
        let mut up_locks = 0;
        for &(i, a) in &ws.cols[j] {
            let (has_l, has_u) = (ws.row_lower[i].is_finite(), ws.row_upper[i].is_finite());
            if (a > 0.0 && has_l) || (a < 0.0 && has_u) {
                down_locks += 1;
            }
            if (a > 0.0 && has_u) || (a < 0.0 && has_l) {
                up_locks += 1;
            }
        }
        let c = ws.col_cost[j];
        let (l, u) = (ws.col_lower[j], ws.col_upper[j]);
        let value = if c > 0.0 && down_locks == 0 {
            l
        } else if c < 0.0 && up_locks == 0 {
            u
        } else if c == 0.0 && down_locks == 0 && l.is_finite() {
            l
        } else if c == 0.0 && up_locks == 0 && u.is_finite() {
            u
        } else {
            continue;
        };
        if !value.is_finite() {
            log::debug!("presolve: column {} improves without limit", j);
            return RuleOutcome::Unbounded;
        }
        ws.fix_col(j, value);
        stack.push(Reduction::DominatedCol { col: j, value });
        applied = true;
    }
    RuleOutcome::from_applied(applied)
}
