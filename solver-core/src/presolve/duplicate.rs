//! Parallel rows and parallel columns.

use std::collections::HashMap;

use crate::linalg::sparse::SparseVec;
use crate::postsolve::{Reduction, ReductionStack};

use super::workspace::PresolveWorkspace;
use super::RuleOutcome;

/// Relative tolerance for two vectors to count as parallel.
const PARALLEL_TOL: f64 = 1e-12;

/// `ratio` with `b = ratio * a` entrywise, when the two share their support.
fn parallel_ratio(a: &SparseVec, b: &SparseVec) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let ratio = b[0].1 / a[0].1;
    let same = a.iter().zip(b).all(|(&(ia, va), &(ib, vb))| {
        ia == ib && (vb - ratio * va).abs() <= PARALLEL_TOL * vb.abs().max(1.0)
    });
    same.then_some(ratio)
}

/// Group indices by the support of their entry list.
fn group_by_support(lists: &[SparseVec], candidate: impl Fn(usize) -> bool) -> Vec<Vec<usize>> {
    let mut groups: HashMap<Vec<usize>, Vec<usize>> = HashMap::new();
    for (k, list) in lists.iter().enumerate() {
        if candidate(k) {
            let mut support: Vec<usize> = list.iter().map(|&(i, _)| i).collect();
            support.sort_unstable();
            groups.entry(support).or_default().push(k);
        }
    }
    let mut groups: Vec<Vec<usize>> = groups.into_values().filter(|g| g.len() > 1).collect();
    groups.sort();
    groups
}

/// Merge each row that is a multiple of an earlier row into it.
pub fn merge_duplicate_rows(ws: &mut PresolveWorkspace, stack: &mut ReductionStack) -> RuleOutcome {
    let groups = group_by_support(&ws.rows, |i| ws.row_active[i] && ws.rows[i].len() > 1);
    let mut applied = false;
    for group in groups {
        for (pos, &kept) in group.iter().enumerate() {
            if !ws.row_active[kept] {
                continue;
            }
            for &removed in &group[pos + 1..] {
                if !ws.row_active[removed] {
                    continue;
                }
                let Some(ratio) = parallel_ratio(&ws.rows[kept], &ws.rows[removed]) else {
                    continue;
                };
                let (rl, ru) = (ws.row_lower[removed], ws.row_upper[removed]);
                let (lo, hi) = if ratio > 0.0 {
                    (rl / ratio, ru / ratio)
                } else {
                    (ru / ratio, rl / ratio)
                };
                let (kl, ku) = (ws.row_lower[kept], ws.row_upper[kept]);
                let new_l = kl.max(lo);
                let new_u = ku.min(hi);
                if new_l > new_u + ws.tol * (1.0 + new_u.abs()) {
                    log::debug!("presolve: parallel rows {} and {} conflict", kept, removed);
                    return RuleOutcome::Infeasible;
                }
                ws.row_lower[kept] = new_l;
                ws.row_upper[kept] = new_u.max(new_l);
                ws.remove_row(removed);
                stack.push(Reduction::DuplicateRow {
                    kept,
                    removed,
                    ratio,
                    kept_lower: kl,
                    kept_upper: ku,
                    removed_lower: rl,
                    removed_upper: ru,
                });
                applied = true;
            }
        }
    }
    RuleOutcome::from_applied(applied)
}

/// Merge continuous columns that are multiples of each other, cost included.
pub fn merge_duplicate_columns(ws: &mut PresolveWorkspace, stack: &mut ReductionStack) -> RuleOutcome {
    let groups = group_by_support(&ws.cols, |j| {
        ws.col_active[j] && !ws.cols[j].is_empty() && !ws.integer[j] && !ws.quadratic[j]
    });
    let mut applied = false;
    for group in groups {
        for (pos, &kept) in group.iter().enumerate() {
            if !ws.col_active[kept] {
                continue;
            }
            for &removed in &group[pos + 1..] {
                if !ws.col_active[removed] {
                    continue;
                }
                let Some(ratio) = parallel_ratio(&ws.cols[kept], &ws.cols[removed]) else {
                    continue;
                };
                let (ck, cr) = (ws.col_cost[kept], ws.col_cost[removed]);
                if (cr - ratio * ck).abs() > PARALLEL_TOL * cr.abs().max(1.0) {
                    continue;
                }
                let (kl, ku) = (ws.col_lower[kept], ws.col_upper[kept]);
                let (rl, ru) = (ws.col_lower[removed], ws.col_upper[removed]);
                let (new_l, new_u) = if ratio > 0.0 {
                    (kl + ratio * rl, ku + ratio * ru)
                } else {
                    (kl + ratio * ru, ku + ratio * rl)
                };
                ws.col_lower[kept] = new_l;
                ws.col_upper[kept] = new_u;
                ws.remove_col(removed);
                stack.push(Reduction::DuplicateCol {
                    kept,
                    removed,
                    ratio,
                    kept_lower: kl,
                    kept_upper: ku,
                    removed_lower: rl,
                    removed_upper: ru,
                });
                applied = true;
            }
        }
    }
    RuleOutcome::from_applied(applied)
}
