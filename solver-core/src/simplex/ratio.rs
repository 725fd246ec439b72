//! Two-pass Harris ratio tests.
//!
//! The first pass computes the largest step that keeps every candidate
//! within its bound relaxed by the feasibility tolerance; the second pass
//! picks, among the candidates whose exact ratio does not exceed that step,
//! the one with the largest pivot magnitude.

use crate::solution::BasisStatus;

use super::workspace::{SimplexWorkspace, NONBASIC, PIVOT_ZERO};

/// Result of the primal ratio test for entering variable `q`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PrimalStep {
    /// The entering variable reaches its opposite bound first.
    Flip { step: f64 },
    /// Basic variable in `slot` leaves at `leave_value`.
    Pivot { slot: usize, step: f64, leave_value: f64 },
    /// No basic variable blocks and the entering variable is not boxed.
    Unbounded,
}

/// Where basic variable `v` blocks when moving at `rate` per unit step,
/// as (distance, bound). In phase 1 an infeasible variable blocks at the
/// bound it violates and never while moving away from it.
fn primal_block(ws: &SimplexWorkspace<'_>, v: usize, rate: f64, phase_one: bool) -> Option<(f64, f64)> {
    let (x, l, u) = (ws.x[v], ws.lower[v], ws.upper[v]);
    let tol = ws.primal_tol;
    if phase_one && x < l - tol {
        return (rate > 0.0).then(|| (l - x, l));
    }
    if phase_one && x > u + tol {
        return (rate < 0.0).then(|| (x - u, u));
    }
    if rate < 0.0 && l.is_finite() {
        Some((x - l, l))
    } else if rate > 0.0 && u.is_finite() {
        Some((u - x, u))
    } else {
        None
    }
}

/// Primal ratio test for `q` moving in direction `dir` (+1 up, -1 down)
/// with ftran'd column `alpha`.
pub(crate) fn primal_ratio(
    ws: &SimplexWorkspace<'_>,
    q: usize,
    dir: f64,
    alpha: &[f64],
    phase_one: bool,
) -> PrimalStep {
    let tol = ws.primal_tol;

    let mut relaxed = f64::INFINITY;
    for (k, &a) in alpha.iter().enumerate() {
        if a.abs() <= PIVOT_ZERO {
            continue;
        }
        let rate = -dir * a;
        if let Some((dist, _)) = primal_block(ws, ws.basic[k], rate, phase_one) {
            relaxed = relaxed.min((dist.max(0.0) + tol) / rate.abs());
        }
    }

    let range = ws.upper[q] - ws.lower[q];
    if range.is_finite() && range <= relaxed {
        return PrimalStep::Flip { step: range };
    }
    if relaxed == f64::INFINITY {
        return PrimalStep::Unbounded;
    }

    let mut best: Option<(usize, f64, f64, f64)> = None;
    for (k, &a) in alpha.iter().enumerate() {
        if a.abs() <= PIVOT_ZERO {
            continue;
        }
        let rate = -dir * a;
        if let Some((dist, bound)) = primal_block(ws, ws.basic[k], rate, phase_one) {
            let ratio = dist.max(0.0) / rate.abs();
            if ratio <= relaxed && best.map_or(true, |b| a.abs() > b.3) {
                best = Some((k, ratio, bound, a.abs()));
            }
        }
    }
    match best {
        Some((slot, step, leave_value, _)) => PrimalStep::Pivot {
            slot,
            step,
            leave_value,
        },
        None => PrimalStep::Unbounded,
    }
}

/// Sign-consistent magnitude of `d` if nonbasic `v` blocks the dual step,
/// where `s` is -1 when the leaving variable goes to its lower bound and +1
/// when it goes to its upper bound.
fn dual_block(ws: &SimplexWorkspace<'_>, v: usize, d: f64, alpha: f64, s: f64) -> Option<f64> {
    match ws.status[v] {
        BasisStatus::AtLower if s * alpha > 0.0 => Some(d),
        BasisStatus::AtUpper if s * alpha < 0.0 => Some(-d),
        BasisStatus::Free => Some(0.0),
        _ => None,
    }
}

/// Dual ratio test over the pivot row `alpha_row`; returns the entering
/// variable or None when the dual is unbounded (primal infeasible).
pub(crate) fn dual_ratio(ws: &SimplexWorkspace<'_>, alpha_row: &[f64], dual: &[f64], s: f64) -> Option<usize> {
    let tol = ws.dual_tol;

    let mut relaxed = f64::INFINITY;
    for v in 0..ws.num_vars() {
        let a = alpha_row[v];
        if ws.slot_of[v] != NONBASIC || a.abs() <= PIVOT_ZERO {
            continue;
        }
        if let Some(d) = dual_block(ws, v, dual[v], a, s) {
            relaxed = relaxed.min((d.max(0.0) + tol) / a.abs());
        }
    }
    if relaxed == f64::INFINITY {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for v in 0..ws.num_vars() {
        let a = alpha_row[v];
        if ws.slot_of[v] != NONBASIC || a.abs() <= PIVOT_ZERO {
            continue;
        }
        if let Some(d) = dual_block(ws, v, dual[v], a, s) {
            let ratio = d.max(0.0) / a.abs();
            if ratio <= relaxed && best.map_or(true, |b| a.abs() > b.1) {
                best = Some((v, a.abs()));
            }
        }
    }
    best.map(|(v, _)| v)
}
