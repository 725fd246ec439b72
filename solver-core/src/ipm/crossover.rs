//! Crossover from an interior solution to a vertex basis.
//!
//! Each variable is compared against its bounds: a slack smaller than its
//! multiplier marks the variable as nonbasic at that bound. The `m`
//! variables farthest from their bounds (relative to their multipliers)
//! form the starting basis, which the simplex repairs if singular and then
//! cleans up to optimality.

use crate::context::SolveContext;
use crate::problem::Model;
use crate::simplex::{self, SimplexResult};
use crate::solution::{Basis, BasisStatus, ModelStatus};
use crate::util::logging::LogEvent;

use super::workspace::{BoundKind, IpmState};

/// Guard against division by a vanishing multiplier.
const MULTIPLIER_FLOOR: f64 = 1e-300;

/// Crossover result.
#[derive(Debug, Clone)]
pub struct CrossoverResult {
    pub success: bool,
    pub simplex: SimplexResult,
}

/// Interiorness of variable `v`; infinite for free variables.
fn interiorness(st: &IpmState, v: usize) -> f64 {
    let mut score = f64::INFINITY;
    if st.kind[v].has_lower() {
        score = score.min(st.slack_lower(v) / st.wl[v].max(MULTIPLIER_FLOOR));
    }
    if st.kind[v].has_upper() {
        score = score.min(st.slack_upper(v) / st.wu[v].max(MULTIPLIER_FLOOR));
    }
    score
}

/// Nonbasic status nearest to the interior value.
fn nearest_status(st: &IpmState, v: usize) -> BasisStatus {
    match st.kind[v] {
        BoundKind::Fixed => BasisStatus::Fixed,
        BoundKind::Free => BasisStatus::Free,
        BoundKind::Lower => BasisStatus::AtLower,
        BoundKind::Upper => BasisStatus::AtUpper,
        BoundKind::Boxed => {
            if st.slack_lower(v) / st.wl[v].max(MULTIPLIER_FLOOR)
                <= st.slack_upper(v) / st.wu[v].max(MULTIPLIER_FLOOR)
            {
                BasisStatus::AtLower
            } else {
                BasisStatus::AtUpper
            }
        }
    }
}

/// Build the starting basis from the interior iterate.
pub fn identify_basis(st: &IpmState) -> Basis {
    let (n, m) = (st.n, st.m);
    let mut order: Vec<usize> = (0..n + m).filter(|&v| st.kind[v] != BoundKind::Fixed).collect();
    order.sort_by(|&a, &b| interiorness(st, b).total_cmp(&interiorness(st, a)).then(a.cmp(&b)));

    let mut status: Vec<BasisStatus> = (0..n + m).map(|v| nearest_status(st, v)).collect();
    let mut basic_index: Vec<usize> = order.into_iter().take(m).collect();
    for &v in &basic_index {
        status[v] = BasisStatus::Basic;
    }
    // Fixed variables fill any remaining slots.
    for v in 0..n + m {
        if basic_index.len() == m {
            break;
        }
        if !status[v].is_basic() {
            status[v] = BasisStatus::Basic;
            basic_index.push(v);
        }
    }
    Basis {
        valid: true,
        col_status: status[..n].to_vec(),
        row_status: status[n..].to_vec(),
        basic_index,
    }
}

/// Run crossover for an LP whose interior solution is `st`.
pub fn run(model: &Model, st: &IpmState, ctx: &SolveContext) -> CrossoverResult {
    let basis = identify_basis(st);
    let simplex = simplex::solve(model, Some(&basis), ctx);
    let success = simplex.status == ModelStatus::Optimal;
    ctx.emit(LogEvent::Crossover {
        success,
        iterations: simplex.iterations,
    });
    CrossoverResult { success, simplex }
}
