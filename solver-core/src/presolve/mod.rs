//! Presolve: local reductions applied to a fixpoint.
//!
//! Rules run in a fixed priority order over an explicit
//! ([`PresolveWorkspace`], [`ReductionStack`]) pair. A pass runs every rule
//! once; passes repeat until no rule applies or the pass limit is reached.
//! The first infeasible or unbounded verdict ends presolve.

pub mod bounds;
pub mod duplicate;
pub mod eliminate;
pub mod singleton;
pub mod workspace;

use crate::context::SolveContext;
use crate::postsolve::ReductionStack;
use crate::problem::Model;
use crate::util::logging::LogEvent;

pub use workspace::PresolveWorkspace;

/// Result of applying one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Applied,
    NotApplicable,
    Infeasible,
    Unbounded,
}

impl RuleOutcome {
    pub fn from_applied(applied: bool) -> Self {
        if applied {
            RuleOutcome::Applied
        } else {
            RuleOutcome::NotApplicable
        }
    }
}

pub type Rule = fn(&mut PresolveWorkspace, &mut ReductionStack) -> RuleOutcome;

/// Rules in priority order.
pub const RULES: [(&str, Rule); 9] = [
    ("empty rows", eliminate::remove_empty_rows),
    ("empty columns", eliminate::remove_empty_columns),
    ("fixed columns", eliminate::remove_fixed_columns),
    ("singleton rows", singleton::remove_singleton_rows),
    ("free column singletons", singleton::remove_free_column_singletons),
    ("row bounds", bounds::propagate_row_bounds),
    ("dominated columns", bounds::fix_dominated_columns),
    ("duplicate rows", duplicate::merge_duplicate_rows),
    ("duplicate columns", duplicate::merge_duplicate_columns),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresolveStatus {
    /// No rule applied; the reduced model equals the original.
    NotReduced,
    Reduced,
    /// Every row and column was removed.
    ReducedToEmpty,
    Infeasible,
    Unbounded,
}

/// Reduced model plus the stack needed to map its solution back.
#[derive(Debug, Clone)]
pub struct PresolveResult {
    pub status: PresolveStatus,
    pub model: Model,
    pub stack: ReductionStack,
    pub passes: usize,
}

/// Presolve a minimization model.
pub fn presolve(model: &Model, ctx: &SolveContext) -> PresolveResult {
    let settings = ctx.settings();
    let mut ws = PresolveWorkspace::new(model, settings.primal_feasibility_tolerance);
    let mut stack = ReductionStack::new(model.num_col(), model.num_row());
    let finish = |status, stack, passes| PresolveResult {
        status,
        model: model.clone(),
        stack,
        passes,
    };

    if let Some(conflict) = ws.bound_conflict() {
        ctx.message(log::Level::Debug, format!("presolve: inconsistent {}", conflict));
        return finish(PresolveStatus::Infeasible, stack, 0);
    }

    let mut passes = 0;
    while passes < settings.presolve_pass_limit {
        passes += 1;
        let mut any = false;
        for (name, rule) in RULES {
            match rule(&mut ws, &mut stack) {
                RuleOutcome::Applied => {
                    log::trace!("presolve pass {}: {} applied", passes, name);
                    any = true;
                }
                RuleOutcome::NotApplicable => {}
                RuleOutcome::Infeasible => {
                    ctx.message(log::Level::Debug, format!("presolve: {} proved infeasibility", name));
                    return finish(PresolveStatus::Infeasible, stack, passes);
                }
                RuleOutcome::Unbounded => {
                    ctx.message(log::Level::Debug, format!("presolve: {} proved unboundedness", name));
                    return finish(PresolveStatus::Unbounded, stack, passes);
                }
            }
        }
        if !any {
            break;
        }
    }

    let (reduced, col_map, row_map) = ws.reduced_model(model);
    stack.set_maps(col_map, row_map);
    ctx.emit(LogEvent::Presolve {
        rows_removed: stack.rows_removed(),
        cols_removed: stack.cols_removed(),
        reductions: stack.len(),
        passes,
    });
    let status = if stack.is_empty() {
        PresolveStatus::NotReduced
    } else if reduced.num_col() == 0 && reduced.num_row() == 0 {
        PresolveStatus::ReducedToEmpty
    } else {
        PresolveStatus::Reduced
    };
    PresolveResult {
        status,
        model: reduced,
        stack,
        passes,
    }
}
