//! Structured solver events and the injectable sink they are delivered to.
//!
//! Events are produced at loop boundaries only. A sink observes them but can
//! never influence the solve; with no sink installed the `log` facade still
//! receives debug-level records.

use std::fmt;
use std::sync::Arc;

/// Receiver for [`LogEvent`]s. Must be cheap and non-blocking.
pub type LogSink = Arc<dyn Fn(&LogEvent) + Send + Sync>;

/// Which simplex variant produced an iteration event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimplexKind {
    Primal,
    Dual,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    /// Presolve finished.
    Presolve {
        rows_removed: usize,
        cols_removed: usize,
        reductions: usize,
        passes: usize,
    },
    /// Periodic simplex progress.
    SimplexIteration {
        kind: SimplexKind,
        iteration: usize,
        phase: u8,
        objective: f64,
        primal_infeasibility: f64,
        dual_infeasibility: f64,
    },
    /// Periodic interior-point progress.
    IpmIteration {
        iteration: usize,
        primal_residual: f64,
        dual_residual: f64,
        gap: f64,
        mu: f64,
    },
    /// Crossover finished (successfully or not).
    Crossover { success: bool, iterations: usize },
    /// Branch-and-bound progress line.
    MipNode {
        nodes: usize,
        open_nodes: usize,
        leaves: usize,
        dual_bound: f64,
        primal_bound: f64,
        gap: f64,
    },
    /// Free-form message.
    Message { level: log::Level, text: String },
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEvent::Presolve {
                rows_removed,
                cols_removed,
                reductions,
                passes,
            } => write!(
                f,
                "presolve: removed {} rows, {} cols ({} reductions, {} passes)",
                rows_removed, cols_removed, reductions, passes
            ),
            LogEvent::SimplexIteration {
                kind,
                iteration,
                phase,
                objective,
                primal_infeasibility,
                dual_infeasibility,
            } => write!(
                f,
                "{:?} simplex iter {:>6} ph{} obj {:+.8e} pinf {:.2e} dinf {:.2e}",
                kind, iteration, phase, objective, primal_infeasibility, dual_infeasibility
            ),
            LogEvent::IpmIteration {
                iteration,
                primal_residual,
                dual_residual,
                gap,
                mu,
            } => write!(
                f,
                "ipm iter {:>4} rp {:.2e} rd {:.2e} gap {:.2e} mu {:.2e}",
                iteration, primal_residual, dual_residual, gap, mu
            ),
            LogEvent::Crossover { success, iterations } => write!(
                f,
                "crossover {} after {} iterations",
                if *success { "succeeded" } else { "failed" },
                iterations
            ),
            LogEvent::MipNode {
                nodes,
                open_nodes,
                leaves,
                dual_bound,
                primal_bound,
                gap,
            } => write!(
                f,
                "nodes {} open {} leaves {} dual {:.6e} primal {:.6e} gap {:.2}%",
                nodes,
                open_nodes,
                leaves,
                dual_bound,
                primal_bound,
                gap * 100.0
            ),
            LogEvent::Message { text, .. } => write!(f, "{}", text),
        }
    }
}

/// Iteration reporting cadence derived from `log_dev_level`.
///
/// Level 0 reports summaries only; 1, 2 and 3 report every 100th, 10th and
/// every iteration respectively.
pub fn iteration_stride(log_dev_level: u8) -> Option<usize> {
    match log_dev_level {
        0 => None,
        1 => Some(100),
        2 => Some(10),
        _ => Some(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_stride() {
        assert_eq!(iteration_stride(0), None);
        assert_eq!(iteration_stride(1), Some(100));
        assert_eq!(iteration_stride(3), Some(1));
    }

    #[test]
    fn test_display_presolve() {
        let e = LogEvent::Presolve {
            rows_removed: 2,
            cols_removed: 1,
            reductions: 3,
            passes: 1,
        };
        assert!(e.to_string().contains("removed 2 rows"));
    }
}
