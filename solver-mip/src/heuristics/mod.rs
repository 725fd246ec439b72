//! Primal heuristics.
//!
//! Heuristics share an iteration budget: they may spend at most
//! `heuristic_effort` times the simplex iterations the search has spent on
//! relaxations so far. The root dive always runs.

mod diving;
mod rounding;

pub use diving::{fractional_dive, DiveSettings};
pub use rounding::{fix_and_solve, simple_rounding};

/// A candidate incumbent (minimization objective).
#[derive(Debug, Clone)]
pub struct HeuristicSolution {
    pub x: Vec<f64>,
    pub obj_val: f64,
}

/// Result of one heuristic call.
#[derive(Debug, Clone, Default)]
pub struct HeuristicOutcome {
    pub solution: Option<HeuristicSolution>,
    /// Simplex iterations spent.
    pub iterations: usize,
}

/// Iteration budget shared by all heuristics of a run.
#[derive(Debug, Clone)]
pub struct HeuristicBudget {
    effort: f64,
    spent: usize,
}

impl HeuristicBudget {
    pub fn new(effort: f64) -> Self {
        Self {
            effort: effort.clamp(0.0, 1.0),
            spent: 0,
        }
    }

    /// Whether another LP-based heuristic may run, given the iterations
    /// spent on relaxations so far.
    pub fn allows(&self, relaxation_iterations: usize) -> bool {
        self.effort > 0.0 && (self.spent as f64) <= self.effort * relaxation_iterations as f64
    }

    /// Iterations still available.
    pub fn remaining(&self, relaxation_iterations: usize) -> usize {
        let allowed = self.effort * relaxation_iterations as f64;
        (allowed - self.spent as f64).max(0.0) as usize
    }

    pub fn charge(&mut self, iterations: usize) {
        self.spent += iterations;
    }

    pub fn spent(&self) -> usize {
        self.spent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_tracks_effort() {
        let mut budget = HeuristicBudget::new(0.1);
        assert!(budget.allows(100));
        budget.charge(20);
        assert!(!budget.allows(100));
        assert!(budget.allows(200));
        assert_eq!(budget.remaining(300), 10);
        assert_eq!(budget.spent(), 20);
    }

    #[test]
    fn test_zero_effort_disables() {
        let budget = HeuristicBudget::new(0.0);
        assert!(!budget.allows(1_000_000));
    }
}
