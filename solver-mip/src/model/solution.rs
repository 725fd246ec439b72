//! MIP solution types.

use solver_core::util::numerics::relative_gap;
use solver_core::ModelStatus;

/// Complete MIP solution with diagnostics.
///
/// Objective values are in minimization form.
#[derive(Debug, Clone)]
pub struct MipSolution {
    /// Solve status.
    pub status: ModelStatus,

    /// Primal solution (empty if none was found).
    pub x: Vec<f64>,

    /// Objective value of best solution (primal bound).
    pub obj_val: f64,

    /// Best dual bound (from LP relaxations).
    pub bound: f64,

    /// Relative optimality gap: (obj_val - bound) / |obj_val|.
    pub gap: f64,

    /// Number of B&B nodes whose relaxation was solved.
    pub nodes_explored: usize,

    /// Nodes fathomed or found integer feasible.
    pub leaves: usize,

    /// Simplex and IPM iterations over all relaxations.
    pub lp_iterations: usize,

    /// Number of cuts added.
    pub cuts_added: usize,

    /// Number of times incumbent was updated.
    pub incumbent_updates: usize,
}

impl Default for MipSolution {
    fn default() -> Self {
        Self {
            status: ModelStatus::NotSet,
            x: Vec::new(),
            obj_val: f64::INFINITY,
            bound: f64::NEG_INFINITY,
            gap: f64::INFINITY,
            nodes_explored: 0,
            leaves: 0,
            lp_iterations: 0,
            cuts_added: 0,
            incumbent_updates: 0,
        }
    }
}

impl MipSolution {
    /// A run that ended before any node was solved.
    pub fn with_status(status: ModelStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Returns true if a feasible solution was found.
    pub fn has_solution(&self) -> bool {
        !self.x.is_empty()
    }

    /// Relative gap `|primal - dual| / max(1, |primal|)`.
    pub fn compute_gap(primal: f64, dual: f64) -> f64 {
        relative_gap(primal, dual)
    }
}

/// Tracks the best known feasible solution (incumbent).
#[derive(Debug, Clone)]
pub struct IncumbentTracker {
    /// Current best solution (if any).
    pub solution: Option<Vec<f64>>,

    /// Objective value of incumbent (primal bound).
    /// Initialized to +∞ for minimization.
    pub obj_val: f64,

    /// Number of times incumbent was updated.
    pub update_count: usize,
}

impl Default for IncumbentTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl IncumbentTracker {
    /// Create a new incumbent tracker.
    pub fn new() -> Self {
        Self {
            solution: None,
            obj_val: f64::INFINITY,
            update_count: 0,
        }
    }

    /// Check if we have an incumbent.
    pub fn has_incumbent(&self) -> bool {
        self.solution.is_some()
    }

    /// Try to update incumbent with a new solution.
    ///
    /// Returns true if the incumbent was improved by more than `epsilon`.
    pub fn update(&mut self, x: &[f64], obj: f64, epsilon: f64) -> bool {
        if obj < self.obj_val - epsilon {
            self.solution = Some(x.to_vec());
            self.obj_val = obj;
            self.update_count += 1;
            true
        } else {
            false
        }
    }

    /// Compute relative gap to a dual bound.
    pub fn gap(&self, dual_bound: f64) -> f64 {
        MipSolution::compute_gap(self.obj_val, dual_bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incumbent_tracker() {
        let mut tracker = IncumbentTracker::new();

        assert!(!tracker.has_incumbent());
        assert_eq!(tracker.obj_val, f64::INFINITY);

        // First solution
        assert!(tracker.update(&[1.0, 2.0], 10.0, 1e-9));
        assert!(tracker.has_incumbent());
        assert_eq!(tracker.obj_val, 10.0);
        assert_eq!(tracker.update_count, 1);

        // Worse solution (rejected)
        assert!(!tracker.update(&[2.0, 3.0], 15.0, 1e-9));
        assert_eq!(tracker.obj_val, 10.0);

        // Equal within epsilon (rejected)
        assert!(!tracker.update(&[2.0, 3.0], 10.0 - 1e-12, 1e-9));
        assert_eq!(tracker.update_count, 1);

        // Better solution (accepted)
        assert!(tracker.update(&[0.5, 1.0], 5.0, 1e-9));
        assert_eq!(tracker.obj_val, 5.0);
        assert_eq!(tracker.update_count, 2);
    }

    #[test]
    fn test_gap_computation() {
        let gap = MipSolution::compute_gap(10.0, 8.0);
        assert!((gap - 0.2).abs() < 1e-10);

        let gap = MipSolution::compute_gap(10.0, 9.9999);
        assert!(gap < 0.001);

        assert_eq!(MipSolution::compute_gap(f64::INFINITY, 1.0), f64::INFINITY);
    }
}
