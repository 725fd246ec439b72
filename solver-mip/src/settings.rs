//! Configuration settings for the MIP solver.

use solver_core::SolverSettings;

/// Branching variable selection rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BranchingRule {
    /// Select variable with fractional part closest to 0.5.
    MostFractional,

    /// Use pseudocost estimates from previous branches.
    Pseudocost,

    /// Reliability branching: strong branching until pseudocosts are reliable.
    ///
    /// Variables are evaluated by strong branching until both directions
    /// have been observed `reliability_count` times, then pseudocosts are
    /// used.
    #[default]
    Reliability,
}

/// Node selection strategy for the B&B tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeSelection {
    /// Always select node with best (lowest) dual bound.
    #[default]
    BestBound,

    /// Depth-first search (helps find feasible solutions quickly).
    DepthFirst,

    /// Select by estimated objective value.
    BestEstimate,

    /// Depth-first until the first incumbent, then best-bound.
    TwoPhase,
}

/// MIP solver settings.
#[derive(Debug, Clone)]
pub struct MipSettings {
    // === Termination criteria ===
    /// Maximum number of nodes to explore.
    pub max_nodes: usize,

    /// Maximum number of leaves (fathomed or integer nodes).
    pub max_leaves: usize,

    /// Maximum nodes without incumbent improvement once one exists.
    pub max_stall_nodes: usize,

    /// Relative optimality gap tolerance.
    /// Stop when (incumbent - bound) / |incumbent| <= rel_gap.
    pub rel_gap: f64,

    /// Integer feasibility tolerance.
    /// A variable is considered integer if |x - round(x)| <= int_feas_tol.
    pub int_feas_tol: f64,

    /// Objective difference below which a node does not improve.
    pub epsilon: f64,

    /// Prune nodes whose bound reaches this value.
    pub cutoff: f64,

    // === Search strategy ===
    /// Branching variable selection rule.
    pub branching_rule: BranchingRule,

    /// Minimum observations per direction before pseudocosts are trusted.
    pub reliability_count: usize,

    /// Candidates evaluated by strong branching per node.
    pub strong_branching_candidates: usize,

    /// Simplex iteration limit of one strong-branching solve.
    pub strong_branching_iterations: usize,

    /// Node selection strategy.
    pub node_selection: NodeSelection,

    /// Threads evaluating sibling nodes.
    pub threads: usize,

    // === Cut settings ===
    /// Separation rounds at the root.
    pub cut_rounds: usize,

    /// Maximum cuts to add per separation round.
    pub cuts_per_round: usize,

    /// Cuts older than this are left out of node LPs.
    pub lp_age_limit: usize,

    /// Cuts older than this are evicted from the pool.
    pub pool_age_limit: usize,

    /// Pool size above which eviction becomes more aggressive.
    pub pool_soft_limit: usize,

    // === Heuristics ===
    /// Share of relaxation simplex iterations heuristics may spend.
    pub heuristic_effort: f64,

    // === Output ===
    /// 0: none, 1: every `log_freq` nodes, 2: every node.
    pub report_level: u8,

    /// Log frequency (report every N nodes at level 1).
    pub log_freq: usize,
}

impl Default for MipSettings {
    fn default() -> Self {
        Self::from_solver(&SolverSettings::default())
    }
}

impl MipSettings {
    /// Derive from the typed solver settings of a run.
    pub fn from_solver(settings: &SolverSettings) -> Self {
        Self {
            max_nodes: settings.mip_max_nodes,
            max_leaves: settings.mip_max_leaves,
            max_stall_nodes: settings.mip_max_stall_nodes,
            rel_gap: settings.mip_rel_gap,
            int_feas_tol: settings.mip_feasibility_tolerance,
            epsilon: settings.mip_epsilon,
            cutoff: f64::INFINITY,
            branching_rule: BranchingRule::default(),
            reliability_count: settings.mip_pscost_minreliable,
            strong_branching_candidates: 8,
            strong_branching_iterations: 100,
            node_selection: NodeSelection::default(),
            threads: settings.worker_threads(),
            cut_rounds: settings.mip_cut_rounds,
            cuts_per_round: 50,
            lp_age_limit: settings.mip_lp_age_limit,
            pool_age_limit: settings.mip_pool_age_limit,
            pool_soft_limit: settings.mip_pool_soft_limit,
            heuristic_effort: settings.mip_heuristic_effort,
            report_level: settings.mip_report_level,
            log_freq: 100,
        }
    }

    /// Set maximum nodes.
    pub fn with_max_nodes(mut self, nodes: usize) -> Self {
        self.max_nodes = nodes;
        self
    }

    /// Set optimality gap tolerance.
    pub fn with_rel_gap(mut self, gap: f64) -> Self {
        self.rel_gap = gap;
        self
    }

    /// Set the node cutoff.
    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Whether node `count` gets a progress report.
    pub fn report_node(&self, count: usize) -> bool {
        match self.report_level {
            0 => false,
            1 => count % self.log_freq.max(1) == 0,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_solver_settings() {
        let mut solver = SolverSettings::default();
        solver.mip_max_nodes = 42;
        solver.mip_rel_gap = 0.01;
        solver.mip_pscost_minreliable = 3;
        let s = MipSettings::from_solver(&solver);
        assert_eq!(s.reliability_count, 3);
        assert_eq!(s.max_nodes, 42);
        assert_eq!(s.rel_gap, 0.01);
        assert_eq!(s.cutoff, f64::INFINITY);
    }

    #[test]
    fn test_report_levels() {
        let mut s = MipSettings::default();
        s.report_level = 0;
        assert!(!s.report_node(100));
        s.report_level = 1;
        assert!(s.report_node(100));
        assert!(!s.report_node(101));
        s.report_level = 2;
        assert!(s.report_node(101));
    }
}
