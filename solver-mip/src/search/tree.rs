//! Branch-and-bound tree controller.

use solver_core::util::logging::LogEvent;
use solver_core::{ModelStatus, SolveContext};

use super::{BranchingSelector, NodeQueue, NodeStatus, SearchNode};
use crate::model::{IncumbentTracker, MipProblem, MipSolution};
use crate::settings::MipSettings;

/// Branch-and-bound tree controller.
///
/// Manages the node queue, incumbent, counters and termination. Objective
/// values are in minimization form.
pub struct BranchAndBound {
    /// Node queue.
    queue: NodeQueue,

    /// Branching variable selector.
    pub branching: BranchingSelector,

    /// Incumbent solution tracker.
    pub incumbent: IncumbentTracker,

    /// Next node ID to assign.
    next_node_id: u64,

    /// Nodes whose relaxation was solved.
    nodes_explored: usize,

    /// Nodes fathomed or found integer feasible.
    leaves: usize,

    /// Nodes pruned by bound.
    nodes_pruned: usize,

    /// Nodes pruned only because of the user cutoff.
    cutoff_pruned: usize,

    /// Nodes explored since the incumbent last improved.
    stall_nodes: usize,

    /// Simplex/IPM iterations over all relaxation solves.
    lp_iterations: usize,

    /// Cuts added to the pool.
    cuts_added: usize,

    /// Settings.
    settings: MipSettings,
}

impl BranchAndBound {
    /// Create a new B&B controller.
    pub fn new(settings: MipSettings, prob: &MipProblem) -> Self {
        let mut branching = BranchingSelector::new(
            settings.branching_rule,
            prob.num_vars(),
            settings.reliability_count,
            settings.strong_branching_candidates,
        );
        branching.init_from_objective(&prob.relaxation.col_cost);
        Self {
            queue: NodeQueue::new(settings.node_selection),
            branching,
            incumbent: IncumbentTracker::new(),
            next_node_id: 1, // 0 reserved for root
            nodes_explored: 0,
            leaves: 0,
            nodes_pruned: 0,
            cutoff_pruned: 0,
            stall_nodes: 0,
            lp_iterations: 0,
            cuts_added: 0,
            settings,
        }
    }

    pub fn settings(&self) -> &MipSettings {
        &self.settings
    }

    /// Reserve `count` consecutive node ids.
    pub fn allocate_ids(&mut self, count: u64) -> u64 {
        let first = self.next_node_id;
        self.next_node_id += count;
        first
    }

    /// Get the next node to process.
    pub fn next_node(&mut self) -> Option<SearchNode> {
        self.queue.pop()
    }

    /// Number of open nodes.
    pub fn open_nodes(&self) -> usize {
        self.queue.len()
    }

    /// Queue a solved node, unless the incumbent or cutoff already prunes it.
    pub fn enqueue(&mut self, mut node: SearchNode) {
        if node.can_prune(self.incumbent.obj_val, self.settings.epsilon) {
            self.fathom(&mut node);
            self.nodes_pruned += 1;
            return;
        }
        if node.can_prune(self.settings.cutoff, self.settings.epsilon) {
            self.fathom(&mut node);
            self.cutoff_pruned += 1;
            return;
        }
        node.status = NodeStatus::RelaxationSolved;
        self.queue.push(node);
    }

    /// Count a relaxation solve.
    pub fn node_explored(&mut self, iterations: usize) {
        self.nodes_explored += 1;
        self.lp_iterations += iterations;
        if self.incumbent.has_incumbent() {
            self.stall_nodes += 1;
        }
    }

    /// Node solves left before the node limit.
    pub fn remaining_nodes(&self) -> usize {
        self.settings.max_nodes.saturating_sub(self.nodes_explored)
    }

    /// Iterations spent outside node solves (cuts, heuristics, probing).
    pub fn add_iterations(&mut self, iterations: usize) {
        self.lp_iterations += iterations;
    }

    pub fn lp_iterations(&self) -> usize {
        self.lp_iterations
    }

    pub fn nodes_explored(&self) -> usize {
        self.nodes_explored
    }

    /// Mark a node as a leaf.
    pub fn fathom(&mut self, node: &mut SearchNode) {
        if node.status != NodeStatus::IntegerFeasible {
            node.status = NodeStatus::Fathomed;
        }
        self.leaves += 1;
    }

    /// Record cuts added.
    pub fn record_cuts(&mut self, count: usize) {
        self.cuts_added += count;
    }

    /// Update incumbent with a new solution.
    ///
    /// Returns true if incumbent was improved.
    pub fn update_incumbent(&mut self, x: &[f64], obj: f64) -> bool {
        if obj >= self.settings.cutoff - self.settings.epsilon {
            self.cutoff_pruned += 1;
            return false;
        }
        let improved = self.incumbent.update(x, obj, self.settings.epsilon);

        if improved {
            self.stall_nodes = 0;
            self.queue.set_has_incumbent();
            // Prune nodes dominated by new incumbent
            let pruned = self.queue.prune_by_bound(obj, self.settings.epsilon);
            self.nodes_pruned += pruned;
            self.leaves += pruned;
            log::info!("new incumbent {:.6e}, pruned {} nodes", obj, pruned);
        }

        improved
    }

    /// Node bound at or above which subtrees are not explored.
    pub fn cutoff(&self) -> f64 {
        self.incumbent.obj_val.min(self.settings.cutoff)
    }

    /// Get the best dual bound over open nodes and the incumbent.
    pub fn best_bound(&self) -> f64 {
        self.queue.best_bound().min(self.incumbent.obj_val)
    }

    /// Get the current optimality gap.
    pub fn gap(&self) -> f64 {
        self.incumbent.gap(self.best_bound())
    }

    /// Check termination conditions.
    ///
    /// Returns Some(status) if we should terminate, None otherwise.
    pub fn check_termination(&self, ctx: &SolveContext) -> Option<ModelStatus> {
        let has_incumbent = self.incumbent.has_incumbent();
        if self.queue.is_empty() {
            return Some(if has_incumbent {
                ModelStatus::Optimal
            } else if self.cutoff_pruned > 0 {
                ModelStatus::ObjectiveBound
            } else {
                ModelStatus::Infeasible
            });
        }
        if has_incumbent && self.gap() <= self.settings.rel_gap {
            return Some(ModelStatus::Optimal);
        }
        if ctx.time_limit_reached() {
            return Some(ModelStatus::TimeLimit);
        }
        if self.nodes_explored >= self.settings.max_nodes {
            return Some(ModelStatus::NodeLimit);
        }
        if self.leaves >= self.settings.max_leaves {
            return Some(ModelStatus::LeafLimit);
        }
        if has_incumbent && self.stall_nodes >= self.settings.max_stall_nodes {
            return Some(ModelStatus::StallLimit);
        }
        None
    }

    /// Finalize the solve and return the solution.
    pub fn finalize(&self, status: ModelStatus) -> MipSolution {
        MipSolution {
            status,
            x: self.incumbent.solution.clone().unwrap_or_default(),
            obj_val: self.incumbent.obj_val,
            bound: self.best_bound(),
            gap: self.gap(),
            nodes_explored: self.nodes_explored,
            leaves: self.leaves,
            lp_iterations: self.lp_iterations,
            cuts_added: self.cuts_added,
            incumbent_updates: self.incumbent.update_count,
        }
    }

    /// Emit a progress line if the report level asks for one.
    pub fn log_progress(&self, ctx: &SolveContext, force: bool) {
        if !force && !self.settings.report_node(self.nodes_explored) {
            return;
        }
        if self.settings.report_level == 0 {
            return;
        }
        ctx.emit(LogEvent::MipNode {
            nodes: self.nodes_explored,
            open_nodes: self.queue.len(),
            leaves: self.leaves,
            dual_bound: self.best_bound(),
            primal_bound: self.incumbent.obj_val,
            gap: self.gap(),
        });
    }

    /// Get statistics for display.
    pub fn stats(&self) -> TreeStats {
        TreeStats {
            nodes_explored: self.nodes_explored,
            nodes_pruned: self.nodes_pruned,
            nodes_open: self.queue.len(),
            leaves: self.leaves,
            cuts_added: self.cuts_added,
            incumbent_updates: self.incumbent.update_count,
            best_bound: self.best_bound(),
            incumbent_obj: self.incumbent.obj_val,
            gap: self.gap(),
        }
    }
}

/// Statistics from the B&B tree.
#[derive(Debug, Clone)]
pub struct TreeStats {
    pub nodes_explored: usize,
    pub nodes_pruned: usize,
    pub nodes_open: usize,
    pub leaves: usize,
    pub cuts_added: usize,
    pub incumbent_updates: usize,
    pub best_bound: f64,
    pub incumbent_obj: f64,
    pub gap: f64,
}
