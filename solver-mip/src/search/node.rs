//! Search node representation.

use crate::master::WarmStart;

/// Status of a search node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Relaxation not solved yet.
    RelaxationPending,

    /// Relaxation solved; waiting in the queue.
    RelaxationSolved,

    /// Children are being created.
    Branching,

    /// Infeasible, cut off, or not improving.
    Fathomed,

    /// Relaxation solution satisfies integrality.
    IntegerFeasible,
}

/// Branching direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// x <= floor(value)
    Down,
    /// x >= ceil(value)
    Up,
}

/// A bound change from branching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundChange {
    /// Variable index.
    pub var: usize,

    /// Previous lower bound.
    pub old_lb: f64,

    /// Previous upper bound.
    pub old_ub: f64,

    /// New lower bound.
    pub new_lb: f64,

    /// New upper bound.
    pub new_ub: f64,
}

impl BoundChange {
    /// Create a "down" branch: x <= floor(value).
    pub fn down_branch(var: usize, old_lb: f64, old_ub: f64, value: f64) -> Self {
        Self {
            var,
            old_lb,
            old_ub,
            new_lb: old_lb,
            new_ub: value.floor(),
        }
    }

    /// Create an "up" branch: x >= ceil(value).
    pub fn up_branch(var: usize, old_lb: f64, old_ub: f64, value: f64) -> Self {
        Self {
            var,
            old_lb,
            old_ub,
            new_lb: value.ceil(),
            new_ub: old_ub,
        }
    }

    /// Fix `var` at `value`.
    pub fn fix(var: usize, old_lb: f64, old_ub: f64, value: f64) -> Self {
        Self {
            var,
            old_lb,
            old_ub,
            new_lb: value,
            new_ub: value,
        }
    }

    /// Check if the bound change creates an empty domain.
    pub fn is_infeasible(&self) -> bool {
        self.new_lb > self.new_ub + 1e-9
    }
}

/// Apply `changes` in order to copies of the global bounds.
pub fn apply_changes(changes: &[BoundChange], lb: &[f64], ub: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut lb = lb.to_vec();
    let mut ub = ub.to_vec();
    for c in changes {
        lb[c.var] = c.new_lb;
        ub[c.var] = c.new_ub;
    }
    (lb, ub)
}

/// What created a node, for pseudocost bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchOrigin {
    pub var: usize,
    pub value: f64,
    pub direction: Direction,
    /// Relaxation objective of the parent.
    pub parent_bound: f64,
}

/// A node in the B&B search tree.
#[derive(Debug, Clone)]
pub struct SearchNode {
    /// Unique node identifier.
    pub id: u64,

    /// Parent node ID (None for root).
    pub parent_id: Option<u64>,

    /// Depth in the tree (0 for root).
    pub depth: usize,

    /// Bound changes from the root to this node, in order.
    pub bound_changes: Vec<BoundChange>,

    /// Dual bound at this node (from master LP).
    /// Lower bound on optimal objective in this subtree.
    pub dual_bound: f64,

    /// Estimate of best integer solution reachable.
    pub estimate: f64,

    /// Node processing status.
    pub status: NodeStatus,

    /// Relaxation solution once solved.
    pub x: Vec<f64>,

    /// Basis to warm start children from.
    pub warm: Option<WarmStart>,

    /// Branch that created this node.
    pub origin: Option<BranchOrigin>,
}

impl SearchNode {
    /// Create the root node.
    pub fn root() -> Self {
        Self {
            id: 0,
            parent_id: None,
            depth: 0,
            bound_changes: Vec::new(),
            dual_bound: f64::NEG_INFINITY,
            estimate: f64::NEG_INFINITY,
            status: NodeStatus::RelaxationPending,
            x: Vec::new(),
            warm: None,
            origin: None,
        }
    }

    /// Create a child node from a bound change.
    pub fn child(&self, id: u64, bound_change: BoundChange, direction: Direction, value: f64) -> Self {
        let mut bound_changes = self.bound_changes.clone();
        bound_changes.push(bound_change);
        Self {
            id,
            parent_id: Some(self.id),
            depth: self.depth + 1,
            bound_changes,
            dual_bound: self.dual_bound, // Inherit parent's bound initially
            estimate: self.estimate,
            status: NodeStatus::RelaxationPending,
            x: Vec::new(),
            warm: self.warm.clone(),
            origin: Some(BranchOrigin {
                var: bound_change.var,
                value,
                direction,
                parent_bound: self.dual_bound,
            }),
        }
    }

    /// Check if this node can be pruned by an incumbent.
    ///
    /// A node can be pruned if its dual bound >= incumbent objective.
    pub fn can_prune(&self, incumbent_obj: f64, epsilon: f64) -> bool {
        self.dual_bound >= incumbent_obj - epsilon
    }
}
