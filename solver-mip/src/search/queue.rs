//! Node priority queue for B&B tree exploration.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::SearchNode;
use crate::settings::NodeSelection;

/// Entry in the node queue with priority.
struct QueuedNode {
    node: SearchNode,
    priority: f64, // Higher = selected first
}

impl PartialEq for QueuedNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedNode {}

impl PartialOrd for QueuedNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first, older node on ties
        self.priority
            .partial_cmp(&other.priority)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.id.cmp(&self.node.id))
    }
}

/// Priority queue for B&B nodes.
pub struct NodeQueue {
    /// Node selection strategy.
    strategy: NodeSelection,

    /// Priority queue (max-heap by priority).
    heap: BinaryHeap<QueuedNode>,

    /// Count of nodes added.
    nodes_added: u64,

    /// Count of nodes popped.
    nodes_popped: u64,

    /// Best (lowest) dual bound in queue.
    best_bound: f64,

    /// An incumbent exists (switches `TwoPhase` to best-bound).
    has_incumbent: bool,
}

impl NodeQueue {
    /// Create a new node queue with the given strategy.
    pub fn new(strategy: NodeSelection) -> Self {
        Self {
            strategy,
            heap: BinaryHeap::new(),
            nodes_added: 0,
            nodes_popped: 0,
            best_bound: f64::INFINITY,
            has_incumbent: false,
        }
    }

    /// Add a node to the queue.
    pub fn push(&mut self, node: SearchNode) {
        let priority = self.compute_priority(&node);
        self.best_bound = self.best_bound.min(node.dual_bound);
        self.heap.push(QueuedNode { node, priority });
        self.nodes_added += 1;
    }

    /// Get the next node to process.
    pub fn pop(&mut self) -> Option<SearchNode> {
        let queued = self.heap.pop()?;
        self.nodes_popped += 1;
        self.recompute_best_bound();
        Some(queued.node)
    }

    /// Peek at the next node without removing it.
    pub fn peek(&self) -> Option<&SearchNode> {
        self.heap.peek().map(|q| &q.node)
    }

    /// Get the best (lowest) dual bound across all nodes (+∞ when empty).
    pub fn best_bound(&self) -> f64 {
        self.best_bound
    }

    /// Record that an incumbent exists; re-prioritizes for `TwoPhase`.
    pub fn set_has_incumbent(&mut self) {
        if self.has_incumbent {
            return;
        }
        self.has_incumbent = true;
        if self.strategy == NodeSelection::TwoPhase {
            let nodes: Vec<SearchNode> = self.heap.drain().map(|q| q.node).collect();
            for node in nodes {
                let priority = self.compute_priority(&node);
                self.heap.push(QueuedNode { node, priority });
            }
        }
    }

    /// Prune nodes that are dominated by the incumbent.
    ///
    /// Returns the number of pruned nodes.
    pub fn prune_by_bound(&mut self, incumbent_obj: f64, epsilon: f64) -> usize {
        let before = self.heap.len();
        let remaining: Vec<QueuedNode> = self
            .heap
            .drain()
            .filter(|q| !q.node.can_prune(incumbent_obj, epsilon))
            .collect();
        self.heap = remaining.into_iter().collect();
        self.recompute_best_bound();
        before - self.heap.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Get the number of nodes in the queue.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Get the total number of nodes added.
    pub fn total_added(&self) -> u64 {
        self.nodes_added
    }

    /// Get the total number of nodes popped.
    pub fn total_popped(&self) -> u64 {
        self.nodes_popped
    }

    /// Compute priority for a node based on selection strategy.
    fn compute_priority(&self, node: &SearchNode) -> f64 {
        match self.strategy {
            NodeSelection::BestBound => -node.dual_bound,
            NodeSelection::DepthFirst => node.depth as f64,
            NodeSelection::BestEstimate => -node.estimate,
            NodeSelection::TwoPhase => {
                if self.has_incumbent {
                    -node.dual_bound
                } else {
                    node.depth as f64
                }
            }
        }
    }

    /// Recompute best bound after removal.
    fn recompute_best_bound(&mut self) {
        self.best_bound = self
            .heap
            .iter()
            .map(|q| q.node.dual_bound)
            .fold(f64::INFINITY, f64::min);
    }
}
