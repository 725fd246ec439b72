//! Branch-and-bound search tree management.

mod node;
mod queue;
mod branching;
mod tree;

pub use node::{apply_changes, BoundChange, BranchOrigin, Direction, NodeStatus, SearchNode};
pub use queue::NodeQueue;
pub use branching::{BranchDecision, BranchingSelector, ProbeResult};
pub use tree::{BranchAndBound, TreeStats};
