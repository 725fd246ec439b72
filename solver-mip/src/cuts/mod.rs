//! Cutting planes.
//!
//! - Gomory mixed-integer cuts from the root tableau
//! - Cut pool with age-based eviction

mod gomory;
mod pool;

pub use gomory::{GomorySeparator, GomorySettings};
pub use pool::{CutPool, CutPoolSettings, CutPoolStats, PooledCut};
