//! Problem and solution types for MIP solver.

mod problem;
mod solution;

pub use problem::{integrality, MipProblem};
pub use solution::{IncumbentTracker, MipSolution};
