//! Error types for the MIP solver.

use thiserror::Error;

/// Errors that prevent a branch-and-bound run from starting.
///
/// Outcomes of a run (infeasible, limits, numerical trouble in a node) are
/// statuses on [`crate::MipSolution`], never errors.
#[derive(Error, Debug)]
pub enum MipError {
    /// Problem validation failed
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// Model rejected by solver-core
    #[error("Model error: {0}")]
    Model(#[from] solver_core::ModelError),
}

/// Result type for MIP operations.
pub type MipResult<T> = Result<T, MipError>;
