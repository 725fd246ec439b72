//! Error types for the solver façade.

use solver_core::{ModelError, OptionError};
use solver_mip::MipError;
use thiserror::Error;

/// Errors returned by [`crate::Solver`].
///
/// A failed call leaves the solver exactly as it was before the call.
#[derive(Error, Debug)]
pub enum SolverError {
    /// No model has been passed yet.
    #[error("no model has been passed to the solver")]
    NoModel,

    /// The model or an edit was rejected.
    #[error("Invalid model: {0}")]
    Model(#[from] ModelError),

    /// An option name, type or value was rejected.
    #[error("Option error: {0}")]
    Option(#[from] OptionError),

    /// Branch-and-bound could not be set up.
    #[error("MIP error: {0}")]
    Mip(#[from] MipError),

    #[error("{what} index {index} out of range (size {size})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        size: usize,
    },

    #[error("{what} has length {found}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// Statuses and basic index of a user basis disagree.
    #[error("basis is inconsistent: {0}")]
    InvalidBasis(String),
}

/// Result type for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;
