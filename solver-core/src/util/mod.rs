//! Utility functions.
//!
//! Logging events, deadlines, and small numerical helpers.

pub mod logging;
pub mod numerics;
pub mod timer;
