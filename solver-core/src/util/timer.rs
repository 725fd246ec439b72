//! Wall-clock deadline used for cooperative cancellation.

use std::time::{Duration, Instant};

/// Start instant plus an optional time limit.
///
/// Every loop boundary (simplex iteration, IPM step, B&B node) asks
/// [`Deadline::expired`]; nothing is interrupted mid-update.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    /// Start a clock now. A non-finite or negative `seconds` means no limit.
    pub fn start(seconds: f64) -> Self {
        let limit = if seconds.is_finite() && seconds >= 0.0 {
            Some(Duration::from_secs_f64(seconds))
        } else {
            None
        };
        Self {
            start: Instant::now(),
            limit,
        }
    }

    /// A deadline that never expires.
    pub fn unlimited() -> Self {
        Self::start(f64::INFINITY)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn expired(&self) -> bool {
        match self.limit {
            Some(limit) => self.start.elapsed() >= limit,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_limit_expires_immediately() {
        assert!(Deadline::start(0.0).expired());
    }

    #[test]
    fn test_unlimited_never_expires() {
        let d = Deadline::unlimited();
        assert!(!d.expired());
        assert!(!Deadline::start(f64::NAN).expired());
    }
}
