//! Configuration-and-logging context passed explicitly to every engine.

use std::fmt;
use std::time::Duration;

use crate::settings::SolverSettings;
use crate::util::logging::{iteration_stride, LogEvent, LogSink};
use crate::util::timer::Deadline;

/// Settings snapshot, optional event sink and wall-clock deadline.
///
/// Cloning shares the sink and the deadline, so child solves (node LPs,
/// crossover cleanup) observe the same time limit as the top-level run.
#[derive(Clone)]
pub struct SolveContext {
    settings: SolverSettings,
    sink: Option<LogSink>,
    deadline: Deadline,
}

impl fmt::Debug for SolveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolveContext")
            .field("settings", &self.settings)
            .field("has_sink", &self.sink.is_some())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Default for SolveContext {
    fn default() -> Self {
        Self::new(SolverSettings::default(), None)
    }
}

impl SolveContext {
    /// Start the clock now with `settings.time_limit`.
    pub fn new(settings: SolverSettings, sink: Option<LogSink>) -> Self {
        let deadline = Deadline::start(settings.time_limit);
        Self {
            settings,
            sink,
            deadline,
        }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Same sink and deadline, different settings.
    pub fn with_settings(&self, settings: SolverSettings) -> Self {
        Self {
            settings,
            sink: self.sink.clone(),
            deadline: self.deadline,
        }
    }

    /// Same sink and deadline with `spent` iterations taken off the simplex
    /// iteration limit.
    pub fn with_simplex_iterations_spent(&self, spent: usize) -> Self {
        let mut settings = self.settings.clone();
        settings.simplex_iteration_limit = settings.simplex_iteration_limit.saturating_sub(spent);
        self.with_settings(settings)
    }

    /// Same settings and deadline with the sink removed (used for
    /// sub-solves such as strong branching whose progress is not reported).
    pub fn silenced(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            sink: None,
            deadline: self.deadline,
        }
    }

    pub fn time_limit_reached(&self) -> bool {
        self.deadline.expired()
    }

    pub fn elapsed(&self) -> Duration {
        self.deadline.elapsed()
    }

    /// Deliver an event to the sink (if any and if output is enabled) and
    /// mirror it to the `log` facade at debug level.
    pub fn emit(&self, event: LogEvent) {
        log::debug!("{}", event);
        if self.settings.output_flag {
            if let Some(sink) = &self.sink {
                sink(&event);
            }
        }
    }

    /// Free-form message through the same path.
    pub fn message(&self, level: log::Level, text: impl Into<String>) {
        let text = text.into();
        log::log!(level, "{}", text);
        if self.settings.output_flag {
            if let Some(sink) = &self.sink {
                sink(&LogEvent::Message { level, text });
            }
        }
    }

    /// Whether iteration `iteration` should produce a progress event.
    pub fn report_iteration(&self, iteration: usize) -> bool {
        match iteration_stride(self.settings.log_dev_level) {
            Some(stride) => iteration % stride == 0,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_sink_receives_events_when_output_enabled() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink: LogSink = Arc::new(move |e: &LogEvent| {
            seen_clone.lock().unwrap().push(e.clone());
        });
        let ctx = SolveContext::new(SolverSettings::default(), Some(sink));
        ctx.message(log::Level::Info, "hello");
        assert_eq!(seen.lock().unwrap().len(), 1);

        let mut quiet = SolverSettings::default();
        quiet.output_flag = false;
        let ctx = ctx.with_settings(quiet);
        ctx.message(log::Level::Info, "dropped");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_report_cadence() {
        let mut s = SolverSettings::default();
        s.log_dev_level = 2;
        let ctx = SolveContext::new(s, None);
        assert!(ctx.report_iteration(20));
        assert!(!ctx.report_iteration(21));
    }
}
