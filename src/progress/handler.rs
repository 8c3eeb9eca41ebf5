//! Progress handler trait and events

use crate::test_status::TestStatus;
use std::time::Duration;

/// Events emitted while a package moves through its install lifecycle
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Builder selected, no phase has run yet
    Started {
        package: String,
        build_system: String,
    },

    PhaseStarted { package: String, phase: String },

    PhaseComplete {
        package: String,
        phase: String,
        duration: Duration,
    },

    /// One install-time test callback finished
    TestCallbackComplete {
        package: String,
        callback: String,
        status: TestStatus,
        duration: Duration,
    },

    /// Install finished; tests may still have failed
    Completed {
        package: String,
        phases: usize,
        tests_failed: usize,
        total_time: Duration,
    },

    /// A phase failed and the install was abandoned
    Failed {
        package: String,
        phase: Option<String>,
        error: String,
    },
}

/// Trait for handling progress events during installs
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
