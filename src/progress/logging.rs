//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started {
                package,
                build_system,
            } => {
                info!(package = %package, build_system = %build_system, "Starting install");
            }
            ProgressEvent::PhaseStarted { package, phase } => {
                info!(package = %package, phase = %phase, "Starting phase");
            }
            ProgressEvent::PhaseComplete {
                package,
                phase,
                duration,
            } => {
                debug!(
                    package = %package,
                    phase = %phase,
                    duration_ms = duration.as_millis(),
                    "Phase complete"
                );
            }
            ProgressEvent::TestCallbackComplete {
                package,
                callback,
                status,
                duration,
            } => {
                if status.is_failure() {
                    warn!(
                        package = %package,
                        callback = %callback,
                        status = %status,
                        duration_ms = duration.as_millis(),
                        "Install-time test failed"
                    );
                } else {
                    info!(
                        package = %package,
                        callback = %callback,
                        status = %status,
                        duration_ms = duration.as_millis(),
                        "Install-time test complete"
                    );
                }
            }
            ProgressEvent::Completed {
                package,
                phases,
                tests_failed,
                total_time,
            } => {
                if *tests_failed > 0 {
                    warn!(
                        package = %package,
                        phases,
                        tests_failed,
                        total_time_ms = total_time.as_millis(),
                        "Install complete with failing tests"
                    );
                } else {
                    info!(
                        package = %package,
                        phases,
                        total_time_ms = total_time.as_millis(),
                        "Install complete"
                    );
                }
            }
            ProgressEvent::Failed {
                package,
                phase,
                error,
            } => {
                warn!(
                    package = %package,
                    phase = phase.as_deref().unwrap_or("-"),
                    error = %error,
                    "Install failed"
                );
            }
        }
    }
}
