use crate::build_systems::Phase;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a package install is in its lifecycle.
///
/// `Unstarted -> Phase(..)* -> PhasesComplete -> TestsRun -> Done`, with
/// `Failed` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "phase")]
pub enum InstallState {
    Unstarted,
    Phase(Phase),
    PhasesComplete,
    TestsRun,
    Done,
    Failed,
}

impl InstallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstallState::Done | InstallState::Failed)
    }

    pub fn can_transition_to(&self, next: InstallState) -> bool {
        use InstallState::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Unstarted | Phase(_), Phase(_)) => true,
            (Unstarted | Phase(_), PhasesComplete) => true,
            (PhasesComplete, TestsRun) => true,
            (TestsRun, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallState::Unstarted => f.write_str("UNSTARTED"),
            InstallState::Phase(phase) => write!(f, "PHASE({})", phase),
            InstallState::PhasesComplete => f.write_str("PHASES_COMPLETE"),
            InstallState::TestsRun => f.write_str("TESTS_RUN"),
            InstallState::Done => f.write_str("DONE"),
            InstallState::Failed => f.write_str("FAILED"),
        }
    }
}

/// Current state plus every state visited, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTracker {
    history: Vec<InstallState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            history: vec![InstallState::Unstarted],
        }
    }

    pub fn current(&self) -> InstallState {
        self.history
            .last()
            .copied()
            .unwrap_or(InstallState::Unstarted)
    }

    /// Moves to `next`, returning false (and staying put) on an illegal move.
    pub fn transition(&mut self, next: InstallState) -> bool {
        let current = self.current();
        if !current.can_transition_to(next) {
            tracing::warn!(from = %current, to = %next, "ignoring illegal install state transition");
            return false;
        }
        tracing::trace!(from = %current, to = %next, "install state");
        self.history.push(next);
        true
    }

    pub fn history(&self) -> &[InstallState] {
        &self.history
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
