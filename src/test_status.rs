//! Outcome of a single stand-alone test run

use serde::{Deserialize, Serialize};
use std::fmt;

/// Names of the different stand-alone test states.
///
/// The numeric [`code`](TestStatus::code) only orders statuses for display;
/// callers should match on the variant rather than compare codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    NoTests,
    Skipped,
    Failed,
    Passed,
}

impl TestStatus {
    pub const ALL: [TestStatus; 4] = [
        TestStatus::NoTests,
        TestStatus::Skipped,
        TestStatus::Failed,
        TestStatus::Passed,
    ];

    pub fn code(&self) -> i8 {
        match self {
            TestStatus::NoTests => -1,
            TestStatus::Skipped => 0,
            TestStatus::Failed => 1,
            TestStatus::Passed => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TestStatus::NoTests => "NO_TESTS",
            TestStatus::Skipped => "SKIPPED",
            TestStatus::Failed => "FAILED",
            TestStatus::Passed => "PASSED",
        }
    }

    /// Stable lowercase name used by every external reporting surface.
    pub fn lower(&self) -> String {
        self.name().to_lowercase()
    }

    /// Maps the result of running a test tool to a status.
    ///
    /// A failing exit always wins; a successful run that discovered nothing
    /// to execute is `NoTests`.
    pub fn from_run(success: bool, tests_discovered: bool) -> Self {
        match (success, tests_discovered) {
            (false, _) => TestStatus::Failed,
            (true, false) => TestStatus::NoTests,
            (true, true) => TestStatus::Passed,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TestStatus::Failed)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
