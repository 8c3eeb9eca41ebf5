//! Install-time test results keyed by package identity and test part

use crate::test_status::TestStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Directory below an install prefix holding install metadata.
pub const METADATA_DIR: &str = ".phasekit";

/// File inside [`METADATA_DIR`] the test log is written to.
pub const TEST_LOG_FILE: &str = "install-time-tests.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    pub package: String,
    pub part: String,
    pub status: TestStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestResults {
    entries: BTreeMap<(String, String), TestStatus>,
}

impl TestResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one test part. A part run twice keeps the
    /// latest status.
    pub fn record(&mut self, package: &str, part: &str, status: TestStatus) {
        let key = (package.to_string(), part.to_string());
        if let Some(previous) = self.entries.insert(key, status) {
            warn!(package, part, previous = %previous, status = %status, "test part recorded twice");
        }
    }

    pub fn get(&self, package: &str, part: &str) -> Option<TestStatus> {
        self.entries
            .get(&(package.to_string(), part.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.entries.values().filter(|s| s.is_failure()).count()
    }

    pub fn any_failed(&self) -> bool {
        self.failed() > 0
    }

    pub fn records(&self) -> Vec<TestRecord> {
        self.entries
            .iter()
            .map(|((package, part), status)| TestRecord {
                package: package.clone(),
                part: part.clone(),
                status: *status,
            })
            .collect()
    }
}

impl Serialize for TestResults {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TestResults {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let records = Vec::<TestRecord>::deserialize(deserializer)?;
        let mut results = TestResults::new();
        for record in records {
            results.record(&record.package, &record.part, record.status);
        }
        Ok(results)
    }
}

/// Contents of the per-prefix test log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestLog {
    pub generated_at: DateTime<Utc>,
    pub results: TestResults,
}

pub fn test_log_path(prefix: &Path) -> PathBuf {
    prefix.join(METADATA_DIR).join(TEST_LOG_FILE)
}

pub fn write_test_log(prefix: &Path, results: &TestResults) -> std::io::Result<PathBuf> {
    let path = test_log_path(prefix);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log = TestLog {
        generated_at: Utc::now(),
        results: results.clone(),
    };
    let json = serde_json::to_string_pretty(&log)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(&path, json)?;
    Ok(path)
}
