use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

/// State shared by every install in one batch.
///
/// Created when a batch starts, lent mutably to each `post_install` hook
/// call, then handed by value to [`Installer::finish`](super::Installer::finish),
/// which reads it once for the index-update pass and drops it.
#[derive(Debug, Clone)]
pub struct InstallSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    updated_mirrors: BTreeSet<String>,
    installed: Vec<String>,
}

impl InstallSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            updated_mirrors: BTreeSet::new(),
            installed: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Records a mirror that received a push. Append-only.
    pub fn record_mirror(&mut self, name: &str) {
        self.updated_mirrors.insert(name.to_string());
    }

    pub fn updated_mirrors(&self) -> &BTreeSet<String> {
        &self.updated_mirrors
    }

    pub(crate) fn record_install(&mut self, identity: String) {
        self.installed.push(identity);
    }

    /// Identities of packages installed in this session, in order.
    pub fn installed(&self) -> &[String] {
        &self.installed
    }
}

impl Default for InstallSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_empty() {
        let session = InstallSession::new();
        assert!(session.updated_mirrors().is_empty());
        assert!(session.installed().is_empty());
    }

    #[test]
    fn test_record_mirror_deduplicates() {
        let mut session = InstallSession::new();
        session.record_mirror("ci-cache");
        session.record_mirror("ci-cache");
        session.record_mirror("backup");
        let names: Vec<_> = session.updated_mirrors().iter().cloned().collect();
        assert_eq!(names, vec!["backup", "ci-cache"]);
    }

    #[test]
    fn test_sessions_have_distinct_ids() {
        assert_ne!(InstallSession::new().id(), InstallSession::new().id());
    }
}
