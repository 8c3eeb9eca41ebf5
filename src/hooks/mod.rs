//! Post-install hooks
//!
//! Hooks run after a package reaches `Done` (`post_install`) and once more
//! after a whole batch finishes (`on_install_done`). Errors propagate to the
//! installer; there is no retry.

pub mod autopush;

pub use autopush::AutopushHook;

use crate::mirror::PushError;
use crate::pipeline::InstallSession;
use crate::spec::PackageSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// How the package's files got into its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Built locally from staged sources.
    Source,
    /// Extracted from a binary cache.
    BinaryCache,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Source => f.write_str("source"),
            Provenance::BinaryCache => f.write_str("binary_cache"),
        }
    }
}

/// A completed install, as seen by hooks.
#[derive(Debug, Clone, Copy)]
pub struct InstallRecord<'a> {
    pub spec: &'a PackageSpec,
    pub prefix: &'a Path,
    pub explicit: bool,
    pub provenance: Provenance,
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("Pushing {package} to mirror '{mirror}' failed")]
    Push {
        mirror: String,
        package: String,
        #[source]
        source: PushError,
    },

    #[error("Updating the index of mirror '{mirror}' failed")]
    Index {
        mirror: String,
        #[source]
        source: PushError,
    },

    #[error("Mirror configuration unavailable")]
    Mirrors(#[source] PushError),
}

pub trait InstallHook: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called once per completed package install.
    fn post_install(
        &self,
        record: &InstallRecord<'_>,
        session: &mut InstallSession,
    ) -> Result<(), HookError>;

    /// Called once after the last install of a batch.
    fn on_install_done(&self, session: &InstallSession, update_index: bool) -> Result<(), HookError> {
        let _ = (session, update_index);
        Ok(())
    }
}
