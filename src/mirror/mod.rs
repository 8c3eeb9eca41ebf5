//! Mirror configuration and the artifact push/index surface
//!
//! Hooks only see the [`MirrorCollection`] and [`BuildCache`] traits. The
//! file-backed [`MirrorsFile`] and the local [`DirectoryBuildCache`] are the
//! implementations the CLI wires in.

pub mod cache;

pub use cache::{CacheEntry, CacheIndex, DirectoryBuildCache};

use crate::spec::PackageSpec;
use crate::util::document::{load_document, DocumentError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("Build cache at {url} already holds {entry} (use force to overwrite)")]
    AlreadyExists { url: String, entry: String },

    #[error("Unsupported build cache URL: {0}")]
    UnsupportedUrl(String),

    #[error("Cannot sign artifacts for {url}: no signing key is configured; mark the mirror `signed: false` to push unsigned")]
    SigningUnavailable { url: String },

    #[error("Install prefix does not exist: {}", .0.display())]
    MissingPrefix(PathBuf),

    #[error("Mirror configuration error")]
    Config(#[from] DocumentError),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),
}

fn default_true() -> bool {
    true
}

/// A named remote artifact cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    pub name: String,
    pub url: String,
    /// Destination for pushes when it differs from the fetch URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_url: Option<String>,
    #[serde(default = "default_true")]
    pub signed: bool,
    #[serde(default = "default_true")]
    pub binary: bool,
    #[serde(default)]
    pub autopush: bool,
}

impl Mirror {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            push_url: None,
            signed: true,
            binary: true,
            autopush: false,
        }
    }

    pub fn push_url(&self) -> &str {
        self.push_url.as_deref().unwrap_or(&self.url)
    }
}

/// Attributes a mirror must have to be returned; `false` means "don't care".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MirrorFilter {
    pub binary: bool,
    pub autopush: bool,
}

impl MirrorFilter {
    pub fn autopush_binaries() -> Self {
        Self {
            binary: true,
            autopush: true,
        }
    }

    pub fn matches(&self, mirror: &Mirror) -> bool {
        (!self.binary || mirror.binary) && (!self.autopush || mirror.autopush)
    }
}

/// Enumerable, name-addressable mirror configuration
#[cfg_attr(test, mockall::automock)]
pub trait MirrorCollection: Send + Sync {
    fn mirrors(&self, filter: MirrorFilter) -> Result<Vec<Mirror>, PushError>;

    fn lookup(&self, name: &str) -> Result<Option<Mirror>, PushError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOptions {
    /// Overwrite an existing entry for the same spec.
    pub force: bool,
    /// Rebuild the cache index right after this push.
    pub regenerate_index: bool,
    pub unsigned: bool,
}

/// Artifact push and index regeneration
#[cfg_attr(test, mockall::automock)]
pub trait BuildCache: Send + Sync {
    /// Pushes the installed `prefix` of `spec` to the cache at `url`,
    /// failing rather than skipping on any error.
    fn push_or_raise(
        &self,
        spec: &PackageSpec,
        prefix: &Path,
        url: &str,
        options: &PushOptions,
    ) -> Result<(), PushError>;

    fn update_index(&self, mirror: &Mirror) -> Result<(), PushError>;
}

/// In-memory mirror list, as written in a mirrors file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorsConfig {
    #[serde(default)]
    pub mirrors: Vec<Mirror>,
}

impl MirrorsConfig {
    pub fn load(path: &Path) -> Result<Self, PushError> {
        Ok(load_document(path)?)
    }
}

impl MirrorCollection for MirrorsConfig {
    fn mirrors(&self, filter: MirrorFilter) -> Result<Vec<Mirror>, PushError> {
        Ok(self
            .mirrors
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }

    fn lookup(&self, name: &str) -> Result<Option<Mirror>, PushError> {
        Ok(self.mirrors.iter().find(|m| m.name == name).cloned())
    }
}

/// Mirrors file re-read on every query, so lookups see edits made while a
/// batch is running.
#[derive(Debug, Clone)]
pub struct MirrorsFile {
    path: PathBuf,
}

impl MirrorsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn current(&self) -> Result<MirrorsConfig, PushError> {
        MirrorsConfig::load(&self.path)
    }
}

impl MirrorCollection for MirrorsFile {
    fn mirrors(&self, filter: MirrorFilter) -> Result<Vec<Mirror>, PushError> {
        self.current()?.mirrors(filter)
    }

    fn lookup(&self, name: &str) -> Result<Option<Mirror>, PushError> {
        self.current()?.lookup(name)
    }
}
