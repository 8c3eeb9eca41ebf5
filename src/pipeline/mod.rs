//! Phase runner: selects a builder, runs its phases, records install-time
//! test results and dispatches install hooks.

pub mod orchestrator;
pub mod results;
pub mod session;
pub mod state;

pub use orchestrator::{InstallOutcome, Installer};
pub use results::{TestRecord, TestResults};
pub use session::InstallSession;
pub use state::{InstallState, StateTracker};

use crate::build_systems::{BuildArgs, BuildError, Phase, PhaseFn};
use crate::hooks::HookError;
use crate::spec::PackageSpec;
use crate::tool::absolutize;
use crate::util::document::{load_document, DocumentError};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Install hook '{hook}' failed")]
    Hook {
        hook: &'static str,
        #[source]
        source: HookError,
    },
}

fn default_explicit() -> bool {
    true
}

/// One package to build from staged sources.
#[derive(Clone, Deserialize)]
pub struct InstallRequest {
    pub spec: PackageSpec,
    /// Staged source root.
    pub source: PathBuf,
    #[serde(flatten)]
    pub args: BuildArgs,
    /// False when the package is only installed as a dependency.
    #[serde(default = "default_explicit")]
    pub explicit: bool,
    /// Package-supplied replacements for strategy phase handlers.
    #[serde(skip)]
    pub overrides: Vec<(Phase, PhaseFn)>,
}

impl InstallRequest {
    pub fn new(spec: PackageSpec, source: impl Into<PathBuf>) -> Self {
        Self {
            spec,
            source: source.into(),
            args: BuildArgs::default(),
            explicit: true,
            overrides: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: BuildArgs) -> Self {
        self.args = args;
        self
    }

    pub fn with_override(mut self, phase: Phase, handler: PhaseFn) -> Self {
        self.overrides.push((phase, handler));
        self
    }

    pub fn as_dependency(mut self) -> Self {
        self.explicit = false;
        self
    }

    /// Loads a request file. A relative `source` is taken relative to the
    /// file's directory, and the result is anchored at the working directory.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let mut request: InstallRequest = load_document(path)?;
        if request.source.is_relative() {
            if let Some(dir) = path.parent() {
                request.source = dir.join(&request.source);
            }
        }
        request.source = absolutize(&request.source);
        Ok(request)
    }
}

impl fmt::Debug for InstallRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let overridden: Vec<Phase> = self.overrides.iter().map(|(phase, _)| *phase).collect();
        f.debug_struct("InstallRequest")
            .field("spec", &self.spec)
            .field("source", &self.source)
            .field("args", &self.args)
            .field("explicit", &self.explicit)
            .field("overrides", &overridden)
            .finish()
    }
}
