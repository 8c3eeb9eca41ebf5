use super::Phase;
use crate::spec::{BuildSystemKind, SpecError};
use crate::tool::ToolError;
use std::path::PathBuf;
use thiserror::Error;

/// Problems with how builders are declared or selected. Raised before any
/// phase runs.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Build system '{kind}' declares phase '{phase}' but does not implement it")]
    MissingPhase { kind: BuildSystemKind, phase: Phase },

    #[error("No builder registered for build system '{kind}'")]
    NoBuilder { kind: BuildSystemKind },

    #[error("{count} builders registered for build system '{kind}', expected exactly one")]
    AmbiguousBuilder { kind: BuildSystemKind, count: usize },

    #[error("Cannot override phase '{phase}': build system '{kind}' does not run it")]
    UnexpectedOverride { kind: BuildSystemKind, phase: Phase },

    #[error("Staged source directory does not exist: {}", .path.display())]
    MissingBuildDirectory { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("Phase '{phase}' failed for {package}")]
    PhaseFailed {
        package: String,
        phase: Phase,
        #[source]
        source: Box<BuildError>,
    },

    #[error("Cannot enter working directory {}", .path.display())]
    WorkingDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// The tool failure underneath any phase wrapping, if there is one.
    pub fn tool_error(&self) -> Option<&ToolError> {
        match self {
            BuildError::Tool(e) => Some(e),
            BuildError::PhaseFailed { source, .. } => source.tool_error(),
            _ => None,
        }
    }

    pub fn failed_phase(&self) -> Option<Phase> {
        match self {
            BuildError::PhaseFailed { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}
