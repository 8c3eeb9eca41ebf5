//! Build system strategies
//!
//! Each strategy binds a [`BuildSystemKind`] to a fixed, ordered phase
//! sequence, the tool invocations behind those phases, and the install-time
//! test callbacks run once the last phase succeeds. Strategies are
//! stateless; per-package state lives in a [`BaseBuilder`].

use crate::spec::{BuildSystemKind, ConditionalDependency, PackageSpec};
use crate::test_status::TestStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub mod autotools;
pub mod base;
pub mod cargo;
pub mod cmake;
pub mod error;
pub mod go_mod;
pub mod makefile;
pub mod registry;

pub use autotools::AutotoolsBuildSystem;
pub use base::{BaseBuilder, PhaseContext};
pub use cargo::CargoBuildSystem;
pub use cmake::CMakeBuildSystem;
pub use error::{BuildError, ConfigurationError};
pub use go_mod::GoModBuildSystem;
pub use makefile::MakefileBuildSystem;
pub use registry::BuildSystemRegistry;

crate::define_id_enum! {
    /// A named step in a builder's lifecycle
    Phase {
        Edit => "edit" : "Edit",
        Autoreconf => "autoreconf" : "Autoreconf",
        Cmake => "cmake" : "CMake",
        Configure => "configure" : "Configure",
        Build => "build" : "Build",
        Install => "install" : "Install",
    }
}

/// Signature every phase handler implements.
pub type PhaseFn = fn(&PhaseContext<'_>) -> Result<(), BuildError>;

/// Signature of an install-time test callback.
pub type TestFn = fn(&PhaseContext<'_>) -> Result<TestStatus, BuildError>;

/// An install-time test callback, registered by name.
#[derive(Clone, Copy)]
pub struct TestCallback {
    pub name: &'static str,
    pub run: TestFn,
}

impl std::fmt::Debug for TestCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCallback")
            .field("name", &self.name)
            .finish()
    }
}

/// Manifest file identifying a source tree built by a strategy
#[derive(Debug, Clone)]
pub struct ManifestPattern {
    pub filename: &'static str,
}

/// Extra arguments a package passes to its tool invocations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildArgs {
    pub install_args: Vec<String>,
    pub test_args: Vec<String>,
    pub configure_args: Vec<String>,
    pub build_args: Vec<String>,
}

/// Build system trait
pub trait BuildSystem: Send + Sync {
    fn id(&self) -> BuildSystemKind;

    /// Manifest file patterns (e.g., "Cargo.toml", "go.mod")
    fn manifest_patterns(&self) -> &[ManifestPattern];

    /// Primary executable driven by the phases.
    fn tool(&self) -> &'static str;

    fn phases(&self) -> &[Phase] {
        &[Phase::Edit, Phase::Install]
    }

    /// Handler for `phase`, or `None` when this system does not implement it.
    fn phase_handler(&self, phase: Phase) -> Option<PhaseFn>;

    /// Callbacks run in order after the final phase.
    fn install_time_tests(&self) -> Vec<TestCallback> {
        Vec::new()
    }

    /// Dependencies that apply whenever this build system is selected.
    fn implicit_dependencies(&self) -> Vec<ConditionalDependency> {
        Vec::new()
    }

    /// Variables set on every tool invocation of this system and nowhere else.
    fn build_environment(&self, spec: &PackageSpec, prefix: &Path) -> BTreeMap<String, String> {
        let _ = (spec, prefix);
        BTreeMap::new()
    }

    /// Directory phases run in. Defaults to the staged source root.
    fn build_directory(&self, source_root: &Path) -> PathBuf {
        source_root.to_path_buf()
    }

    /// Whether `dir` holds one of this system's manifests.
    fn has_manifest(&self, dir: &Path) -> bool {
        self.manifest_patterns()
            .iter()
            .any(|p| dir.join(p.filename).is_file())
    }
}

/// Handlers a strategy declares but does not implement.
pub fn unimplemented_phases(system: &dyn BuildSystem) -> Vec<Phase> {
    system
        .phases()
        .iter()
        .copied()
        .filter(|phase| system.phase_handler(*phase).is_none())
        .collect()
}

/// The default `edit` phase: nothing to patch.
pub fn noop_edit(_ctx: &PhaseContext<'_>) -> Result<(), BuildError> {
    Ok(())
}
