//! Build system registry

use super::{unimplemented_phases, BuildSystem, ConfigurationError};
use crate::spec::{BuildSystemKind, PackageSpec};
use std::sync::Arc;
use tracing::debug;

/// Registry of build systems
///
/// Registration validates that every declared phase has a handler, so an
/// incomplete strategy is rejected before any package is built with it.
#[derive(Clone)]
pub struct BuildSystemRegistry {
    systems: Vec<Arc<dyn BuildSystem>>,
}

impl BuildSystemRegistry {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let defaults: [Arc<dyn BuildSystem>; 5] = [
            Arc::new(super::CargoBuildSystem),
            Arc::new(super::GoModBuildSystem),
            Arc::new(super::CMakeBuildSystem),
            Arc::new(super::AutotoolsBuildSystem),
            Arc::new(super::MakefileBuildSystem),
        ];

        let mut registry = Self::new();
        for system in defaults {
            // Built-in strategies implement every phase they declare.
            if let Err(e) = registry.register(system) {
                tracing::error!(error = %e, "built-in build system rejected");
            }
        }
        registry
    }

    pub fn register(&mut self, system: Arc<dyn BuildSystem>) -> Result<(), ConfigurationError> {
        if let Some(&phase) = unimplemented_phases(system.as_ref()).first() {
            return Err(ConfigurationError::MissingPhase {
                kind: system.id(),
                phase,
            });
        }
        debug!(build_system = %system.id(), phases = ?system.phases(), "registered build system");
        self.systems.push(system);
        Ok(())
    }

    /// Selects the single strategy for `kind`.
    pub fn get(&self, kind: BuildSystemKind) -> Result<&dyn BuildSystem, ConfigurationError> {
        let mut matches = self.systems.iter().filter(|s| s.id() == kind);
        match (matches.next(), matches.count()) {
            (None, _) => Err(ConfigurationError::NoBuilder { kind }),
            (Some(system), 0) => Ok(system.as_ref()),
            (Some(_), extra) => Err(ConfigurationError::AmbiguousBuilder {
                kind,
                count: extra + 1,
            }),
        }
    }

    pub fn select(&self, spec: &PackageSpec) -> Result<&dyn BuildSystem, ConfigurationError> {
        self.get(spec.build_system)
    }

    pub fn systems(&self) -> impl Iterator<Item = &dyn BuildSystem> {
        self.systems.iter().map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

impl Default for BuildSystemRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
