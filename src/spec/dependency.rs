//! Dependency edges and conditional dependency declarations

use super::constraint::Constraint;
use super::{BuildSystemKind, PackageSpec, VariantValue, Version, VersionRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Phase of use for a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepType {
    Build,
    Link,
    Run,
    Test,
}

impl fmt::Display for DepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DepType::Build => "build",
            DepType::Link => "link",
            DepType::Run => "run",
            DepType::Test => "test",
        };
        f.write_str(s)
    }
}

fn default_dep_types() -> BTreeSet<DepType> {
    [DepType::Build, DepType::Link].into_iter().collect()
}

/// A resolved dependency edge of a [`PackageSpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(default = "default_dep_types")]
    pub types: BTreeSet<DepType>,
    /// Install prefix of the dependency, when it is already installed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<PathBuf>,
}

impl Dependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            types: default_dep_types(),
            prefix: None,
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_types(mut self, types: &[DepType]) -> Self {
        self.types = types.iter().copied().collect();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn has_type(&self, dep_type: DepType) -> bool {
        self.types.contains(&dep_type)
    }

    pub fn prefix(&self) -> Option<&Path> {
        self.prefix.as_deref()
    }

    pub fn bin_dir(&self) -> Option<PathBuf> {
        self.prefix.as_ref().map(|p| p.join("bin"))
    }
}

/// A dependency edge that only applies when `when` matches the package.
///
/// Build-system strategies declare their toolchain this way, conditioned on
/// `build_system=<kind>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalDependency {
    pub requirement: Constraint,
    pub types: BTreeSet<DepType>,
    pub when: Constraint,
}

impl ConditionalDependency {
    /// Toolchain edge active exactly when `kind` builds the package.
    pub fn on_build_system(
        name: &str,
        versions: Option<VersionRange>,
        types: &[DepType],
        kind: BuildSystemKind,
    ) -> Self {
        Self {
            requirement: Constraint {
                name: Some(name.to_string()),
                versions,
                ..Constraint::default()
            },
            types: types.iter().copied().collect(),
            when: Constraint {
                variants: vec![(
                    "build_system".to_string(),
                    VariantValue::Value(kind.as_str().to_string()),
                )],
                ..Constraint::default()
            },
        }
    }

    pub fn name(&self) -> &str {
        self.requirement.name.as_deref().unwrap_or_default()
    }

    pub fn is_active(&self, spec: &PackageSpec) -> bool {
        spec.matches(&self.when)
    }

    /// Whether `spec` carries an edge fulfilling this requirement.
    pub fn is_satisfied_by(&self, spec: &PackageSpec) -> bool {
        spec.dependencies
            .iter()
            .any(|dep| self.requirement.matches_dependency(dep))
    }
}

impl fmt::Display for ConditionalDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<String> = self.types.iter().map(|t| t.to_string()).collect();
        write!(
            f,
            "{} (type={}) when {}",
            self.requirement,
            types.join(","),
            self.when
        )
    }
}
