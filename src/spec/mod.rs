//! Resolved package specifications and the query surface builders consume
//!
//! A [`PackageSpec`] is produced outside this crate (by a resolver or a
//! request file) and treated as immutable for the duration of a build.

#[macro_use]
mod id_enum_macro;

mod build_system_kind;
mod constraint;
mod dependency;
mod version;

pub use build_system_kind::BuildSystemKind;
pub use constraint::Constraint;
pub use dependency::{ConditionalDependency, DepType, Dependency};
pub use version::{Version, VersionRange};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Length of the hash prefix used in identities and install prefixes.
pub const SHORT_HASH_LEN: usize = 7;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("Invalid version: '{0}'")]
    InvalidVersion(String),

    #[error("Invalid constraint '{input}': {reason}")]
    InvalidConstraint { input: String, reason: String },

    #[error("Package '{package}' has no variant '{variant}'")]
    UnknownVariant { package: String, variant: String },

    #[error("Unknown build system: '{0}'")]
    UnknownBuildSystem(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantValue {
    Bool(bool),
    Value(String),
}

impl VariantValue {
    /// `true`/`false` become boolean variants, anything else is a valued one.
    pub fn from_text(text: &str) -> Self {
        match text {
            "true" | "True" => VariantValue::Bool(true),
            "false" | "False" => VariantValue::Bool(false),
            other => VariantValue::Value(other.to_string()),
        }
    }
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantValue::Bool(b) => write!(f, "{}", b),
            VariantValue::Value(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    pub version: Version,
    #[serde(default)]
    pub variants: BTreeMap<String, VariantValue>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    pub build_system: BuildSystemKind,
}

/// Hash input: everything that identifies the build, nothing about where
/// dependencies happen to be installed.
#[derive(Serialize)]
struct CanonicalSpec<'a> {
    name: &'a str,
    version: &'a str,
    build_system: &'a str,
    variants: &'a BTreeMap<String, VariantValue>,
    dependencies: BTreeMap<&'a str, CanonicalDependency<'a>>,
}

#[derive(Serialize)]
struct CanonicalDependency<'a> {
    version: Option<&'a str>,
    types: Vec<String>,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>, version: Version, build_system: BuildSystemKind) -> Self {
        Self {
            name: name.into(),
            version,
            variants: BTreeMap::new(),
            dependencies: Vec::new(),
            build_system,
        }
    }

    pub fn with_variant(mut self, name: impl Into<String>, value: VariantValue) -> Self {
        self.variants.insert(name.into(), value);
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn matches(&self, constraint: &Constraint) -> bool {
        constraint.matches(self)
    }

    /// Parses `constraint` and evaluates it against this spec.
    pub fn satisfies(&self, constraint: &str) -> Result<bool, SpecError> {
        Ok(Constraint::parse(constraint)?.matches(self))
    }

    pub fn dependency(&self, name: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.name == name)
    }

    pub fn dependency_prefix(&self, name: &str) -> Option<&Path> {
        self.dependency(name).and_then(|d| d.prefix())
    }

    pub fn variant(&self, name: &str) -> Option<&VariantValue> {
        self.variants.get(name)
    }

    pub fn dag_hash(&self) -> String {
        let canonical = CanonicalSpec {
            name: &self.name,
            version: self.version.as_str(),
            build_system: self.build_system.as_str(),
            variants: &self.variants,
            dependencies: self
                .dependencies
                .iter()
                .map(|d| {
                    (
                        d.name.as_str(),
                        CanonicalDependency {
                            version: d.version.as_ref().map(|v| v.as_str()),
                            types: d.types.iter().map(|t| t.to_string()).collect(),
                        },
                    )
                })
                .collect(),
        };

        // Serializing borrowed strings and BTreeMaps cannot fail.
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    pub fn short_hash(&self) -> String {
        let mut hash = self.dag_hash();
        hash.truncate(SHORT_HASH_LEN);
        hash
    }

    /// `name@version/hash7`, the key test results are recorded under.
    pub fn identity(&self) -> String {
        format!("{}@{}/{}", self.name, self.version, self.short_hash())
    }

    /// Directory name used below an install root.
    pub fn prefix_dir_name(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.short_hash())
    }

    /// Renders a CMake cache definition from a variant.
    ///
    /// Boolean variants become `-DVAR:BOOL=ON|OFF`, valued ones `-DVAR=value`.
    pub fn define_from_variant(&self, cmake_var: &str, variant: &str) -> Result<String, SpecError> {
        let value = self
            .variants
            .get(variant)
            .ok_or_else(|| SpecError::UnknownVariant {
                package: self.name.clone(),
                variant: variant.to_string(),
            })?;

        Ok(match value {
            VariantValue::Bool(true) => format!("-D{}:BOOL=ON", cmake_var),
            VariantValue::Bool(false) => format!("-D{}:BOOL=OFF", cmake_var),
            VariantValue::Value(v) => format!("-D{}={}", cmake_var, v),
        })
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)?;
        for (key, value) in &self.variants {
            match value {
                VariantValue::Bool(true) => write!(f, " +{}", key)?,
                VariantValue::Bool(false) => write!(f, " ~{}", key)?,
                VariantValue::Value(v) => write!(f, " {}={}", key, v)?,
            }
        }
        write!(f, " build_system={}", self.build_system)
    }
}
