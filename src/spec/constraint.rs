//! Constraint strings evaluated against a [`PackageSpec`]
//!
//! Grammar (whitespace separated, sigils may be chained inside a word):
//!
//! - `name` – package name, only as the first token of a context
//! - `@lo:hi` – version range
//! - `+variant` / `~variant` / `-variant` – boolean variant on / off
//! - `key=value` – valued variant; `build_system=<kind>` selects the builder
//! - `^dep@range` – starts a dependency context; following tokens apply to it

use super::version::VersionRange;
use super::{Dependency, PackageSpec, SpecError, VariantValue};
use std::fmt;

const BUILD_SYSTEM_KEY: &str = "build_system";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Constraint {
    pub name: Option<String>,
    pub versions: Option<VersionRange>,
    pub variants: Vec<(String, VariantValue)>,
    pub dependencies: Vec<Constraint>,
}

impl Constraint {
    pub fn parse(input: &str) -> Result<Self, SpecError> {
        let invalid = |reason: &str| SpecError::InvalidConstraint {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let mut root = Constraint::default();
        let mut dependencies: Vec<Constraint> = Vec::new();

        for word in input.split_whitespace() {
            for (i, segment) in word.split('^').enumerate() {
                if i > 0 {
                    dependencies.push(Constraint::default());
                }
                if segment.is_empty() {
                    continue;
                }
                let target = dependencies.last_mut().unwrap_or(&mut root);
                target.apply_segment(segment).map_err(|reason| invalid(&reason))?;
            }
        }

        for dep in &dependencies {
            if dep.name.is_none() {
                return Err(invalid("dependency requirement must name a package"));
            }
            if !dep.variants.is_empty() {
                return Err(invalid("variant requirements on dependencies are not supported"));
            }
        }
        root.dependencies = dependencies;
        Ok(root)
    }

    fn apply_segment(&mut self, segment: &str) -> Result<(), String> {
        if let Some((key, value)) = segment.split_once('=') {
            if key.is_empty() || value.is_empty() || !is_identifier(key) {
                return Err(format!("malformed variant assignment '{}'", segment));
            }
            self.variants
                .push((key.to_string(), VariantValue::from_text(value)));
            return Ok(());
        }

        if let Some(name) = segment.strip_prefix('-') {
            return self.push_bool_variant(name, false);
        }

        let (head, mut rest) = split_at_sigil(segment);
        if !head.is_empty() {
            if self.name.is_some() {
                return Err(format!("unexpected package name '{}'", head));
            }
            if !is_identifier(head) {
                return Err(format!("invalid package name '{}'", head));
            }
            self.name = Some(head.to_string());
        }

        while let Some(sigil) = rest.chars().next() {
            let (body, next) = split_at_sigil(&rest[sigil.len_utf8()..]);
            match sigil {
                '@' => {
                    if self.versions.is_some() {
                        return Err("multiple version ranges".to_string());
                    }
                    let range = VersionRange::parse(body).map_err(|e| e.to_string())?;
                    self.versions = Some(range);
                }
                '+' => self.push_bool_variant(body, true)?,
                '~' => self.push_bool_variant(body, false)?,
                _ => unreachable!("split_at_sigil only stops at sigils"),
            }
            rest = next;
        }
        Ok(())
    }

    fn push_bool_variant(&mut self, name: &str, enabled: bool) -> Result<(), String> {
        if !is_identifier(name) {
            return Err(format!("invalid variant name '{}'", name));
        }
        self.variants
            .push((name.to_string(), VariantValue::Bool(enabled)));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.versions.is_none()
            && self.variants.is_empty()
            && self.dependencies.is_empty()
    }

    /// Evaluates this constraint against a resolved spec.
    pub fn matches(&self, spec: &PackageSpec) -> bool {
        if let Some(name) = &self.name {
            if name != &spec.name {
                return false;
            }
        }
        if let Some(range) = &self.versions {
            if !range.contains(&spec.version) {
                return false;
            }
        }

        let variants_match = self.variants.iter().all(|(key, expected)| {
            if key == BUILD_SYSTEM_KEY {
                return matches!(expected, VariantValue::Value(v) if v == spec.build_system.as_str());
            }
            spec.variants.get(key) == Some(expected)
        });
        if !variants_match {
            return false;
        }

        self.dependencies.iter().all(|required| {
            spec.dependencies
                .iter()
                .any(|dep| required.matches_dependency(dep))
        })
    }

    /// Matches a dependency edge by name and, when known, version.
    pub fn matches_dependency(&self, dep: &Dependency) -> bool {
        if self.name.as_deref() != Some(dep.name.as_str()) {
            return false;
        }
        match (&self.versions, &dep.version) {
            (None, _) => true,
            (Some(range), Some(version)) => range.contains(version),
            (Some(_), None) => false,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        let mut head = self.name.clone().unwrap_or_default();
        if let Some(range) = &self.versions {
            head.push('@');
            head.push_str(&range.to_string());
        }
        if !head.is_empty() {
            parts.push(head);
        }
        for (key, value) in &self.variants {
            parts.push(match value {
                VariantValue::Bool(true) => format!("+{}", key),
                VariantValue::Bool(false) => format!("~{}", key),
                VariantValue::Value(v) => format!("{}={}", key, v),
            });
        }
        for dep in &self.dependencies {
            parts.push(format!("^{}", dep));
        }
        f.write_str(&parts.join(" "))
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Splits `s` before the first `@`, `+` or `~`.
fn split_at_sigil(s: &str) -> (&str, &str) {
    match s.find(['@', '+', '~']) {
        Some(idx) => (&s[..idx], &s[idx..]),
        None => (s, ""),
    }
}
