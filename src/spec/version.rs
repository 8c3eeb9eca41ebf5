//! Package versions and version ranges
//!
//! Versions are dot-separated components. Numeric components compare
//! numerically and sort above alphabetic ones, so `1.10 > 1.9 > 1.rc`.
//! Development branch names (`develop`, `main`, `master`) sort above every
//! numbered release.
//!
//! Ranges use `lo:hi` with either side optional. Bounds match by prefix, so
//! `:1.20` includes `1.20.3` and `@1.14` includes `1.14.2`.

use super::SpecError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

const DEVELOPMENT_BRANCHES: &[&str] = &["develop", "main", "master"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Component {
    Number(u64),
    Text(String),
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Component::Number(a), Component::Number(b)) => a.cmp(b),
            (Component::Number(_), Component::Text(_)) => Ordering::Greater,
            (Component::Text(_), Component::Number(_)) => Ordering::Less,
            (Component::Text(a), Component::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    raw: String,
    components: Vec<Component>,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, SpecError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(SpecError::InvalidVersion(input.to_string()));
        }

        let mut components = Vec::new();
        for part in raw.split(['.', '-', '_']) {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(SpecError::InvalidVersion(input.to_string()));
            }
            components.push(match part.parse::<u64>() {
                Ok(n) => Component::Number(n),
                Err(_) => Component::Text(part.to_string()),
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            components,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_development(&self) -> bool {
        DEVELOPMENT_BRANCHES.contains(&self.raw.as_str())
    }

    /// True when `self` equals `other` or extends it (`1.14.2` starts with `1.14`).
    pub fn starts_with(&self, other: &Version) -> bool {
        other.components.len() <= self.components.len()
            && self.components[..other.components.len()] == other.components[..]
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.components.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_development(), other.is_development()) {
            (true, true) => self.raw.cmp(&other.raw),
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.components.cmp(&other.components),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.raw
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Inclusive version range; a bare version is a range with both bounds equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub lower: Option<Version>,
    pub upper: Option<Version>,
}

impl VersionRange {
    pub fn any() -> Self {
        Self {
            lower: None,
            upper: None,
        }
    }

    pub fn exact(version: Version) -> Self {
        Self {
            lower: Some(version.clone()),
            upper: Some(version),
        }
    }

    pub fn parse(input: &str) -> Result<Self, SpecError> {
        let input = input.trim();
        let parse_bound = |s: &str| -> Result<Option<Version>, SpecError> {
            if s.is_empty() {
                Ok(None)
            } else {
                Version::parse(s).map(Some)
            }
        };

        match input.split_once(':') {
            Some((lo, hi)) => {
                if hi.contains(':') {
                    return Err(SpecError::InvalidVersion(input.to_string()));
                }
                Ok(Self {
                    lower: parse_bound(lo)?,
                    upper: parse_bound(hi)?,
                })
            }
            None => Ok(Self::exact(Version::parse(input)?)),
        }
    }

    pub fn contains(&self, version: &Version) -> bool {
        let above_lower = match &self.lower {
            Some(lo) => version >= lo || version.starts_with(lo),
            None => true,
        };
        let below_upper = match &self.upper {
            Some(hi) => version <= hi || version.starts_with(hi),
            None => true,
        };
        above_lower && below_upper
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.lower, &self.upper) {
            (Some(lo), Some(hi)) if lo == hi => write!(f, "{}", lo),
            (lo, hi) => {
                if let Some(lo) = lo {
                    write!(f, "{}", lo)?;
                }
                f.write_str(":")?;
                if let Some(hi) = hi {
                    write!(f, "{}", hi)?;
                }
                Ok(())
            }
        }
    }
}
