//! Configuration management for phasekit
//!
//! Settings are read from environment variables with fallback defaults.
//! Command-line flags override whatever is loaded here.
//!
//! # Environment Variables
//!
//! - `PHASEKIT_INSTALL_ROOT`: directory install prefixes are created under -
//!   default: `<data dir>/phasekit/opt`
//! - `PHASEKIT_MIRRORS_FILE`: YAML, TOML or JSON mirror definitions - default:
//!   `<config dir>/phasekit/mirrors.yaml` when that file exists
//! - `PHASEKIT_RUN_TESTS`: run install-time tests (true|false) - default: "true"
//! - `PHASEKIT_UPDATE_INDEX`: regenerate mirror indices after a batch - default: "false"
//! - `PHASEKIT_LOG_LEVEL`: logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use phasekit::PhasekitConfig;
//!
//! let config = PhasekitConfig::from_env().expect("invalid configuration");
//! println!("{}", config);
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_RUN_TESTS: bool = true;
const DEFAULT_UPDATE_INDEX: bool = false;
const MIRRORS_FILE_NAME: &str = "mirrors.yaml";

pub const ENV_INSTALL_ROOT: &str = "PHASEKIT_INSTALL_ROOT";
pub const ENV_MIRRORS_FILE: &str = "PHASEKIT_MIRRORS_FILE";
pub const ENV_RUN_TESTS: &str = "PHASEKIT_RUN_TESTS";
pub const ENV_UPDATE_INDEX: &str = "PHASEKIT_UPDATE_INDEX";
pub const ENV_LOG_LEVEL: &str = "PHASEKIT_LOG_LEVEL";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhasekitConfig {
    /// Install prefixes are created below this directory
    pub install_root: PathBuf,

    /// Mirror definitions; no file means no autopush
    pub mirrors_file: Option<PathBuf>,

    /// False records every install-time test as skipped
    pub run_tests: bool,

    /// Regenerate indices of pushed-to mirrors after a batch
    pub update_index: bool,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

fn default_install_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(env::temp_dir)
        .join("phasekit")
        .join("opt")
}

fn default_mirrors_file() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("phasekit").join(MIRRORS_FILE_NAME))
        .filter(|path| path.is_file())
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::ParseError {
            field: field.to_string(),
            error: format!("expected a boolean, got '{}'", other),
        }),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(value) => parse_bool(key, &value),
        Err(_) => Ok(default),
    }
}

impl Default for PhasekitConfig {
    /// Loads from the environment, ignoring values that do not parse.
    fn default() -> Self {
        Self {
            install_root: env::var(ENV_INSTALL_ROOT)
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_install_root()),
            mirrors_file: env::var(ENV_MIRRORS_FILE)
                .ok()
                .map(PathBuf::from)
                .or_else(default_mirrors_file),
            run_tests: env_bool(ENV_RUN_TESTS, DEFAULT_RUN_TESTS).unwrap_or(DEFAULT_RUN_TESTS),
            update_index: env_bool(ENV_UPDATE_INDEX, DEFAULT_UPDATE_INDEX)
                .unwrap_or(DEFAULT_UPDATE_INDEX),
            log_level: env::var(ENV_LOG_LEVEL)
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
                .to_lowercase(),
        }
    }
}

impl PhasekitConfig {
    /// Loads from the environment, rejecting malformed values, and validates.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            run_tests: env_bool(ENV_RUN_TESTS, DEFAULT_RUN_TESTS)?,
            update_index: env_bool(ENV_UPDATE_INDEX, DEFAULT_UPDATE_INDEX)?,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    ///
    /// Checks that the log level is known and that an explicitly configured
    /// mirrors file exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.install_root.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Install root must not be empty".to_string(),
            ));
        }

        if let Some(path) = &self.mirrors_file {
            if !path.is_file() {
                return Err(ConfigError::ValidationFailed(format!(
                    "Mirrors file not found: {}",
                    path.display()
                )));
            }
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    /// Converts configuration to a display map for output formatting
    pub fn to_display_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();

        map.insert(
            "install_root".to_string(),
            self.install_root.display().to_string(),
        );
        if let Some(ref path) = self.mirrors_file {
            map.insert("mirrors_file".to_string(), path.display().to_string());
        }
        map.insert("run_tests".to_string(), self.run_tests.to_string());
        map.insert("update_index".to_string(), self.update_index.to_string());
        map.insert("log_level".to_string(), self.log_level.clone());

        map
    }
}

impl fmt::Display for PhasekitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Phasekit Configuration:")?;
        writeln!(f, "  Install Root: {}", self.install_root.display())?;
        match self.mirrors_file {
            Some(ref path) => writeln!(f, "  Mirrors File: {}", path.display())?,
            None => writeln!(f, "  Mirrors File: (none)")?,
        }
        writeln!(f, "  Run Tests: {}", self.run_tests)?;
        writeln!(f, "  Update Index: {}", self.update_index)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
