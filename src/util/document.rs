//! Loading YAML, TOML or JSON documents chosen by file extension

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Unsupported document format for {} (expected .yaml, .yml, .toml or .json)", .path.display())]
    UnsupportedFormat { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Toml,
    Json,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            "toml" => Some(DocumentFormat::Toml),
            "json" => Some(DocumentFormat::Json),
            _ => None,
        }
    }
}

pub fn parse_document<T: DeserializeOwned>(
    content: &str,
    format: DocumentFormat,
    path: &Path,
) -> Result<T, DocumentError> {
    let parse_error = |reason: String| DocumentError::Parse {
        path: path.to_path_buf(),
        reason,
    };
    match format {
        DocumentFormat::Yaml => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string())),
        DocumentFormat::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
        DocumentFormat::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
    }
}

pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, DocumentError> {
    let format = DocumentFormat::from_path(path).ok_or_else(|| DocumentError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&content, format, path)
}
