//! Build cache stored in a local directory
//!
//! Layout below the cache root:
//!
//! ```text
//! build_cache/
//!   index.json
//!   <name>-<version>-<hash>.tar.gz
//!   <name>-<version>-<hash>.spec.json
//! ```

use super::{BuildCache, Mirror, PushError, PushOptions};
use crate::spec::PackageSpec;
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const BUILD_CACHE_DIR: &str = "build_cache";
pub const INDEX_FILE: &str = "index.json";
const TARBALL_SUFFIX: &str = ".tar.gz";
const SPEC_SUFFIX: &str = ".spec.json";

/// Metadata written next to every tarball.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub spec: PackageSpec,
    pub hash: String,
    pub tarball: String,
    pub sha256: String,
    pub signed: bool,
    pub pushed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheIndex {
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<CacheEntry>,
}

/// Build cache for `file://` URLs and plain paths.
#[derive(Debug, Default, Clone)]
pub struct DirectoryBuildCache;

impl DirectoryBuildCache {
    pub fn new() -> Self {
        Self
    }

    /// Maps a mirror URL to the local cache root.
    pub fn root_for(url: &str) -> Result<PathBuf, PushError> {
        if let Some(path) = url.strip_prefix("file://") {
            return Ok(PathBuf::from(path));
        }
        if url.contains("://") {
            return Err(PushError::UnsupportedUrl(url.to_string()));
        }
        Ok(PathBuf::from(url))
    }

    fn entry_stem(spec: &PackageSpec) -> String {
        format!("{}-{}-{}", spec.name, spec.version, spec.dag_hash())
    }

    /// Reads every entry currently stored under `root`.
    pub fn entries(root: &Path) -> Result<Vec<CacheEntry>, PushError> {
        let dir = root.join(BUILD_CACHE_DIR);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for item in std::fs::read_dir(&dir)? {
            let path = item?.path();
            let is_spec = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(SPEC_SUFFIX))
                .unwrap_or(false);
            if is_spec {
                let entry: CacheEntry = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| a.tarball.cmp(&b.tarball));
        Ok(entries)
    }

    pub fn read_index(root: &Path) -> Result<CacheIndex, PushError> {
        let path = root.join(BUILD_CACHE_DIR).join(INDEX_FILE);
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }

    fn write_index(root: &Path) -> Result<PathBuf, PushError> {
        let index = CacheIndex {
            generated_at: Utc::now(),
            entries: Self::entries(root)?,
        };
        let dir = root.join(BUILD_CACHE_DIR);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(INDEX_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(&index)?)?;
        info!(index = %path.display(), entries = index.entries.len(), "wrote build cache index");
        Ok(path)
    }
}

fn archive_prefix(prefix: &Path, tarball: &Path) -> Result<(), PushError> {
    let file = File::create(tarball)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut archive = tar::Builder::new(encoder);
    archive.follow_symlinks(false);
    archive.append_dir_all(".", prefix)?;
    archive.into_inner()?.finish()?;
    Ok(())
}

fn sha256_file(path: &Path) -> Result<String, PushError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

impl BuildCache for DirectoryBuildCache {
    fn push_or_raise(
        &self,
        spec: &PackageSpec,
        prefix: &Path,
        url: &str,
        options: &PushOptions,
    ) -> Result<(), PushError> {
        let root = Self::root_for(url)?;
        if !options.unsigned {
            return Err(PushError::SigningUnavailable {
                url: url.to_string(),
            });
        }
        if !prefix.is_dir() {
            return Err(PushError::MissingPrefix(prefix.to_path_buf()));
        }

        let dir = root.join(BUILD_CACHE_DIR);
        std::fs::create_dir_all(&dir)?;

        let stem = Self::entry_stem(spec);
        let tarball_name = format!("{}{}", stem, TARBALL_SUFFIX);
        let tarball = dir.join(&tarball_name);
        if tarball.exists() && !options.force {
            return Err(PushError::AlreadyExists {
                url: url.to_string(),
                entry: tarball_name,
            });
        }

        debug!(package = %spec.name, tarball = %tarball.display(), "archiving prefix");
        archive_prefix(prefix, &tarball)?;

        let entry = CacheEntry {
            spec: spec.clone(),
            hash: spec.dag_hash(),
            sha256: sha256_file(&tarball)?,
            tarball: tarball_name,
            signed: !options.unsigned,
            pushed_at: Utc::now(),
        };
        std::fs::write(
            dir.join(format!("{}{}", stem, SPEC_SUFFIX)),
            serde_json::to_string_pretty(&entry)?,
        )?;
        info!(package = %spec.name, url, "pushed to build cache");

        if options.regenerate_index {
            Self::write_index(&root)?;
        }
        Ok(())
    }

    fn update_index(&self, mirror: &Mirror) -> Result<(), PushError> {
        let root = Self::root_for(mirror.push_url())?;
        Self::write_index(&root)?;
        Ok(())
    }
}
