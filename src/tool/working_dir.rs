use std::env;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Changes the process working directory and restores it when dropped.
///
/// The working directory is process-global: two guards must not be alive on
/// different threads at the same time.
#[derive(Debug)]
pub struct WorkingDirGuard {
    previous: PathBuf,
}

impl WorkingDirGuard {
    pub fn enter(path: &Path) -> io::Result<Self> {
        let previous = env::current_dir()?;
        env::set_current_dir(path)?;
        Ok(Self { previous })
    }

    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

/// Anchors a relative `path` at the current working directory.
///
/// Paths handed to tools must survive a [`WorkingDirGuard`] changing the
/// directory they were written against. Falls back to `path` unchanged when
/// the working directory is unavailable.
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Err(e) = env::set_current_dir(&self.previous) {
            warn!(
                path = %self.previous.display(),
                error = %e,
                "failed to restore working directory"
            );
        }
    }
}
