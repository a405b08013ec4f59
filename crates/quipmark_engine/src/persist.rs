use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("invalid relative path: {0}")]
    InvalidPath(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    // Basic writability probe: try creating a temp file.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Atomically writes documents below a fixed output root.
///
/// Content is written to a temp file in the target directory and renamed
/// into place, so a partially written file is never visible at its final
/// path. Parent directories are created idempotently, tolerating concurrent
/// creation by other workers.
pub struct AtomicDocWriter {
    root: PathBuf,
}

impl AtomicDocWriter {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `content` at `rel_path` (joined with `/`) below the root.
    pub fn write(&self, rel_path: &str, content: &str) -> Result<PathBuf, PersistError> {
        let target = self.root.join(checked_relative(rel_path)?);
        let dir = target.parent().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        // Replace existing file if present to keep determinism.
        if target.exists() {
            fs::remove_file(&target)?;
        }
        tmp.persist(&target)
            .map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }

    /// Removes a previously written file; a missing file is not an error.
    pub fn remove(&self, rel_path: &str) -> Result<(), PersistError> {
        let target = self.root.join(checked_relative(rel_path)?);
        match fs::remove_file(target) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Rejects absolute paths and parent-directory escapes before joining
/// below the output root.
fn checked_relative(rel_path: &str) -> Result<PathBuf, PersistError> {
    let path = Path::new(rel_path);
    if rel_path.is_empty()
        || !path
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(PersistError::InvalidPath(rel_path.to_string()));
    }
    Ok(path.to_path_buf())
}
