//! Artifact storage for task outputs.
//!
//! Every export invocation writes to its own timestamped path via a temp
//! file that is atomically renamed into place; a stable "latest" name is then
//! re-pointed the same way. Two racing exports each produce a complete file
//! and the latest pointer always names a complete file.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;
use thiserror::Error;
use uuid::Uuid;

/// Stable name of the most recent export.
pub const EXPORT_LATEST: &str = "closed_service_requests.csv";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to persist artifact: {0}")]
    Persist(#[from] tempfile::PersistError),
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn latest_export_path(&self) -> PathBuf {
        self.root.join(EXPORT_LATEST)
    }

    /// Write an export artifact. Returns the per-invocation path.
    pub fn write_export(&self, bytes: &[u8]) -> Result<PathBuf, ArtifactError> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S");
        let suffix = Uuid::new_v4().simple();
        let name = format!("closed_service_requests-{stamp}-{suffix}.csv");
        let path = self.root.join(name);

        self.persist_atomically(bytes, &path)?;
        self.persist_atomically(bytes, &self.latest_export_path())?;
        Ok(path)
    }

    fn persist_atomically(&self, bytes: &[u8], dest: &Path) -> Result<(), ArtifactError> {
        // Temp file lives in the same directory so the rename never crosses
        // a filesystem boundary.
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(dest)?;
        Ok(())
    }
}
