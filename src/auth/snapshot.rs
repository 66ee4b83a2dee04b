//! Durable session snapshots.
//!
//! One JSON file per account, named after the account email, lets the agent
//! resume without a new email validation after a restart.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::auth::{Session, SnapshotError};
use crate::config::AccountEmail;

/// Directory of per-account session snapshots.
///
/// Writes go through a temporary file in the same directory that is then
/// renamed over the snapshot, so a crash never leaves a half-written file.
/// A snapshot that cannot be parsed is deleted and reported as absent.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Creates a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the snapshot directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the snapshot path for `email`.
    #[must_use]
    pub fn path_for(&self, email: &AccountEmail) -> PathBuf {
        self.dir.join(format!("session.{email}.latest.json"))
    }

    /// Loads the snapshot of `email`.
    ///
    /// Returns `Ok(None)` when there is no snapshot, or when it could not be
    /// parsed (the file is then removed).
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if the file exists but cannot be read.
    pub fn load(&self, email: &AccountEmail) -> Result<Option<Session>, SnapshotError> {
        let path = self.path_for(email);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SnapshotError::Io { path, source }),
        };

        match serde_json::from_slice(&bytes) {
            Ok(session) => {
                tracing::info!("read session snapshot from {}", path.display());
                Ok(Some(session))
            }
            Err(e) => {
                tracing::warn!("discarding corrupt session snapshot {}: {}", path.display(), e);
                self.remove(email)?;
                Ok(None)
            }
        }
    }

    /// Atomically writes the snapshot of `email`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Serialize`] if the session cannot be encoded
    /// and [`SnapshotError::Io`] on any file system failure.
    pub fn save(&self, email: &AccountEmail, session: &Session) -> Result<(), SnapshotError> {
        let path = self.path_for(email);
        let contents = serde_json::to_vec_pretty(session)?;

        std::fs::create_dir_all(&self.dir).map_err(|source| SnapshotError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let io_error = |source: io::Error| SnapshotError::Io {
            path: path.clone(),
            source,
        };
        let mut file = NamedTempFile::new_in(&self.dir).map_err(io_error)?;
        file.write_all(&contents).map_err(io_error)?;
        file.as_file().sync_all().map_err(io_error)?;
        file.persist(&path).map_err(|e| io_error(e.error))?;

        tracing::info!("wrote session snapshot to {}", path.display());
        Ok(())
    }

    /// Deletes the snapshot of `email`. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if the file exists but cannot be removed.
    pub fn remove(&self, email: &AccountEmail) -> Result<(), SnapshotError> {
        let path = self.path_for(email);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("deleted session snapshot {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SnapshotError::Io { path, source }),
        }
    }
}
