//! crates/checkpoint/src/manager.rs
//!
//! Persists a [`CheckpointRecord`] by writing to a staging file beside the
//! destination and renaming it into place, so a crash mid-write never
//! leaves a half-written checkpoint for the next startup to trip over.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CheckpointResult;
use crate::record::CheckpointRecord;

/// Reads and atomically persists the checkpoint file at a fixed path.
pub struct CheckpointManager {
    path: PathBuf,
}

impl CheckpointManager {
    /// Points the manager at `path`; the file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the current checkpoint record, if the file exists.
    pub fn load(&self) -> CheckpointResult<Option<CheckpointRecord>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Serializes `record` and writes it atomically: a staging file in the
    /// same directory, fsynced, then renamed over the destination path.
    /// The staging file shares a directory with the destination so the
    /// rename is guaranteed atomic on the same filesystem.
    pub fn save(&self, record: &CheckpointRecord) -> CheckpointResult<()> {
        let staging_path = staging_path_for(&self.path);
        let json = serde_json::to_vec_pretty(record)?;

        {
            let mut file = std::fs::File::create(&staging_path)?;
            use std::io::Write;
            file.write_all(&json)?;
            file.sync_all()?;
        }

        std::fs::rename(&staging_path, &self.path)?;
        debug!(path = %self.path.display(), "checkpoint saved");
        Ok(())
    }
}

fn staging_path_for(dest: &Path) -> PathBuf {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "checkpoint".to_string());
    dest.with_file_name(format!(".{file_name}.tmp-{}", std::process::id()))
}
