//! JSON checkpoint file for crash-resumable runs.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::error::ReplenishmentError;
use super::traits::CheckpointStore;
use crate::models::ProgressState;

/// Checkpoint kept as one pretty-printed JSON file, replaced on every save.
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, reason: impl ToString) -> ReplenishmentError {
        ReplenishmentError::Checkpoint {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn load(&self) -> Result<Option<ProgressState>, ReplenishmentError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.error(e)),
        };

        let mut state: ProgressState = serde_json::from_str(&text).map_err(|e| self.error(e))?;
        state.normalize();
        tracing::info!(
            path = %self.path.display(),
            processed = state.completed_count(),
            failed = state.failed_count(),
            "Loaded checkpoint"
        );
        Ok(Some(state))
    }

    fn save(&self, state: &ProgressState) -> Result<(), ReplenishmentError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| self.error(e))?;

        let json = serde_json::to_string_pretty(state)?;
        // Same directory so the rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.error(e))?;
        tmp.write_all(json.as_bytes()).map_err(|e| self.error(e))?;
        tmp.flush().map_err(|e| self.error(e))?;
        tmp.persist(&self.path).map_err(|e| self.error(e.error))?;

        tracing::debug!(
            path = %self.path.display(),
            processed = state.completed_count(),
            failed = state.failed_count(),
            "Checkpoint saved"
        );
        Ok(())
    }
}
