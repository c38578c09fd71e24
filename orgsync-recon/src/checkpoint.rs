//! Durable progress state for resumable runs
//!
//! The checkpoint records which source identifiers have already been applied
//! and the last committed batch index. It is written after every committed
//! batch and on cancellation, so a re-run skips already-processed input
//! instead of reprocessing it. Loading a missing file yields empty state;
//! loading twice is idempotent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use orgsync_common::{Error, Result};

/// Persisted progress marker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressState {
    /// Identifiers whose rows have been applied (committed or skipped as
    /// existing); failed rows are deliberately absent so a re-run retries
    /// them
    pub applied: BTreeSet<String>,

    /// Index of the last committed batch
    pub last_batch: u64,
}

/// Checkpoint file handle
#[derive(Debug)]
pub struct Checkpoint {
    path: PathBuf,
    state: ProgressState,
}

impl Checkpoint {
    /// Load the checkpoint at `path`; a missing file is empty state
    pub fn load(path: &Path) -> Result<Self> {
        let state = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Corrupt checkpoint {}: {}", path.display(), e)))?
        } else {
            ProgressState::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Whether this identifier was applied by a previous batch or run
    pub fn contains(&self, ein: &str) -> bool {
        self.state.applied.contains(ein)
    }

    /// Record a committed batch's identifiers
    pub fn record_batch(&mut self, eins: impl IntoIterator<Item = String>, batch_index: u64) {
        self.state.applied.extend(eins);
        self.state.last_batch = self.state.last_batch.max(batch_index);
    }

    /// Persist atomically (temp file + rename)
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.state)
            .map_err(|e| Error::Internal(format!("Serialize checkpoint failed: {}", e)))?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            applied = self.state.applied.len(),
            last_batch = self.state.last_batch,
            "Checkpoint saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let checkpoint = Checkpoint::load(&dir.path().join("checkpoint.json")).unwrap();
        assert!(checkpoint.state().applied.is_empty());
        assert_eq!(checkpoint.state().last_batch, 0);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");

        let mut checkpoint = Checkpoint::load(&path).unwrap();
        checkpoint.record_batch(["123456789".to_string(), "987654321".to_string()], 1);
        checkpoint.save().unwrap();

        let reloaded = Checkpoint::load(&path).unwrap();
        assert!(reloaded.contains("123456789"));
        assert!(reloaded.contains("987654321"));
        assert!(!reloaded.contains("555555555"));
        assert_eq!(reloaded.state().last_batch, 1);
    }

    #[test]
    fn test_reload_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");

        let mut checkpoint = Checkpoint::load(&path).unwrap();
        checkpoint.record_batch(["123456789".to_string()], 3);
        checkpoint.save().unwrap();

        let first = Checkpoint::load(&path).unwrap();
        let second = Checkpoint::load(&path).unwrap();
        assert_eq!(first.state().applied, second.state().applied);
        assert_eq!(first.state().last_batch, second.state().last_batch);
    }

    #[test]
    fn test_corrupt_checkpoint_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(Checkpoint::load(&path).is_err());
    }
}
