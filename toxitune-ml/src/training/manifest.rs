//! Run manifest written next to the trained adapter.

use crate::data::{DataSourceInfo, ResolvedColumns};
use crate::error::TuneError;
use crate::training::metrics::TrainingMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// File name of the manifest inside the output directory.
pub const MANIFEST_FILE: &str = "toxitune_run.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Data and configuration staged, trainer not launched.
    Staged,
}

/// Record of one fine-tuning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub id: String,
    pub base_model: String,
    pub source: DataSourceInfo,
    pub columns: Option<ResolvedColumns>,
    pub split_source: Option<String>,
    pub train_examples: usize,
    pub validation_examples: usize,
    /// SHA-256 over the staged train and validation JSONL.
    pub data_fingerprint: Option<String>,
    pub output_dir: PathBuf,
    pub trainer: Option<String>,
    pub status: TrainingStatus,
    pub metrics: Option<TrainingMetrics>,
    pub error: Option<String>,
    pub seed: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunManifest {
    pub fn new(base_model: &str, source: DataSourceInfo, output_dir: &Path, seed: u64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            base_model: base_model.to_string(),
            source,
            columns: None,
            split_source: None,
            train_examples: 0,
            validation_examples: 0,
            data_fingerprint: None,
            output_dir: output_dir.to_path_buf(),
            trainer: None,
            status: TrainingStatus::Pending,
            metrics: None,
            error: None,
            seed,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: TrainingStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, error: &TuneError) {
        self.error = Some(error.to_string());
        self.set_status(TrainingStatus::Failed);
    }

    pub fn path(&self) -> PathBuf {
        self.output_dir.join(MANIFEST_FILE)
    }

    pub fn load(path: &Path) -> Result<Self, TuneError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write atomically via a temp file and rename.
    pub fn save(&self) -> Result<(), TuneError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.path();
        let content = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &content)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Hash staged data files in order.
pub fn fingerprint(chunks: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update((chunk.len() as u64).to_le_bytes());
        hasher.update(chunk);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> DataSourceInfo {
        DataSourceInfo {
            source_type: "local".into(),
            location: "data.jsonl".into(),
            accessed_at: Utc::now(),
        }
    }

    #[test]
    fn test_manifest_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = RunManifest::new("base", info(), dir.path(), 42);
        manifest.train_examples = 90;
        manifest.set_status(TrainingStatus::Staged);
        manifest.save().unwrap();

        let loaded = RunManifest::load(&dir.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(loaded.id, manifest.id);
        assert_eq!(loaded.train_examples, 90);
        assert_eq!(loaded.status, TrainingStatus::Staged);
        assert!(!dir.path().join("toxitune_run.tmp").exists());
    }

    #[test]
    fn test_fail_records_error() {
        let mut manifest = RunManifest::new("base", info(), Path::new("out"), 1);
        manifest.fail(&TuneError::training("boom"));
        assert_eq!(manifest.status, TrainingStatus::Failed);
        assert_eq!(manifest.error.as_deref(), Some("Training error: boom"));
    }

    #[test]
    fn test_fingerprint_is_boundary_sensitive() {
        let ab_c = fingerprint(&["ab".as_bytes(), "c".as_bytes()]);
        assert_eq!(ab_c, fingerprint(&["ab".as_bytes(), "c".as_bytes()]));
        assert_ne!(ab_c, fingerprint(&["a".as_bytes(), "bc".as_bytes()]));
    }
}
