//! Trainer backends.

use crate::error::TuneError;
use crate::llm::TrainingPlan;
use crate::runtime::PythonRuntime;
use crate::training::metrics::TrainingMetrics;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

/// Driver script run inside the Python training stack.
pub const SFT_DRIVER: &str = include_str!("../../python/sft_driver.py");

/// Python modules the driver imports.
pub const REQUIRED_PACKAGES: &[&str] = &["unsloth", "trl", "datasets"];

/// Everything a trainer needs for one run, already staged on disk.
#[derive(Debug, Clone)]
pub struct TrainingJob {
    pub plan: TrainingPlan,
    /// Path of the serialized plan.
    pub plan_path: PathBuf,
    /// Directory holding staged data and scripts.
    pub staging_dir: PathBuf,
}

/// A backend that fine-tunes the model described by a [`TrainingJob`].
#[async_trait]
pub trait Trainer: Send + Sync {
    fn name(&self) -> &str;

    /// Run training to completion and persist adapter weights and tokenizer
    /// into the plan's output directory.
    async fn train(&self, job: &TrainingJob) -> Result<TrainingMetrics, TuneError>;
}

/// Runs unsloth + trl SFT through the Python runtime.
pub struct PythonSftTrainer {
    runtime: PythonRuntime,
    /// Skip the import check before launching.
    pub skip_preflight: bool,
}

impl PythonSftTrainer {
    pub fn new(runtime: PythonRuntime) -> Self {
        Self {
            runtime,
            skip_preflight: false,
        }
    }

    async fn preflight(&self) -> Result<(), TuneError> {
        let packages = self.runtime.check_packages(REQUIRED_PACKAGES).await;
        let missing: Vec<&str> = packages
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(name, _)| name.as_str())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TuneError::Python(format!(
                "{} cannot import {missing:?}; install them in the training environment",
                self.runtime.python_cmd().display()
            )))
        }
    }
}

#[async_trait]
impl Trainer for PythonSftTrainer {
    fn name(&self) -> &str {
        "python-sft"
    }

    async fn train(&self, job: &TrainingJob) -> Result<TrainingMetrics, TuneError> {
        if !self.skip_preflight {
            self.preflight().await?;
        }

        let driver = job.staging_dir.join("sft_driver.py");
        tokio::fs::write(&driver, SFT_DRIVER).await?;

        let plan_arg = job.plan_path.to_string_lossy();
        info!(
            model = %job.plan.model.model_name,
            output_dir = %job.plan.sft.output_dir.display(),
            "Launching SFT trainer"
        );
        let stdout = self
            .runtime
            .run_script_file(&driver, &["--config", plan_arg.as_ref()], None)
            .await?;

        let metrics = TrainingMetrics::from_driver_output(&stdout).ok_or_else(|| {
            TuneError::training("trainer finished without reporting a JSON summary")
        })?;

        let adapter_config = job.plan.sft.output_dir.join("adapter_config.json");
        if !adapter_config.exists() {
            warn!(
                path = %adapter_config.display(),
                "Trainer finished but no adapter config was written"
            );
        }
        Ok(metrics)
    }
}
