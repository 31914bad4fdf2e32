//! End-to-end fine-tuning pipeline.
//!
//! load -> split -> resolve columns -> format -> stage -> train -> manifest.
//! Each step finishes before the next starts.

use crate::config::TuneConfig;
use crate::data::{DataSource, RawDataset, ResolvedColumns, SplitSource, resolve_split};
use crate::error::TuneError;
use crate::llm::{FormattedExample, TrainingPlan, format_partition};
use crate::training::manifest::fingerprint;
use crate::training::{RunManifest, Trainer, TrainingJob, TrainingStatus};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Subdirectory of the output directory holding staged inputs.
pub const STAGING_DIR: &str = ".toxitune";

/// Formatted partitions ready for the trainer.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub columns: ResolvedColumns,
    pub split_source: SplitSource,
    pub train: Vec<FormattedExample>,
    pub validation: Vec<FormattedExample>,
}

/// Split, resolve columns on the train side and format both partitions.
pub fn prepare(dataset: RawDataset, test_size: f64, seed: u64) -> Result<PreparedData, TuneError> {
    let (split, split_source) = resolve_split(dataset, test_size, seed)?;
    info!(
        split_source = split_source.as_str(),
        train = split.train.len(),
        validation = split.validation.len(),
        "Resolved train/validation split"
    );

    let columns = ResolvedColumns::resolve(&split.train.columns)?;
    let train = format_partition(&split.train, &columns)?;
    let validation = format_partition(&split.validation, &columns)?;

    Ok(PreparedData {
        columns,
        split_source,
        train,
        validation,
    })
}

fn to_jsonl(examples: &[FormattedExample]) -> Result<String, TuneError> {
    let mut output = String::new();
    for example in examples {
        output.push_str(&serde_json::to_string(example)?);
        output.push('\n');
    }
    Ok(output)
}

/// Write formatted data and the training plan under `output_dir/.toxitune`.
///
/// Returns the job and a fingerprint of the staged data.
pub async fn stage(
    prepared: &PreparedData,
    config: &TuneConfig,
    output_dir: &Path,
) -> Result<(TrainingJob, String), TuneError> {
    let staging_dir = output_dir.join(STAGING_DIR);
    tokio::fs::create_dir_all(&staging_dir).await?;

    let train_file = staging_dir.join("train.jsonl");
    let eval_file = staging_dir.join("validation.jsonl");
    let train_jsonl = to_jsonl(&prepared.train)?;
    let eval_jsonl = to_jsonl(&prepared.validation)?;
    tokio::fs::write(&train_file, &train_jsonl).await?;
    tokio::fs::write(&eval_file, &eval_jsonl).await?;

    let mut run_config = config.clone();
    run_config.training.output_dir = output_dir.to_path_buf();
    let plan = TrainingPlan::build(&run_config, &train_file, &eval_file);
    let plan_path = staging_dir.join("training_config.json");
    tokio::fs::write(&plan_path, serde_json::to_string_pretty(&plan)?).await?;

    let digest = fingerprint(&[train_jsonl.as_bytes(), eval_jsonl.as_bytes()]);
    Ok((
        TrainingJob {
            plan,
            plan_path,
            staging_dir,
        },
        digest,
    ))
}

/// Options that change how far the pipeline goes.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Stop after staging; never launch the trainer.
    pub dry_run: bool,
}

/// Run the whole pipeline and return the final manifest.
pub async fn run(
    config: &TuneConfig,
    source: &dyn DataSource,
    trainer: &dyn Trainer,
    options: &PipelineOptions,
) -> Result<RunManifest, TuneError> {
    config.validate()?;
    let output_dir: PathBuf = std::path::absolute(&config.training.output_dir)?;

    let source_info = source.source_info();
    info!(
        source = %source_info.source_type,
        location = %source_info.location,
        "Loading dataset"
    );
    let dataset = source.load().await?;
    info!(
        partitions = ?dataset.partition_names(),
        records = dataset.total_records(),
        "Dataset loaded"
    );

    let prepared = prepare(dataset, config.dataset.test_size, config.seed)?;

    let mut manifest = RunManifest::new(&config.model.name, source_info, &output_dir, config.seed);
    manifest.columns = Some(prepared.columns.clone());
    manifest.split_source = Some(prepared.split_source.as_str().to_string());
    manifest.train_examples = prepared.train.len();
    manifest.validation_examples = prepared.validation.len();

    let (job, digest) = stage(&prepared, config, &output_dir).await?;
    manifest.data_fingerprint = Some(digest);

    if options.dry_run {
        manifest.set_status(TrainingStatus::Staged);
        manifest.save()?;
        info!(plan = %job.plan_path.display(), "Dry run: trainer not launched");
        return Ok(manifest);
    }

    manifest.trainer = Some(trainer.name().to_string());
    manifest.set_status(TrainingStatus::Running);
    manifest.save()?;

    match trainer.train(&job).await {
        Ok(metrics) => {
            manifest.metrics = Some(metrics);
            manifest.set_status(TrainingStatus::Completed);
            manifest.save()?;
            Ok(manifest)
        }
        Err(e) => {
            manifest.fail(&e);
            if let Err(save_err) = manifest.save() {
                warn!(error = %save_err, "Could not record failed run");
            }
            Err(e)
        }
    }
}
