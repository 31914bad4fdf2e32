//! Command handlers.

use crate::ConfigAction;
use std::path::Path;
use toxitune_ml::config::WORKSPACE_CONFIG_FILE;
use toxitune_ml::data::open_source;
use toxitune_ml::pipeline::{self, PipelineOptions};
use toxitune_ml::{PythonRuntime, TuneConfig};
use toxitune_ml::training::{PythonSftTrainer, RunManifest};

pub fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config: &TuneConfig,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            std::fs::create_dir_all(workspace)?;
            let config_path = workspace.join(WORKSPACE_CONFIG_FILE);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&TuneConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// Load, split, format, train and save, then report where artifacts went.
pub async fn run_training(
    config: TuneConfig,
    workspace: &Path,
    dry_run: bool,
) -> anyhow::Result<()> {
    let source = open_source(
        &config.dataset.name,
        config.dataset.config.as_deref(),
        &config.hub,
    );
    let runtime = PythonRuntime::from_config(&config.python, workspace.to_path_buf());
    let trainer = PythonSftTrainer::new(runtime);

    tracing::info!(
        dataset = %config.dataset.name,
        model = %config.model.name,
        output_dir = %config.training.output_dir.display(),
        dry_run,
        "Starting fine-tuning run"
    );

    let manifest = pipeline::run(
        &config,
        source.as_ref(),
        &trainer,
        &PipelineOptions { dry_run },
    )
    .await
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    println!("{}", summary(&config, &manifest, dry_run));
    Ok(())
}

fn summary(config: &TuneConfig, manifest: &RunManifest, dry_run: bool) -> String {
    let output_dir = config.training.output_dir.display();
    if dry_run {
        format!(
            "Dry run complete: {} train / {} validation examples staged in: {}",
            manifest.train_examples, manifest.validation_examples, output_dir
        )
    } else {
        format!("Training complete. Artifacts in: {output_dir}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use toxitune_ml::data::DataSourceInfo;

    fn manifest(dir: &Path) -> RunManifest {
        let info = DataSourceInfo {
            source_type: "local".into(),
            location: "data".into(),
            accessed_at: chrono::Utc::now(),
        };
        let mut m = RunManifest::new("base", info, dir, 42);
        m.train_examples = 9;
        m.validation_examples = 1;
        m
    }

    #[test]
    fn test_summary_reports_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TuneConfig::default();
        config.training.output_dir = "outputs/toldbr-unsloth".into();

        assert_eq!(
            summary(&config, &manifest(dir.path()), false),
            "Training complete. Artifacts in: outputs/toldbr-unsloth"
        );
        let dry = summary(&config, &manifest(dir.path()), true);
        assert!(dry.contains("9 train / 1 validation"));
    }

    #[test]
    fn test_config_init_writes_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = TuneConfig::default();
        handle_config(ConfigAction::Init, dir.path(), &config).unwrap();

        let path = dir.path().join(WORKSPACE_CONFIG_FILE);
        assert!(path.exists());
        let loaded = toxitune_ml::load_config(Some(dir.path()), Some(&path)).unwrap();
        assert_eq!(loaded.dataset.name, config.dataset.name);
        assert_eq!(loaded.lora.r, 16);

        // second init leaves the file alone
        std::fs::write(&path, "seed = 7\n").unwrap();
        handle_config(ConfigAction::Init, dir.path(), &config).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "seed = 7\n");
    }
}
