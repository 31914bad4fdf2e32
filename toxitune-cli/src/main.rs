//! toxitune CLI: fine-tune a toxic message classifier.
//!
//! Without a subcommand, runs the full pipeline: load, split, format, train, save.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use toxitune_ml::TuneConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Train a toxicity classifier with LoRA over a quantized base model
#[derive(Parser, Debug)]
#[command(name = "toxitune", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    train: TrainArgs,

    /// Workspace directory (searched for toxitune.toml)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Configuration file path (replaces the workspace toxitune.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Run settings. Unset flags keep the value from configuration files,
/// the environment, or the built-in defaults.
#[derive(clap::Args, Debug, Default)]
struct TrainArgs {
    /// Hub dataset id, or a local .json/.jsonl file or directory
    #[arg(long)]
    dataset_name: Option<String>,

    /// Dataset configuration (subset), if any
    #[arg(long)]
    dataset_config: Option<String>,

    /// Base model
    #[arg(long)]
    model_name: Option<String>,

    /// Output directory for adapter weights and tokenizer
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    max_seq_length: Option<usize>,

    #[arg(long)]
    train_batch_size: Option<usize>,

    #[arg(long)]
    eval_batch_size: Option<usize>,

    /// Gradient accumulation steps
    #[arg(long)]
    grad_accum: Option<usize>,

    #[arg(long)]
    epochs: Option<f64>,

    #[arg(long)]
    learning_rate: Option<f64>,

    #[arg(long)]
    warmup_ratio: Option<f64>,

    #[arg(long)]
    lora_r: Option<u32>,

    #[arg(long)]
    lora_alpha: Option<u32>,

    #[arg(long)]
    lora_dropout: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Validation fraction, used when the dataset has no validation split
    #[arg(long)]
    test_size: Option<f64>,

    /// Python interpreter for the training stack
    #[arg(long)]
    python: Option<PathBuf>,

    /// Prepare data and training config, but do not train
    #[arg(long)]
    dry_run: bool,
}

impl TrainArgs {
    /// Apply CLI flags on top of the layered configuration.
    fn apply(&self, config: &mut TuneConfig) {
        if let Some(v) = &self.dataset_name {
            config.dataset.name = v.clone();
        }
        if let Some(v) = &self.dataset_config {
            config.dataset.config = Some(v.clone());
        }
        if let Some(v) = &self.model_name {
            config.model.name = v.clone();
        }
        if let Some(v) = &self.output_dir {
            config.training.output_dir = v.clone();
        }
        if let Some(v) = self.max_seq_length {
            config.model.max_seq_length = v;
        }
        if let Some(v) = self.train_batch_size {
            config.training.train_batch_size = v;
        }
        if let Some(v) = self.eval_batch_size {
            config.training.eval_batch_size = v;
        }
        if let Some(v) = self.grad_accum {
            config.training.grad_accum = v;
        }
        if let Some(v) = self.epochs {
            config.training.epochs = v;
        }
        if let Some(v) = self.learning_rate {
            config.training.learning_rate = v;
        }
        if let Some(v) = self.warmup_ratio {
            config.training.warmup_ratio = v;
        }
        if let Some(v) = self.lora_r {
            config.lora.r = v;
        }
        if let Some(v) = self.lora_alpha {
            config.lora.alpha = v;
        }
        if let Some(v) = self.lora_dropout {
            config.lora.dropout = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.test_size {
            config.dataset.test_size = v;
        }
        if let Some(v) = &self.python {
            config.python.python_path = Some(v.clone());
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default toxitune.toml in the workspace
    Init,
    /// Show the effective configuration
    Show,
}

fn init_tracing(
    verbose: u8,
    quiet: bool,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr; RUST_LOG wins when set.
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "toxitune", "toxitune")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    if std::fs::create_dir_all(&log_dir).is_err() {
        tracing_subscriber::registry().with(stderr_layer).init();
        return None;
    }
    let file_appender = tracing_appender::rolling::daily(&log_dir, "toxitune.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();
    Some(guard)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (HF_TOKEN, TOXITUNE_*)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.quiet);

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| cli.workspace.clone());

    let mut config = toxitune_ml::load_config(Some(&workspace), cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    cli.train.apply(&mut config);

    match cli.command {
        Some(Commands::Config { action }) => commands::handle_config(action, &workspace, &config),
        None => commands::run_training(config, &workspace, cli.train.dry_run).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_defaults_leave_config_untouched() {
        let cli = Cli::try_parse_from(["toxitune"]).unwrap();
        let mut config = TuneConfig::default();
        cli.train.apply(&mut config);
        assert_eq!(config.dataset.name, "JAugusto97/told-br");
        assert_eq!(config.training.epochs, 2.0);
        assert!(!cli.train.dry_run);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_flags_override_config() {
        let cli = Cli::try_parse_from([
            "toxitune",
            "--dataset-name",
            "data/msgs.jsonl",
            "--output-dir",
            "outputs/x",
            "--epochs",
            "1.5",
            "--lora-r",
            "8",
            "--grad-accum",
            "2",
            "--test-size",
            "0.2",
            "--seed",
            "7",
            "--dry-run",
        ])
        .unwrap();
        let mut config = TuneConfig::default();
        cli.train.apply(&mut config);

        assert_eq!(config.dataset.name, "data/msgs.jsonl");
        assert_eq!(config.training.output_dir, PathBuf::from("outputs/x"));
        assert_eq!(config.training.epochs, 1.5);
        assert_eq!(config.lora.r, 8);
        assert_eq!(config.training.grad_accum, 2);
        assert_eq!(config.dataset.test_size, 0.2);
        assert_eq!(config.seed, 7);
        // untouched
        assert_eq!(config.lora.alpha, 16);
        assert!(cli.train.dry_run);
    }

    #[test]
    fn test_config_subcommand_parses() {
        let cli = Cli::try_parse_from(["toxitune", "config", "show", "-v"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Show
            })
        ));
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
