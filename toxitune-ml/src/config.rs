//! Configuration for a fine-tuning run.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment. CLI flags are applied on top by the
//! binary. Every setting handed to the training stack lives here, so nothing
//! depends on library-level defaults for quantization or precision.

use crate::error::TuneError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the workspace-level config file.
pub const WORKSPACE_CONFIG_FILE: &str = "toxitune.toml";

/// Prefix for environment overrides (`TOXITUNE_TRAINING__EPOCHS=3`).
pub const ENV_PREFIX: &str = "TOXITUNE_";

/// Top-level run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuneConfig {
    /// Seed for the validation split, adapter init and the trainer.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub lora: LoraConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub python: PythonConfig,
}

impl Default for TuneConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            dataset: DatasetConfig::default(),
            hub: HubConfig::default(),
            model: ModelConfig::default(),
            lora: LoraConfig::default(),
            training: TrainingConfig::default(),
            python: PythonConfig::default(),
        }
    }
}

fn default_seed() -> u64 {
    42
}

/// Which dataset to load and how to split it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Hub dataset id, or a local `.json`/`.jsonl` file or directory.
    #[serde(default = "default_dataset_name")]
    pub name: String,
    /// Hub dataset config (subset), if any.
    #[serde(default)]
    pub config: Option<String>,
    /// Validation fraction, used only when the dataset has no validation/test split.
    #[serde(default = "default_test_size")]
    pub test_size: f64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            name: default_dataset_name(),
            config: None,
            test_size: default_test_size(),
        }
    }
}

fn default_dataset_name() -> String {
    "JAugusto97/told-br".to_string()
}

fn default_test_size() -> f64 {
    0.1
}

/// Hugging Face datasets-server client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_hub_endpoint")]
    pub endpoint: String,
    /// Environment variable holding an access token for gated datasets.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Rows per `/rows` request (the server caps this at 100).
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Stop fetching a split after this many rows.
    #[serde(default)]
    pub max_rows: Option<usize>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: default_hub_endpoint(),
            token_env: default_token_env(),
            page_size: default_page_size(),
            max_rows: None,
        }
    }
}

impl HubConfig {
    /// The access token, if the configured variable is set and non-empty.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

fn default_hub_endpoint() -> String {
    "https://datasets-server.huggingface.co".to_string()
}

fn default_token_env() -> String {
    "HF_TOKEN".to_string()
}

fn default_page_size() -> usize {
    100
}

/// Weight quantization applied when loading the base model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuantizationMethod {
    BitsAndBytes { bits: u8 },
    None,
}

impl Default for QuantizationMethod {
    fn default() -> Self {
        Self::BitsAndBytes { bits: 4 }
    }
}

/// Base model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_max_seq_length")]
    pub max_seq_length: usize,
    #[serde(default)]
    pub quantization: QuantizationMethod,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            max_seq_length: default_max_seq_length(),
            quantization: QuantizationMethod::default(),
        }
    }
}

fn default_model_name() -> String {
    "unsloth/Llama-3.2-1B-Instruct-bnb-4bit".to_string()
}

fn default_max_seq_length() -> usize {
    1024
}

/// How activations are recomputed during the backward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientCheckpointing {
    /// The training stack's own offloaded variant.
    Unsloth,
    Enabled,
    Disabled,
}

/// Low-rank adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoraConfig {
    #[serde(default = "default_lora_r")]
    pub r: u32,
    #[serde(default = "default_lora_alpha")]
    pub alpha: u32,
    #[serde(default)]
    pub dropout: f64,
    #[serde(default = "default_target_modules")]
    pub target_modules: Vec<String>,
    #[serde(default = "default_bias")]
    pub bias: String,
    #[serde(default = "default_gradient_checkpointing")]
    pub gradient_checkpointing: GradientCheckpointing,
}

impl Default for LoraConfig {
    fn default() -> Self {
        Self {
            r: default_lora_r(),
            alpha: default_lora_alpha(),
            dropout: 0.0,
            target_modules: default_target_modules(),
            bias: default_bias(),
            gradient_checkpointing: default_gradient_checkpointing(),
        }
    }
}

fn default_lora_r() -> u32 {
    16
}

fn default_lora_alpha() -> u32 {
    16
}

fn default_target_modules() -> Vec<String> {
    [
        "q_proj",
        "k_proj",
        "v_proj",
        "o_proj",
        "gate_proj",
        "up_proj",
        "down_proj",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_bias() -> String {
    "none".to_string()
}

fn default_gradient_checkpointing() -> GradientCheckpointing {
    GradientCheckpointing::Unsloth
}

/// Optimizer names as understood by the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Optimizer {
    #[serde(rename = "adamw_8bit")]
    AdamW8bit,
    #[serde(rename = "paged_adamw_8bit")]
    PagedAdamW8bit,
    #[serde(rename = "adamw_torch")]
    AdamWTorch,
    #[serde(rename = "sgd")]
    Sgd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LrScheduler {
    Cosine,
    Linear,
    Constant,
    ConstantWithWarmup,
}

/// Mixed-precision mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Bf16,
    Fp16,
    Fp32,
}

/// Supervised fine-tuning hyperparameters and cadences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_batch_size")]
    pub train_batch_size: usize,
    #[serde(default = "default_batch_size")]
    pub eval_batch_size: usize,
    #[serde(default = "default_grad_accum")]
    pub grad_accum: usize,
    #[serde(default = "default_epochs")]
    pub epochs: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_warmup_ratio")]
    pub warmup_ratio: f64,
    #[serde(default = "default_eval_steps")]
    pub eval_steps: usize,
    #[serde(default = "default_save_steps")]
    pub save_steps: usize,
    #[serde(default = "default_logging_steps")]
    pub logging_steps: usize,
    #[serde(default = "default_optimizer")]
    pub optimizer: Optimizer,
    #[serde(default = "default_scheduler")]
    pub scheduler: LrScheduler,
    #[serde(default = "default_precision")]
    pub precision: Precision,
    #[serde(default)]
    pub packing: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            train_batch_size: default_batch_size(),
            eval_batch_size: default_batch_size(),
            grad_accum: default_grad_accum(),
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            warmup_ratio: default_warmup_ratio(),
            eval_steps: default_eval_steps(),
            save_steps: default_save_steps(),
            logging_steps: default_logging_steps(),
            optimizer: default_optimizer(),
            scheduler: default_scheduler(),
            precision: default_precision(),
            packing: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs/toldbr-unsloth")
}

fn default_batch_size() -> usize {
    8
}

fn default_grad_accum() -> usize {
    4
}

fn default_epochs() -> f64 {
    2.0
}

fn default_learning_rate() -> f64 {
    2e-4
}

fn default_warmup_ratio() -> f64 {
    0.05
}

fn default_eval_steps() -> usize {
    100
}

fn default_save_steps() -> usize {
    100
}

fn default_logging_steps() -> usize {
    10
}

fn default_optimizer() -> Optimizer {
    Optimizer::AdamW8bit
}

fn default_scheduler() -> LrScheduler {
    LrScheduler::Cosine
}

fn default_precision() -> Precision {
    Precision::Bf16
}

/// Python runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PythonConfig {
    /// Path to Python executable (`python3` if not set).
    #[serde(default)]
    pub python_path: Option<PathBuf>,
    /// Virtual environment whose interpreter should be used.
    #[serde(default)]
    pub venv_path: Option<PathBuf>,
}

impl TuneConfig {
    /// Reject settings no training run could use.
    pub fn validate(&self) -> Result<(), TuneError> {
        let mut issues = Vec::new();

        let test_size = self.dataset.test_size;
        if !(test_size > 0.0 && test_size < 1.0) {
            issues.push(format!("dataset.test_size must be in (0, 1), got {test_size}"));
        }
        if !(1..=100).contains(&self.hub.page_size) {
            issues.push(format!(
                "hub.page_size must be in 1..=100, got {}",
                self.hub.page_size
            ));
        }
        if self.model.max_seq_length == 0 {
            issues.push("model.max_seq_length must be positive".to_string());
        }
        if let QuantizationMethod::BitsAndBytes { bits } = self.model.quantization {
            if bits != 4 && bits != 8 {
                issues.push(format!("model.quantization.bits must be 4 or 8, got {bits}"));
            }
        }
        if self.lora.r == 0 {
            issues.push("lora.r must be positive".to_string());
        }
        if !(0.0..1.0).contains(&self.lora.dropout) {
            issues.push(format!(
                "lora.dropout must be in [0, 1), got {}",
                self.lora.dropout
            ));
        }
        if self.lora.target_modules.is_empty() {
            issues.push("lora.target_modules must not be empty".to_string());
        }

        let t = &self.training;
        for (name, value) in [
            ("training.train_batch_size", t.train_batch_size),
            ("training.eval_batch_size", t.eval_batch_size),
            ("training.grad_accum", t.grad_accum),
            ("training.eval_steps", t.eval_steps),
            ("training.save_steps", t.save_steps),
            ("training.logging_steps", t.logging_steps),
        ] {
            if value == 0 {
                issues.push(format!("{name} must be positive"));
            }
        }
        if !(t.epochs > 0.0) {
            issues.push(format!("training.epochs must be positive, got {}", t.epochs));
        }
        if !(t.learning_rate > 0.0) {
            issues.push(format!(
                "training.learning_rate must be positive, got {}",
                t.learning_rate
            ));
        }
        if !(0.0..1.0).contains(&t.warmup_ratio) {
            issues.push(format!(
                "training.warmup_ratio must be in [0, 1), got {}",
                t.warmup_ratio
            ));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(TuneError::config(issues.join("; ")))
        }
    }
}

/// Build the layered configuration figment.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `TOXITUNE_`)
/// 2. Explicit config file, else workspace `toxitune.toml`
/// 3. User config (`~/.config/toxitune/config.toml`)
/// 4. Built-in defaults
pub fn config_figment(workspace: Option<&Path>, config_file: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(TuneConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "toxitune", "toxitune") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    match (config_file, workspace) {
        (Some(file), _) => figment = figment.merge(Toml::file(file)),
        (None, Some(ws)) => {
            let ws_config = ws.join(WORKSPACE_CONFIG_FILE);
            if ws_config.exists() {
                figment = figment.merge(Toml::file(&ws_config));
            }
        }
        (None, None) => {}
    }

    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load configuration from layered sources.
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
) -> Result<TuneConfig, TuneError> {
    if let Some(file) = config_file {
        if !file.exists() {
            return Err(TuneError::config(format!(
                "config file not found: {}",
                file.display()
            )));
        }
    }
    config_figment(workspace, config_file)
        .extract()
        .map_err(|e| TuneError::Figment(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_run() {
        let config = TuneConfig::default();
        assert_eq!(config.dataset.name, "JAugusto97/told-br");
        assert_eq!(config.dataset.config, None);
        assert_eq!(config.model.name, "unsloth/Llama-3.2-1B-Instruct-bnb-4bit");
        assert_eq!(config.model.max_seq_length, 1024);
        assert_eq!(config.training.train_batch_size, 8);
        assert_eq!(config.training.grad_accum, 4);
        assert_eq!(config.training.epochs, 2.0);
        assert_eq!(config.training.learning_rate, 2e-4);
        assert_eq!(config.lora.r, 16);
        assert_eq!(config.lora.alpha, 16);
        assert_eq!(config.lora.target_modules.len(), 7);
        assert_eq!(config.seed, 42);
        assert_eq!(config.dataset.test_size, 0.1);
        assert_eq!(config.training.precision, Precision::Bf16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_value(Optimizer::AdamW8bit).unwrap(),
            "adamw_8bit"
        );
        assert_eq!(
            serde_json::to_value(LrScheduler::ConstantWithWarmup).unwrap(),
            "constant_with_warmup"
        );
        assert_eq!(
            serde_json::to_value(QuantizationMethod::default()).unwrap(),
            serde_json::json!({"type": "bits_and_bytes", "bits": 4})
        );
    }

    #[test]
    fn test_validate_collects_every_issue() {
        let mut config = TuneConfig::default();
        config.dataset.test_size = 1.5;
        config.training.grad_accum = 0;
        config.model.quantization = QuantizationMethod::BitsAndBytes { bits: 3 };
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("dataset.test_size"));
        assert!(msg.contains("training.grad_accum"));
        assert!(msg.contains("quantization.bits"));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = TuneConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: TuneConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.name, config.model.name);
        assert_eq!(parsed.training.optimizer, config.training.optimizer);
        assert_eq!(parsed.model.quantization, config.model.quantization);
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(WORKSPACE_CONFIG_FILE),
            r#"
seed = 7

[dataset]
name = "data/msgs.jsonl"
test_size = 0.2

[training]
epochs = 1.0
scheduler = "linear"
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.dataset.name, "data/msgs.jsonl");
        assert_eq!(config.dataset.test_size, 0.2);
        assert_eq!(config.training.epochs, 1.0);
        assert_eq!(config.training.scheduler, LrScheduler::Linear);
        // untouched sections keep defaults
        assert_eq!(config.lora.r, 16);
    }

    #[test]
    fn test_missing_explicit_config_file_fails() {
        let err = load_config(None, Some(Path::new("/nonexistent/toxitune.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                WORKSPACE_CONFIG_FILE,
                "[training]\nepochs = 1.0\n",
            )?;
            jail.set_env("TOXITUNE_TRAINING__EPOCHS", "3.0");
            jail.set_env("TOXITUNE_SEED", "11");

            let config: TuneConfig = config_figment(Some(jail.directory()), None).extract()?;
            assert_eq!(config.training.epochs, 3.0);
            assert_eq!(config.seed, 11);
            Ok(())
        });
    }
}
