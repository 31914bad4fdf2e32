//! Training plan handed to the external fine-tuning stack.
//!
//! The plan spells out every setting for model loading, adapter injection
//! and the SFT trainer. The driver script passes these through verbatim.

use crate::config::{GradientCheckpointing, Precision, QuantizationMethod, TuneConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model loading arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelLoadPlan {
    pub model_name: String,
    pub max_seq_length: usize,
    pub load_in_4bit: bool,
    pub load_in_8bit: bool,
    /// `None` lets the loader pick the compute dtype for the hardware.
    pub dtype: Option<String>,
}

/// Adapter injection arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterPlan {
    pub r: u32,
    pub lora_alpha: u32,
    pub lora_dropout: f64,
    pub target_modules: Vec<String>,
    pub bias: String,
    /// `"unsloth"`, `true` or `false`.
    pub use_gradient_checkpointing: serde_json::Value,
    pub random_state: u64,
}

/// SFT trainer arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SftPlan {
    pub output_dir: PathBuf,
    pub dataset_text_field: String,
    pub per_device_train_batch_size: usize,
    pub per_device_eval_batch_size: usize,
    pub gradient_accumulation_steps: usize,
    pub learning_rate: f64,
    pub num_train_epochs: f64,
    pub warmup_ratio: f64,
    pub eval_strategy: String,
    pub eval_steps: usize,
    pub save_strategy: String,
    pub save_steps: usize,
    pub logging_steps: usize,
    pub seed: u64,
    pub fp16: bool,
    pub bf16: bool,
    pub optim: String,
    pub lr_scheduler_type: String,
    pub report_to: String,
    pub max_seq_length: usize,
    pub packing: bool,
}

/// Formatted data files the trainer reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPlan {
    pub train_file: PathBuf,
    pub eval_file: PathBuf,
}

/// Complete training configuration, serialized to `training_config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPlan {
    pub model: ModelLoadPlan,
    pub lora: AdapterPlan,
    pub sft: SftPlan,
    pub data: DataPlan,
}

fn wire_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

impl TrainingPlan {
    pub fn build(config: &TuneConfig, train_file: &Path, eval_file: &Path) -> Self {
        let (load_in_4bit, load_in_8bit) = match config.model.quantization {
            QuantizationMethod::BitsAndBytes { bits: 4 } => (true, false),
            QuantizationMethod::BitsAndBytes { bits: 8 } => (false, true),
            QuantizationMethod::BitsAndBytes { .. } | QuantizationMethod::None => (false, false),
        };
        let use_gradient_checkpointing = match config.lora.gradient_checkpointing {
            GradientCheckpointing::Unsloth => serde_json::Value::from("unsloth"),
            GradientCheckpointing::Enabled => serde_json::Value::Bool(true),
            GradientCheckpointing::Disabled => serde_json::Value::Bool(false),
        };
        let t = &config.training;

        Self {
            model: ModelLoadPlan {
                model_name: config.model.name.clone(),
                max_seq_length: config.model.max_seq_length,
                load_in_4bit,
                load_in_8bit,
                dtype: None,
            },
            lora: AdapterPlan {
                r: config.lora.r,
                lora_alpha: config.lora.alpha,
                lora_dropout: config.lora.dropout,
                target_modules: config.lora.target_modules.clone(),
                bias: config.lora.bias.clone(),
                use_gradient_checkpointing,
                random_state: config.seed,
            },
            sft: SftPlan {
                output_dir: t.output_dir.clone(),
                dataset_text_field: "text".to_string(),
                per_device_train_batch_size: t.train_batch_size,
                per_device_eval_batch_size: t.eval_batch_size,
                gradient_accumulation_steps: t.grad_accum,
                learning_rate: t.learning_rate,
                num_train_epochs: t.epochs,
                warmup_ratio: t.warmup_ratio,
                eval_strategy: "steps".to_string(),
                eval_steps: t.eval_steps,
                save_strategy: "steps".to_string(),
                save_steps: t.save_steps,
                logging_steps: t.logging_steps,
                seed: config.seed,
                fp16: t.precision == Precision::Fp16,
                bf16: t.precision == Precision::Bf16,
                optim: wire_name(&t.optimizer),
                lr_scheduler_type: wire_name(&t.scheduler),
                report_to: "none".to_string(),
                max_seq_length: config.model.max_seq_length,
                packing: t.packing,
            },
            data: DataPlan {
                train_file: train_file.to_path_buf(),
                eval_file: eval_file.to_path_buf(),
            },
        }
    }

    /// Effective batch size per optimizer step on one device.
    pub fn effective_batch_size(&self) -> usize {
        self.sft.per_device_train_batch_size * self.sft.gradient_accumulation_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LrScheduler, Optimizer};

    fn plan(config: &TuneConfig) -> TrainingPlan {
        TrainingPlan::build(
            config,
            Path::new("out/.toxitune/train.jsonl"),
            Path::new("out/.toxitune/validation.jsonl"),
        )
    }

    #[test]
    fn test_default_plan_enumerates_everything() {
        let p = plan(&TuneConfig::default());
        assert!(p.model.load_in_4bit);
        assert!(!p.model.load_in_8bit);
        assert_eq!(p.lora.use_gradient_checkpointing, "unsloth");
        assert_eq!(p.lora.random_state, 42);
        assert_eq!(p.lora.target_modules.len(), 7);
        assert_eq!(p.sft.optim, "adamw_8bit");
        assert_eq!(p.sft.lr_scheduler_type, "cosine");
        assert!(p.sft.bf16 && !p.sft.fp16);
        assert_eq!(p.sft.eval_steps, 100);
        assert_eq!(p.sft.save_steps, 100);
        assert_eq!(p.sft.logging_steps, 10);
        assert_eq!(p.sft.report_to, "none");
        assert!(!p.sft.packing);
        assert_eq!(p.effective_batch_size(), 32);
    }

    #[test]
    fn test_overrides_flow_through() {
        let mut config = TuneConfig::default();
        config.model.quantization = QuantizationMethod::BitsAndBytes { bits: 8 };
        config.lora.gradient_checkpointing = GradientCheckpointing::Disabled;
        config.training.optimizer = Optimizer::AdamWTorch;
        config.training.scheduler = LrScheduler::Linear;
        config.training.precision = Precision::Fp16;
        config.seed = 3;

        let p = plan(&config);
        assert!(p.model.load_in_8bit && !p.model.load_in_4bit);
        assert_eq!(p.lora.use_gradient_checkpointing, false);
        assert_eq!(p.sft.optim, "adamw_torch");
        assert_eq!(p.sft.lr_scheduler_type, "linear");
        assert!(p.sft.fp16 && !p.sft.bf16);
        assert_eq!(p.sft.seed, 3);
    }

    #[test]
    fn test_plan_json_shape() {
        let value = serde_json::to_value(plan(&TuneConfig::default())).unwrap();
        for section in ["model", "lora", "sft", "data"] {
            assert!(value.get(section).is_some(), "missing {section}");
        }
        assert_eq!(value["sft"]["dataset_text_field"], "text");
        assert_eq!(value["model"]["dtype"], serde_json::Value::Null);
    }
}
