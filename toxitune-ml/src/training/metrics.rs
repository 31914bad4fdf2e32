//! Training metrics reported by the trainer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary of a finished training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    #[serde(default)]
    pub global_step: u64,
    #[serde(default)]
    pub epochs_completed: f64,
    #[serde(default)]
    pub train_loss: Option<f64>,
    #[serde(default)]
    pub eval_loss: Option<f64>,
    #[serde(default)]
    pub train_runtime_secs: Option<f64>,
    /// (step, loss) pairs from the trainer's log history.
    #[serde(default)]
    pub loss_history: Vec<(u64, f64)>,
    #[serde(default)]
    pub eval_loss_history: Vec<(u64, f64)>,
    #[serde(default)]
    pub custom_metrics: BTreeMap<String, f64>,
}

impl TrainingMetrics {
    /// Parse the driver's final stdout line.
    ///
    /// The trainer prints progress freely, so only the last non-empty line is
    /// taken as the JSON summary.
    pub fn from_driver_output(stdout: &str) -> Option<Self> {
        let last = stdout.lines().rev().find(|l| !l.trim().is_empty())?;
        serde_json::from_str(last.trim()).ok()
    }

    /// Lowest evaluation loss seen, with its step.
    pub fn best_eval(&self) -> Option<(u64, f64)> {
        self.eval_loss_history
            .iter()
            .copied()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }
}
