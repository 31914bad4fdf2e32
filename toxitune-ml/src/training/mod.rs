//! Training infrastructure: trainer backends, metrics and run manifests.

pub mod manifest;
pub mod metrics;
pub mod trainer;

pub use manifest::{MANIFEST_FILE, RunManifest, TrainingStatus};
pub use metrics::TrainingMetrics;
pub use trainer::{PythonSftTrainer, Trainer, TrainingJob};
