//! Prompt construction and fine-tuning plan for the toxicity classifier.

pub mod finetune;
pub mod label;
pub mod prompt;

pub use finetune::TrainingPlan;
pub use label::{Label, TOXIC_ALIASES};
pub use prompt::{FormattedExample, INSTRUCTION_HEADER, format_example, format_partition, render_prompt};
