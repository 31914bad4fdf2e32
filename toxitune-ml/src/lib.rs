//! # toxitune-ml: toxic message classifier fine-tuning
//!
//! Turns a labeled dataset with arbitrary column names and label encodings
//! into instruction/response prompts, then drives LoRA fine-tuning of a
//! quantized causal language model through an external training stack.
//!
//! - [`data`] loads datasets, resolves text/label columns and splits.
//! - [`llm`] normalizes labels, renders prompts and builds the training plan.
//! - [`training`] runs a [`training::Trainer`] and records the run.
//! - [`pipeline`] sequences all of it.

pub mod config;
pub mod data;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod runtime;
pub mod training;

pub use config::{TuneConfig, load_config};
pub use error::TuneError;
pub use llm::Label;
pub use pipeline::{PipelineOptions, PreparedData};
pub use runtime::PythonRuntime;
