//! Error types for the toxitune-ml crate.

use thiserror::Error;

/// Top-level error type for dataset shaping and training orchestration.
#[derive(Debug, Error)]
pub enum TuneError {
    /// No candidate column name matched the dataset's fields.
    #[error("Could not identify the {kind} column. Available columns: {available:?}")]
    ColumnResolution { kind: String, available: Vec<String> },

    /// The dataset shape matched none of the recognized partition layouts.
    #[error("Split error: {0}")]
    Split(String),

    #[error("Record has no field '{0}'")]
    MissingField(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Python runtime error: {0}")]
    Python(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),
}

impl TuneError {
    pub fn column(kind: impl Into<String>, available: &[String]) -> Self {
        Self::ColumnResolution {
            kind: kind.into(),
            available: available.to_vec(),
        }
    }

    pub fn split(msg: impl Into<String>) -> Self {
        Self::Split(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }
}
