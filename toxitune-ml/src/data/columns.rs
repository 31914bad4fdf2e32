//! Column name resolution for heterogeneous dataset schemas.

use crate::error::TuneError;
use serde::{Deserialize, Serialize};

/// Candidate names for the message text column, highest priority first.
pub const TEXT_CANDIDATES: &[&str] = &["text", "texto", "tweet", "sentence", "comment", "content"];

/// Candidate names for the label column, highest priority first.
pub const LABEL_CANDIDATES: &[&str] = &["label", "toxic", "toxicity", "classe", "class", "target"];

/// Return the first candidate present in `columns`.
///
/// Exact matches win over case-insensitive ones; within each pass the
/// candidate order decides. A case-insensitive hit returns the column's
/// own spelling.
pub fn resolve_column(
    columns: &[String],
    candidates: &[&str],
    kind: &str,
) -> Result<String, TuneError> {
    if let Some(found) = candidates
        .iter()
        .find(|candidate| columns.iter().any(|c| c == *candidate))
    {
        return Ok((*found).to_string());
    }

    for candidate in candidates {
        // Last column wins on lowercase collisions ("Text" vs "TEXT").
        if let Some(column) = columns
            .iter()
            .rev()
            .find(|c| c.to_lowercase() == *candidate)
        {
            return Ok(column.clone());
        }
    }

    Err(TuneError::column(kind, columns))
}

/// The text and label columns chosen for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedColumns {
    pub text: String,
    pub label: String,
}

impl ResolvedColumns {
    /// Resolve both columns against one partition's field set.
    pub fn resolve(columns: &[String]) -> Result<Self, TuneError> {
        let text = resolve_column(columns, TEXT_CANDIDATES, "text")?;
        let label = resolve_column(columns, LABEL_CANDIDATES, "label")?;
        tracing::debug!(text = %text, label = %label, "Resolved dataset columns");
        Ok(Self { text, label })
    }
}
