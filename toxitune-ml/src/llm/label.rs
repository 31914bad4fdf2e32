//! Canonical toxicity labels and normalization of source encodings.

use crate::data::FieldValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Free-text values that mark a message as toxic (compared trimmed and lowercased).
pub const TOXIC_ALIASES: &[&str] = &["1", "toxic", "toxica", "tóxica", "hate", "abusive"];

/// The two output classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "TOXICA")]
    Toxic,
    #[serde(rename = "NAO_TOXICA")]
    NonToxic,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Toxic => "TOXICA",
            Self::NonToxic => "NAO_TOXICA",
        }
    }

    /// Map any field value onto a label. Never fails; unknown values are non-toxic.
    pub fn normalize(value: &FieldValue) -> Self {
        match value {
            FieldValue::Bool(true) => Self::Toxic,
            FieldValue::Bool(false) => Self::NonToxic,
            FieldValue::Int(1) => Self::Toxic,
            FieldValue::Int(_) => Self::NonToxic,
            FieldValue::Text(s) => Self::from_text(s),
            other => Self::from_text(&other.to_string()),
        }
    }

    fn from_text(raw: &str) -> Self {
        let value = raw.trim().to_lowercase();
        if TOXIC_ALIASES.contains(&value.as_str()) {
            Self::Toxic
        } else {
            Self::NonToxic
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
