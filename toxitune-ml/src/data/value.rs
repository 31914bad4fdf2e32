//! In-memory dataset model: field values, records, partitions.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A single scalar cell, tagged by its source type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl FieldValue {
    /// Convert a JSON cell. Arrays and objects are kept as their compact JSON text.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::Text(s),
            other => Self::Text(other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            // Integral floats keep a trailing `.0` so 1.0 never reads as "1".
            Self::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Self::Float(x) if x.is_nan() => f.write_str("nan"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Null => f.write_str("None"),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One labeled message: field name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: HashMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from a JSON object. Non-object values land in a `value` field.
    pub fn from_json(value: serde_json::Value) -> Self {
        let fields = match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, FieldValue::from_json(v)))
                .collect(),
            other => HashMap::from([("value".to_string(), FieldValue::from_json(other))]),
        };
        Self { fields }
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// An ordered sequence of records sharing one field set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Partition {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self { columns, records }
    }

    /// Build a partition from JSON objects, taking the column order of the
    /// first object and appending columns first seen in later ones.
    pub fn from_json_rows(rows: Vec<serde_json::Value>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            match row {
                serde_json::Value::Object(map) => {
                    for key in map.keys() {
                        if !columns.iter().any(|c| c == key) {
                            columns.push(key.clone());
                        }
                    }
                }
                _ => {
                    if !columns.iter().any(|c| c == "value") {
                        columns.push("value".to_string());
                    }
                }
            }
        }
        let records = rows.into_iter().map(Record::from_json).collect();
        Self { columns, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A loaded dataset: either named partitions or one unpartitioned collection.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDataset {
    Partitioned(BTreeMap<String, Partition>),
    Single(Partition),
}

impl RawDataset {
    /// Names of the partitions present (empty for a single collection).
    pub fn partition_names(&self) -> Vec<&str> {
        match self {
            Self::Partitioned(parts) => parts.keys().map(String::as_str).collect(),
            Self::Single(_) => Vec::new(),
        }
    }

    pub fn total_records(&self) -> usize {
        match self {
            Self::Partitioned(parts) => parts.values().map(Partition::len).sum(),
            Self::Single(part) => part.len(),
        }
    }
}
