//! Instruction/response prompt rendering.

use crate::data::{Partition, Record, ResolvedColumns};
use crate::error::TuneError;
use crate::llm::label::Label;
use serde::{Deserialize, Serialize};

/// Header shared by every rendered example.
pub const INSTRUCTION_HEADER: &str =
    "### Instrução:\nClassifique a mensagem abaixo como TOXICA ou NAO_TOXICA.";

/// One training example: only the rendered prompt survives formatting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedExample {
    pub text: String,
}

/// Render the prompt for a message and its label.
pub fn render_prompt(message: &str, label: Label) -> String {
    format!("{INSTRUCTION_HEADER}\n\n### Mensagem:\n{message}\n\n### Resposta:\n{label}")
}

/// Format one record using the resolved columns.
pub fn format_example(
    record: &Record,
    columns: &ResolvedColumns,
) -> Result<FormattedExample, TuneError> {
    let text = record
        .get(&columns.text)
        .ok_or_else(|| TuneError::MissingField(columns.text.clone()))?;
    let label = record
        .get(&columns.label)
        .ok_or_else(|| TuneError::MissingField(columns.label.clone()))?;

    Ok(FormattedExample {
        text: render_prompt(text.to_string().trim(), Label::normalize(label)),
    })
}

/// Format every record of a partition, dropping all original fields.
pub fn format_partition(
    partition: &Partition,
    columns: &ResolvedColumns,
) -> Result<Vec<FormattedExample>, TuneError> {
    partition
        .records
        .iter()
        .map(|record| format_example(record, columns))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FieldValue;
    use pretty_assertions::assert_eq;

    fn columns() -> ResolvedColumns {
        ResolvedColumns {
            text: "texto".into(),
            label: "label".into(),
        }
    }

    #[test]
    fn test_render_layout() {
        let expected = "### Instrução:\n\
                        Classifique a mensagem abaixo como TOXICA ou NAO_TOXICA.\n\
                        \n\
                        ### Mensagem:\n\
                        oi\n\
                        \n\
                        ### Resposta:\n\
                        NAO_TOXICA";
        assert_eq!(render_prompt("oi", Label::NonToxic), expected);
    }

    #[test]
    fn test_format_example_fills_both_slots() {
        let record = Record::new()
            .with("texto", "  você é horrível \n")
            .with("label", 1i64);
        let example = format_example(&record, &columns()).unwrap();
        assert!(example.text.starts_with(INSTRUCTION_HEADER));
        assert!(example.text.contains("### Mensagem:\nvocê é horrível\n"));
        assert!(example.text.ends_with("### Resposta:\nTOXICA"));
    }

    #[test]
    fn test_format_example_stringifies_non_text() {
        let record = Record::new().with("texto", 42i64).with("label", false);
        let example = format_example(&record, &columns()).unwrap();
        assert!(example.text.contains("### Mensagem:\n42\n"));
        assert!(example.text.ends_with("NAO_TOXICA"));

        let record = Record::new().with("texto", true).with("label", "hate");
        let example = format_example(&record, &columns()).unwrap();
        assert!(example.text.contains("### Mensagem:\nTrue\n"));
        assert!(example.text.ends_with("\nTOXICA"));

        let record = Record::new()
            .with("texto", FieldValue::Null)
            .with("label", FieldValue::Null);
        let example = format_example(&record, &columns()).unwrap();
        assert!(example.text.contains("### Mensagem:\nNone\n"));
        assert!(example.text.ends_with("\nNAO_TOXICA"));
    }

    #[test]
    fn test_missing_column_propagates() {
        let record = Record::new().with("texto", "oi");
        let err = format_example(&record, &columns()).unwrap_err();
        assert!(matches!(err, TuneError::MissingField(ref f) if f == "label"));
    }

    #[test]
    fn test_example_serializes_as_single_field() {
        let example = FormattedExample { text: "x".into() };
        assert_eq!(serde_json::to_string(&example).unwrap(), r#"{"text":"x"}"#);
    }
}
