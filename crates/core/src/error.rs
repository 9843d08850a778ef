use thiserror::Error;

use crate::validation::ProfileField;

/// Failures surfaced by the matching pipeline
///
/// Corrupt persisted favorites never appear here; they are recovered locally.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Patient data extraction failed: {0}")]
    ExtractionFailure(String),

    #[error("Missing required patient information: {}", field_list(.missing))]
    ValidationIncomplete { missing: Vec<ProfileField> },

    #[error("Clinical trials search failed: {0}")]
    UpstreamSearchFailure(String),

    #[error("Custom search expression rejected by the registry: {0}")]
    MalformedCustomExpression(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

fn field_list(fields: &[ProfileField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
