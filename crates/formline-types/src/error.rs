//! Validation errors for public inputs.

/// Malformed input to a public operation, rejected before any write.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid {field}: '{value}'")]
pub struct ValidationError {
    /// Which field failed to parse.
    pub field: &'static str,
    /// The offending value.
    pub value: String,
}

impl ValidationError {
    /// Create a validation error for a field/value pair.
    pub fn new(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}
