use thiserror::Error;

/// Errors raised while converting between domain values and typed fields.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    /// A string did not name any variant of the enumeration
    #[error("Unknown {kind} value: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    /// A string could not be parsed as the requested numeric type
    #[error("Invalid {target} value: '{value}'")]
    InvalidNumber { value: String, target: &'static str },

    /// A value had the wrong shape for the field it was assigned to
    #[error("Field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: String,
    },

    /// A required field was absent from the row and has no default
    #[error("Missing field: {0}")]
    MissingField(String),
}

/// Result type for value conversions
pub type Result<T> = std::result::Result<T, ValueError>;
