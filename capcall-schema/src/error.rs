//! Error types for schema construction and input validation.

use thiserror::Error;

/// Result alias for schema construction.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result alias for input validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Raised when caller input does not satisfy a tool's parameter schema.
///
/// Every variant carries the dotted path of the offending field, e.g.
/// `filters.kind` or `ids[2]`. The root of the input is reported as `$`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was absent or `null`.
    #[error("missing required field `{path}`")]
    MissingField {
        /// Path of the missing field.
        path: String,
    },

    /// A field was present but could not be read as its declared type.
    #[error("field `{path}` expected {expected}, found {found}")]
    TypeMismatch {
        /// Path of the mismatched field.
        path: String,
        /// Declared semantic type.
        expected: String,
        /// JSON type actually supplied.
        found: &'static str,
    },

    /// An enumerated field held a value outside its allowed set.
    #[error("field `{path}` has value `{value}`, expected one of [{}]", allowed.join(", "))]
    InvalidEnumValue {
        /// Path of the enumerated field.
        path: String,
        /// Supplied value.
        value: String,
        /// Values the schema accepts.
        allowed: Vec<String>,
    },

    /// Input contained a field the schema does not declare (strict mode only).
    #[error("unknown field `{path}`")]
    UnknownField {
        /// Path of the unexpected field.
        path: String,
    },
}

impl ValidationError {
    /// Returns the path of the field that failed validation.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::MissingField { path }
            | Self::TypeMismatch { path, .. }
            | Self::InvalidEnumValue { path, .. }
            | Self::UnknownField { path } => path,
        }
    }
}

/// Raised when a schema definition is internally inconsistent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A field was declared with an empty name.
    #[error("field name cannot be empty")]
    EmptyFieldName,

    /// Two fields share a name within the same object.
    #[error("field `{name}` is declared more than once")]
    DuplicateField {
        /// Name of the repeated field.
        name: String,
    },

    /// An enumerated field allows no values.
    #[error("enum field `{field}` must allow at least one value")]
    EmptyEnum {
        /// Name of the offending field.
        field: String,
    },

    /// A list was declared over a non-scalar item type.
    #[error("list field `{field}` must hold scalar or enum items")]
    InvalidListItem {
        /// Name of the offending field.
        field: String,
    },

    /// A default value does not satisfy its own field type.
    #[error("default for field `{field}` is invalid: {source}")]
    InvalidDefault {
        /// Name of the offending field.
        field: String,
        /// Validation failure produced by the default value.
        #[source]
        source: ValidationError,
    },
}
