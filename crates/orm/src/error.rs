//! Error types for the catalogue persistence layer
//!
//! Covers lookups, relation loading, bulk writes and model validation.

use std::fmt;

/// Result type alias for persistence operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for persistence operations
#[derive(Debug, Clone, PartialEq)]
pub enum OrmError {
    /// Row lookup failed
    NotFound(String),
    /// Model validation failed (`clean`)
    Validation(String),
    /// Primary key is missing on an instance that must already be stored
    MissingPrimaryKey(String),
    /// Unknown relation or relation that cannot be loaded
    Relationship(String),
    /// Serialization/deserialization error
    Serialization(String),
    /// Query building error (bad lookup, unsupported filter)
    Query(String),
    /// A file field has no file or a malformed name
    File(String),
    /// Attribute value could not be converted
    Attribute(String),
}

impl fmt::Display for OrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrmError::NotFound(msg) => write!(f, "Record not found: {}", msg),
            OrmError::Validation(msg) => write!(f, "Validation error: {}", msg),
            OrmError::MissingPrimaryKey(table) => {
                write!(f, "Primary key is missing for a row of '{}'", table)
            }
            OrmError::Relationship(msg) => write!(f, "Relationship error: {}", msg),
            OrmError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            OrmError::Query(msg) => write!(f, "Query error: {}", msg),
            OrmError::File(msg) => write!(f, "File error: {}", msg),
            OrmError::Attribute(msg) => write!(f, "Attribute error: {}", msg),
        }
    }
}

impl std::error::Error for OrmError {}

// Convert from serde_json errors
impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}

impl OrmError {
    /// Unknown relation on a model
    pub fn unknown_relation(model: &str, relation: &str) -> Self {
        OrmError::Relationship(format!(
            "Cannot find '{}' on {} object, '{}' is an invalid parameter to prefetch_related()",
            relation, model, relation
        ))
    }

    /// Whether this error is a soft failure of a file or attribute accessor
    pub fn is_accessor_error(&self) -> bool {
        matches!(self, OrmError::File(_) | OrmError::Attribute(_))
    }
}
