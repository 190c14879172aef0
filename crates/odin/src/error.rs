use std::collections::BTreeMap;
use std::fmt;

use catalogue_orm::OrmError;
use thiserror::Error;

/// Result alias for the top-level operations
pub type OdinResult<T> = Result<T, OdinError>;

/// Result alias for field translation
pub type MappingResult<T> = Result<T, MappingError>;

#[derive(Debug, Error)]
pub enum OdinError {
    #[error("Database error: {0}")]
    Orm(#[from] OrmError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Prefetch(#[from] PrefetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Bulk save of {model} failed: {source}")]
    BulkSave {
        model: &'static str,
        #[source]
        source: OrmError,
    },
}

/// Registry configuration errors, raised at registration time
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PrefetchError {
    #[error("Invalid directive kind: a {kind} cannot be registered as a prefetch directive")]
    InvalidDirectiveKind { kind: String },

    #[error("Unknown prefetch transform '{name}'")]
    UnknownTransform { name: String },

    #[error("Invalid prefetch descriptor: {message}")]
    InvalidDescriptor { message: String },
}

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("{mapping}: failed to map field '{field}' of {entity}: {source}")]
    Field {
        mapping: &'static str,
        field: String,
        entity: String,
        #[source]
        source: Box<MappingError>,
    },

    #[error(transparent)]
    Orm(#[from] OrmError),

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl MappingError {
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        MappingError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the failing output field, for field errors
    pub fn field(&self) -> Option<&str> {
        match self {
            MappingError::Field { field, .. } => Some(field),
            MappingError::InvalidValue { field, .. } => Some(field),
            MappingError::Orm(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Field level validation failures of one resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub error_messages: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.error_messages
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.error_messages.is_empty()
    }

    /// Ok when nothing was recorded
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .error_messages
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join("; ")))
            .collect();
        write!(f, "{}", messages.join(", "))
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_names_field_and_entity() {
        let err = MappingError::Field {
            mapping: "ProductToResource",
            field: "attributes".to_string(),
            entity: "Product(upc=1234)".to_string(),
            source: Box::new(MappingError::invalid_value("colour", "no option")),
        };
        let message = err.to_string();
        assert!(message.contains("attributes"));
        assert!(message.contains("Product(upc=1234)"));
        assert_eq!(err.field(), Some("attributes"));
    }

    #[test]
    fn test_validation_error_display() {
        let mut err = ValidationError::new();
        assert!(err.clone().into_result().is_ok());
        err.add("title", "This field cannot be blank.");
        err.add("parent", "A child product needs a parent.");
        assert_eq!(
            err.to_string(),
            "parent: A child product needs a parent., title: This field cannot be blank."
        );
        assert!(err.into_result().is_err());
    }
}
