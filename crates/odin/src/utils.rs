//! Batching, validation and diagnostics helpers for the bulk write path

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use catalogue_orm::{Database, Stored};
use serde::Serialize;
use serde_json::Value;

use crate::error::OdinError;
use crate::resources::Validate;

/// Split `items` into chunks of at most `size` items. A size of zero is
/// treated as one.
pub fn chunked<T>(items: &[T], size: usize) -> impl Iterator<Item = &[T]> {
    items.chunks(size.max(1))
}

/// An error produced while processing one record, with the values that
/// identify that record
#[derive(Debug)]
pub struct RecordError {
    pub error: OdinError,
    pub identifier_values: Vec<String>,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.identifier_values.is_empty() {
            write!(f, "{}", self.error)
        } else {
            write!(f, "[{}] {}", self.identifier_values.join(", "), self.error)
        }
    }
}

/// Collected per-record errors
#[derive(Debug, Default)]
pub struct ErrorLog {
    identifiers: Option<Vec<String>>,
    errors: Vec<RecordError>,
}

impl ErrorLog {
    /// Error log attaching the values of `identifiers` to every error
    pub fn new<S: Into<String>>(identifiers: impl IntoIterator<Item = S>) -> Self {
        Self {
            identifiers: Some(identifiers.into_iter().map(Into::into).collect()),
            errors: Vec::new(),
        }
    }

    pub fn identifiers(&self) -> Option<&[String]> {
        self.identifiers.as_deref()
    }

    /// Record `error`, reading the identifier values from `record`
    pub fn add_error<R: Serialize>(&mut self, error: impl Into<OdinError>, record: &R) {
        let identifier_values = match &self.identifiers {
            Some(identifiers) => {
                let fields = serde_json::to_value(record).unwrap_or(Value::Null);
                identifiers
                    .iter()
                    .map(|identifier| match fields.get(identifier) {
                        None | Some(Value::Null) => String::new(),
                        Some(Value::String(text)) => text.clone(),
                        Some(other) => other.to_string(),
                    })
                    .collect()
            }
            None => Vec::new(),
        };
        self.errors.push(RecordError {
            error: error.into(),
            identifier_values,
        });
    }

    pub fn extend(&mut self, other: ErrorLog) {
        self.errors.extend(other.errors);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordError> {
        self.errors.iter()
    }

    pub fn into_inner(self) -> Vec<RecordError> {
        self.errors
    }
}

impl<'a> IntoIterator for &'a ErrorLog {
    type Item = &'a RecordError;
    type IntoIter = std::slice::Iter<'a, RecordError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// Split resources into the valid ones and an error log of the invalid ones
pub fn validate_resources<R, S>(resources: Vec<R>, identifiers: &[S]) -> (Vec<R>, ErrorLog)
where
    R: Validate + Serialize,
    S: AsRef<str>,
{
    let mut errors = ErrorLog::new(identifiers.iter().map(|identifier| identifier.as_ref().to_string()));
    let mut valid = Vec::with_capacity(resources.len());

    for resource in resources {
        match resource.full_clean() {
            Ok(()) => valid.push(resource),
            Err(error) => errors.add_error(error, &resource),
        }
    }

    if !errors.is_empty() {
        tracing::warn!(invalid = errors.len(), valid = valid.len(), "skipping invalid resources");
    }
    (valid, errors)
}

/// Identifier values of a row as strings, in `field_names` order
pub fn identifier_values<M: Stored>(instance: &M, field_names: &[&str]) -> Vec<String> {
    let fields = instance.to_fields();
    field_names
        .iter()
        .map(|name| match fields.get(*name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        })
        .collect()
}

/// Look up stored rows by natural key.
///
/// Returns identifier values -> primary key for every stored row matching
/// one of `instances` on all `field_names`. Lookups run in batches of
/// `batch_size` instances, one query per batch.
pub fn in_bulk<M: Stored>(
    db: &Database,
    instances: &[M],
    field_names: &[&str],
    batch_size: usize,
) -> HashMap<Vec<String>, i64> {
    let mut mapping = HashMap::new();
    if instances.is_empty() || field_names.is_empty() {
        return mapping;
    }

    for batch in chunked(instances, batch_size) {
        let wanted: Vec<Vec<String>> = batch
            .iter()
            .map(|instance| identifier_values(instance, field_names))
            .filter(|values| values.iter().any(|value| !value.is_empty()))
            .collect();
        if wanted.is_empty() {
            continue;
        }

        let rows = db.filter(|row: &M| wanted.contains(&identifier_values(row, field_names)));
        for row in rows {
            if let Some(pk) = row.primary_key() {
                mapping.insert(identifier_values(&row, field_names), pk);
            }
        }
    }
    mapping
}

/// Scoped query counter.
///
/// Counts the queries executed on `db` since the counter was started and
/// logs the count and elapsed time when dropped.
pub struct QueryCounter<'a> {
    db: &'a Database,
    label: String,
    start_count: usize,
    started: Instant,
}

impl<'a> QueryCounter<'a> {
    pub fn start(db: &'a Database, label: impl Into<String>) -> Self {
        Self {
            db,
            label: label.into(),
            start_count: db.query_count(),
            started: Instant::now(),
        }
    }

    /// Queries executed since the counter started
    pub fn count(&self) -> usize {
        self.db.query_count() - self.start_count
    }

    pub fn queries(&self) -> Vec<String> {
        self.db.queries().entries_since(self.start_count)
    }
}

impl Drop for QueryCounter<'_> {
    fn drop(&mut self) {
        tracing::debug!(
            label = %self.label,
            queries = self.count(),
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "query counter"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::resources::ProductResource;
    use catalogue_orm::{Partner, ProductStructure};

    #[test]
    fn test_chunked() {
        let items = [1, 2, 3, 4, 5, 6, 7];
        let chunks: Vec<&[i32]> = chunked(&items, 3).collect();
        assert_eq!(chunks, vec![&[1, 2, 3][..], &[4, 5, 6][..], &[7][..]]);

        assert_eq!(chunked(&items, 0).count(), 7);
        assert_eq!(chunked::<i32>(&[], 3).count(), 0);
    }

    #[test]
    fn test_validate_resources_collects_identifiers() {
        let valid = ProductResource {
            upc: Some("1".to_string()),
            title: "Mug".to_string(),
            ..Default::default()
        };
        let invalid = ProductResource {
            upc: Some("2".to_string()),
            structure: ProductStructure::Child,
            ..Default::default()
        };

        let (resources, errors) = validate_resources(vec![valid, invalid], &["upc"]);
        assert_eq!(resources.len(), 1);
        assert_eq!(errors.len(), 1);

        let error = errors.iter().next().unwrap();
        assert_eq!(error.identifier_values, vec!["2".to_string()]);
        assert!(matches!(error.error, OdinError::Validation(_)));
    }

    #[test]
    fn test_error_log_missing_identifier_is_blank() {
        let mut errors = ErrorLog::new(["upc", "missing"]);
        errors.add_error(
            ValidationError::new(),
            &ProductResource {
                upc: None,
                ..Default::default()
            },
        );
        let error = errors.iter().next().unwrap();
        assert_eq!(error.identifier_values, vec![String::new(), String::new()]);
    }

    #[test]
    fn test_in_bulk_batches_queries() {
        let db = Database::new();
        db.bulk_create(vec![
            Partner::new("a", "A"),
            Partner::new("b", "B"),
            Partner::new("c", "C"),
        ])
        .unwrap();

        let wanted = vec![
            Partner::new("a", ""),
            Partner::new("c", ""),
            Partner::new("z", ""),
        ];
        let counter = QueryCounter::start(&db, "in_bulk");
        let found = in_bulk(&db, &wanted, &["code"], 2);

        assert_eq!(counter.count(), 2);
        assert_eq!(found.len(), 2);
        assert_eq!(found[&vec!["a".to_string()]], 1);
        assert_eq!(found[&vec!["c".to_string()]], 3);
    }
}
