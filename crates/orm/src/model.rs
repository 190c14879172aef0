//! Core Model Trait - Base definition for stored catalogue entities
//!
//! Defines the `Model` trait with table metadata, primary key handling and
//! the field-map contract used for natural-key lookups and partial updates,
//! plus the `Related` cache slot that holds eagerly loaded relations.

use std::collections::HashMap;
use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{OrmError, OrmResult};

/// Core trait for stored entities
pub trait Model: Clone + Debug + Send + Sync + Serialize + DeserializeOwned {
    /// Table name for this model
    fn table_name() -> &'static str;

    /// Get the primary key value for this model instance
    fn primary_key(&self) -> Option<i64>;

    /// Set the primary key value for this model instance
    fn set_primary_key(&mut self, key: i64);

    /// Drop any relation caches so the instance can be stored as a plain row
    fn reset_relations(&mut self) {}

    /// Model-level validation run before saving
    fn clean(&self) -> OrmResult<()> {
        Ok(())
    }

    /// Field name -> value map of the stored columns
    fn to_fields(&self) -> HashMap<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.into_iter().collect(),
            _ => HashMap::new(),
        }
    }

    /// Value of a single stored column
    fn field_value(&self, name: &str) -> Option<Value> {
        self.to_fields().remove(name)
    }

    /// Copy the named columns from `other` onto `self`
    fn update_fields(&mut self, other: &Self, fields: &[&str]) -> OrmResult<()> {
        let mut current = serde_json::to_value(&*self)?;
        let incoming = serde_json::to_value(other)?;

        let current_map = current
            .as_object_mut()
            .ok_or_else(|| OrmError::Serialization(format!("{} is not a row", Self::table_name())))?;

        for field in fields {
            match incoming.get(*field) {
                Some(value) => {
                    current_map.insert((*field).to_string(), value.clone());
                }
                None => {
                    return Err(OrmError::Query(format!(
                        "{} has no field named '{}'",
                        Self::table_name(),
                        field
                    )))
                }
            }
        }

        let mut updated: Self = serde_json::from_value(current)?;
        if let Some(pk) = self.primary_key() {
            updated.set_primary_key(pk);
        }
        *self = updated;
        Ok(())
    }
}

/// Cache slot for a relation: either deferred (will be loaded lazily) or
/// already loaded by a join or a prefetch
#[derive(Debug, Clone, PartialEq)]
pub enum Related<T> {
    Deferred,
    Loaded(T),
}

impl<T> Default for Related<T> {
    fn default() -> Self {
        Related::Deferred
    }
}

impl<T> Related<T> {
    /// Whether the relation has been loaded
    pub fn is_loaded(&self) -> bool {
        matches!(self, Related::Loaded(_))
    }

    /// Borrow the loaded value
    pub fn get(&self) -> Option<&T> {
        match self {
            Related::Loaded(value) => Some(value),
            Related::Deferred => None,
        }
    }

    /// Mutably borrow the loaded value
    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Related::Loaded(value) => Some(value),
            Related::Deferred => None,
        }
    }

    /// Store a loaded value
    pub fn set(&mut self, value: T) {
        *self = Related::Loaded(value);
    }
}
