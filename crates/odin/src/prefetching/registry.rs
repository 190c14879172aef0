//! Registry of eager-load directives for product queries
//!
//! The registry only describes how to augment a query. Directives are
//! applied by [`PrefetchRegistry::apply`], in registration order.

use std::fmt;
use std::sync::Arc;

use catalogue_orm::{Prefetch, ProductQuery};
use serde_json::Value;

use crate::error::PrefetchError;
use crate::prefetching::default_registry::builtin_transform;

/// Context handed to transform directives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchContext {
    pub include_children: bool,
}

pub type TransformFn = Arc<dyn Fn(ProductQuery, &PrefetchContext) -> ProductQuery + Send + Sync>;

/// A prefetch directive
#[derive(Clone)]
pub enum PrefetchDirective {
    /// A relation path such as `parent__images`
    Path(String),
    /// A prebuilt prefetch descriptor
    Descriptor(Prefetch),
    /// A named function transforming the whole query
    Transform { name: String, function: TransformFn },
}

impl PrefetchDirective {
    pub fn path(path: impl Into<String>) -> Self {
        PrefetchDirective::Path(path.into())
    }

    pub fn descriptor(prefetch: Prefetch) -> Self {
        PrefetchDirective::Descriptor(prefetch)
    }

    pub fn transform<F>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(ProductQuery, &PrefetchContext) -> ProductQuery + Send + Sync + 'static,
    {
        PrefetchDirective::Transform {
            name: name.into(),
            function: Arc::new(function),
        }
    }

    /// Build a directive from dynamic configuration.
    ///
    /// A string is a path, an object with a `lookup` is a descriptor and an
    /// object with a `transform` names one of the built-in transforms.
    pub fn from_spec(spec: &Value) -> Result<Self, PrefetchError> {
        match spec {
            Value::String(path) => Ok(PrefetchDirective::Path(path.clone())),
            Value::Object(map) => {
                if let Some(name) = map.get("transform") {
                    let name = name.as_str().ok_or_else(|| PrefetchError::InvalidDescriptor {
                        message: "'transform' must be a string".to_string(),
                    })?;
                    return builtin_transform(name).ok_or_else(|| PrefetchError::UnknownTransform {
                        name: name.to_string(),
                    });
                }

                let lookup = map
                    .get("lookup")
                    .and_then(Value::as_str)
                    .ok_or_else(|| PrefetchError::InvalidDescriptor {
                        message: format!("expected a 'lookup' or 'transform' key in {}", spec),
                    })?;
                let mut prefetch = Prefetch::new(lookup);
                match map.get("to_attr") {
                    None | Some(Value::Null) => {}
                    Some(Value::String(attr)) => prefetch = prefetch.to_attr(attr.as_str()),
                    Some(other) => {
                        return Err(PrefetchError::InvalidDescriptor {
                            message: format!("'to_attr' must be a string, got {}", other),
                        })
                    }
                }
                Ok(PrefetchDirective::Descriptor(prefetch))
            }
            other => Err(PrefetchError::InvalidDirectiveKind {
                kind: value_kind(other).to_string(),
            }),
        }
    }

    /// Registry key: the path, the descriptor's lookup or the transform name
    pub fn key(&self) -> &str {
        match self {
            PrefetchDirective::Path(path) => path,
            PrefetchDirective::Descriptor(prefetch) => &prefetch.lookup,
            PrefetchDirective::Transform { name, .. } => name,
        }
    }

    /// Add this directive to `query`
    pub fn apply(&self, query: ProductQuery, context: &PrefetchContext) -> ProductQuery {
        match self {
            PrefetchDirective::Path(path) => query.prefetch_related(path.as_str()),
            PrefetchDirective::Descriptor(prefetch) => query.prefetch_related(prefetch.clone()),
            PrefetchDirective::Transform { function, .. } => function(query, context),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl fmt::Debug for PrefetchDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefetchDirective::Path(path) => f.debug_tuple("Path").field(path).finish(),
            PrefetchDirective::Descriptor(prefetch) => {
                f.debug_tuple("Descriptor").field(prefetch).finish()
            }
            PrefetchDirective::Transform { name, .. } => {
                f.debug_struct("Transform").field("name", name).finish_non_exhaustive()
            }
        }
    }
}

impl PartialEq for PrefetchDirective {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PrefetchDirective::Path(a), PrefetchDirective::Path(b)) => a == b,
            (PrefetchDirective::Descriptor(a), PrefetchDirective::Descriptor(b)) => a == b,
            (
                PrefetchDirective::Transform { name: a, function: f },
                PrefetchDirective::Transform { name: b, function: g },
            ) => a == b && Arc::ptr_eq(f, g),
            _ => false,
        }
    }
}

impl From<&str> for PrefetchDirective {
    fn from(path: &str) -> Self {
        PrefetchDirective::Path(path.to_string())
    }
}

impl From<String> for PrefetchDirective {
    fn from(path: String) -> Self {
        PrefetchDirective::Path(path)
    }
}

impl From<Prefetch> for PrefetchDirective {
    fn from(prefetch: Prefetch) -> Self {
        PrefetchDirective::Descriptor(prefetch)
    }
}

/// One or many select-related paths
pub trait IntoPaths {
    fn into_paths(self) -> Vec<String>;
}

impl IntoPaths for &str {
    fn into_paths(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoPaths for String {
    fn into_paths(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoPaths for &[&str] {
    fn into_paths(self) -> Vec<String> {
        self.iter().map(|path| path.to_string()).collect()
    }
}

impl<const N: usize> IntoPaths for [&str; N] {
    fn into_paths(self) -> Vec<String> {
        self.iter().map(|path| path.to_string()).collect()
    }
}

impl IntoPaths for Vec<&str> {
    fn into_paths(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoPaths for Vec<String> {
    fn into_paths(self) -> Vec<String> {
        self
    }
}

/// Ordered key -> directive map. Overwriting a key keeps its position.
#[derive(Debug, Clone, Default, PartialEq)]
struct DirectiveMap {
    entries: Vec<(String, PrefetchDirective)>,
}

impl DirectiveMap {
    fn insert(&mut self, directive: PrefetchDirective) {
        let key = directive.key().to_string();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = directive,
            None => self.entries.push((key, directive)),
        }
    }

    fn remove(&mut self, key: &str) -> Option<PrefetchDirective> {
        let index = self.entries.iter().position(|(existing, _)| existing == key)?;
        Some(self.entries.remove(index).1)
    }

    fn get(&self, key: &str) -> Option<&PrefetchDirective> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, directive)| directive)
    }

    fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(key, _)| key.as_str()).collect()
    }

    fn values(&self) -> Vec<&PrefetchDirective> {
        self.entries.iter().map(|(_, directive)| directive).collect()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Select-related paths, prefetch directives and children prefetch
/// directives for product queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrefetchRegistry {
    select_related: Vec<String>,
    prefetches: DirectiveMap,
    children_prefetches: DirectiveMap,
}

impl PrefetchRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_select_related(&mut self, paths: impl IntoPaths) {
        for path in paths.into_paths() {
            if !self.select_related.contains(&path) {
                self.select_related.push(path);
            }
        }
    }

    pub fn unregister_select_related(&mut self, path: &str) {
        self.select_related.retain(|existing| existing != path);
    }

    /// Register a prefetch directive, replacing any directive with the
    /// same key
    pub fn register_prefetch(&mut self, directive: impl Into<PrefetchDirective>) {
        self.prefetches.insert(directive.into());
    }

    /// Remove a prefetch directive. Unknown keys are ignored.
    pub fn unregister_prefetch(&mut self, key: &str) {
        if self.prefetches.remove(key).is_none() {
            tracing::debug!(key, "no prefetch registered under key");
        }
    }

    /// Register a directive applied only when children are included
    pub fn register_children_prefetch(&mut self, directive: impl Into<PrefetchDirective>) {
        self.children_prefetches.insert(directive.into());
    }

    pub fn unregister_children_prefetch(&mut self, key: &str) {
        if self.children_prefetches.remove(key).is_none() {
            tracing::debug!(key, "no children prefetch registered under key");
        }
    }

    /// Register a prefetch from dynamic configuration
    pub fn register_prefetch_spec(&mut self, spec: &Value) -> Result<(), PrefetchError> {
        self.prefetches.insert(PrefetchDirective::from_spec(spec)?);
        Ok(())
    }

    pub fn register_children_prefetch_spec(&mut self, spec: &Value) -> Result<(), PrefetchError> {
        self.children_prefetches
            .insert(PrefetchDirective::from_spec(spec)?);
        Ok(())
    }

    pub fn get_select_related(&self) -> &[String] {
        &self.select_related
    }

    pub fn get_prefetches(&self) -> Vec<&PrefetchDirective> {
        self.prefetches.values()
    }

    pub fn get_children_prefetches(&self) -> Vec<&PrefetchDirective> {
        self.children_prefetches.values()
    }

    pub fn get_prefetch(&self, key: &str) -> Option<&PrefetchDirective> {
        self.prefetches.get(key)
    }

    pub fn prefetch_keys(&self) -> Vec<&str> {
        self.prefetches.keys()
    }

    pub fn children_prefetch_keys(&self) -> Vec<&str> {
        self.children_prefetches.keys()
    }

    pub fn contains_prefetch(&self, key: &str) -> bool {
        self.prefetches.get(key).is_some()
    }

    pub fn contains_children_prefetch(&self, key: &str) -> bool {
        self.children_prefetches.get(key).is_some()
    }

    /// Key a directive is registered under
    pub fn get_key(directive: &PrefetchDirective) -> String {
        directive.key().to_string()
    }

    /// Key a dynamic directive spec would be registered under
    pub fn get_spec_key(spec: &Value) -> Result<String, PrefetchError> {
        match spec {
            Value::String(path) => Ok(path.clone()),
            Value::Object(map) => map
                .get("transform")
                .or_else(|| map.get("lookup"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| PrefetchError::InvalidDescriptor {
                    message: format!("expected a 'lookup' or 'transform' key in {}", spec),
                }),
            other => Err(PrefetchError::InvalidDirectiveKind {
                kind: value_kind(other).to_string(),
            }),
        }
    }

    pub fn clear(&mut self) {
        self.select_related.clear();
        self.prefetches.clear();
        self.children_prefetches.clear();
    }

    /// Add the registered directives to `query`. Children prefetches are
    /// only added when `include_children` is set.
    pub fn apply(&self, query: ProductQuery, include_children: bool) -> ProductQuery {
        let context = PrefetchContext { include_children };

        let mut query = self
            .select_related
            .iter()
            .fold(query, |query, path| query.select_related(path.as_str()));

        for directive in self.prefetches.values() {
            query = directive.apply(query, &context);
        }
        if include_children {
            for directive in self.children_prefetches.values() {
                query = directive.apply(query, &context);
            }
        }

        tracing::debug!(
            select_related = ?query.select_related_paths(),
            prefetches = query.prefetches().len(),
            include_children,
            "applied prefetch registry"
        );
        query
    }
}
