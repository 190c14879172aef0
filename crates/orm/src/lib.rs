//! # catalogue-orm: Catalogue persistence layer
//!
//! In-memory storage for catalogue products, categories, images, stock
//! records and attribute values, with the relation loading primitives the
//! mapping layer builds on:
//!
//! - select-related joins for cardinality-1 relations
//! - prefetch lookups (plain paths, `Prefetch` descriptors with nested
//!   queries and `to_attr` targets) loading each relation level with one
//!   statement
//! - lazy relation fallback with N+1 tracking
//! - bulk create/update/delete and a per-statement query log

pub mod database;
pub mod error;
pub mod files;
pub mod loading;
pub mod model;
pub mod models;
pub mod query;

// Re-export core traits and types
pub use database::*;
pub use error::*;
pub use files::*;
pub use loading::*;
pub use model::*;
pub use models::*;
pub use query::*;
