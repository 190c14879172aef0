//! Eager-load planning for product queries

pub mod default_registry;
pub mod prefetch;
pub mod registry;

pub use default_registry::{builtin_transform, default_prefetch_registry, DefaultPrefetchRegistry};
pub use prefetch::prefetch_product_queryset;
pub use registry::{IntoPaths, PrefetchContext, PrefetchDirective, PrefetchRegistry, TransformFn};
