//! # oscar-odin: catalogue resource mapping
//!
//! Maps catalogue products to API resources and back:
//!
//! - a [`PrefetchRegistry`] describing which relations a product query
//!   eager-loads, so mapping a page of products costs a fixed number of
//!   queries
//! - read mappings built from ordered field rules ([`ProductToResource`]
//!   and friends) with stock strategies supplying price and availability
//! - [`products_to_db`], a bulk write path with natural-key matching,
//!   related-row upserts and per-record error collection

pub mod config;
pub mod error;
pub mod logging;
pub mod mappings;
pub mod prefetching;
pub mod resources;
pub mod strategy;
pub mod utils;

// Re-export the public surface
pub use config::OdinConfig;
pub use error::{ConfigError, MappingError, OdinError, OdinResult, PrefetchError, ValidationError};
pub use logging::{init_logging, LoggingConfig};
pub use mappings::{
    product_queryset_to_resources, product_to_resource, product_to_resource_with_mapper,
    product_to_resource_with_selector, product_to_resource_with_strategy, products_to_db,
    products_to_db_with_mapper, BillingAddressToResource, Mapping, MappingContext,
    ModelMapping, ProductToModel, ProductToResource, ProductsToDbOptions, SaveReport,
    ShippingAddressToResource,
};
pub use prefetching::{
    default_prefetch_registry, prefetch_product_queryset, DefaultPrefetchRegistry,
    PrefetchDirective, PrefetchRegistry,
};
pub use resources::{ProductResource, Validate};
pub use strategy::{
    Availability, DefaultSelector, DefaultStrategy, Price, PurchaseInfo, StockStrategy,
    StrategyContext, StrategySelector,
};
pub use utils::{ErrorLog, QueryCounter, RecordError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
