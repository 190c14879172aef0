//! Model <-> resource mappings and the bulk write path

pub mod address;
pub mod catalogue;
pub mod common;
pub mod constants;
pub mod context;
pub mod model_mapper;
pub mod resources_to_db;

pub use address::{BillingAddressToResource, CountryToResource, ShippingAddressToResource};
pub use catalogue::{
    attribute_value_to_native, product_queryset_to_resources, product_to_resource,
    product_to_resource_with_mapper, product_to_resource_with_selector,
    product_to_resource_with_strategy, products_to_db, products_to_db_with_mapper,
    CategoryToModel, CategoryToResource, ParentToModel, ProductClassToModel,
    ProductClassToResource, ProductImageToModel, ProductImageToResource, ProductRelatedValues,
    ProductToModel, ProductToResource, RecommendedProductToModel, StockRecordDraft,
};
pub use common::{map_source, FieldRule, MapSource, Mapping};
pub use constants::{IdentifierMapping, ModelField, ALL_CATALOGUE_FIELDS, MODEL_IDENTIFIERS_MAPPING};
pub use context::MappingContext;
pub use model_mapper::{MappedModel, ModelMapping, ModelMappingContext};
pub use resources_to_db::{ProductsToDbOptions, RelatedCounts, SaveReport};
