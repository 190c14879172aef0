//! Catalogue, partner and address entities

pub mod address;
pub mod attribute;
pub mod category;
pub mod image;
pub mod partner;
pub mod product;
pub mod product_class;

pub use address::{BillingAddress, Country, ShippingAddress};
pub use attribute::{
    AttributeOption, AttributeOptionGroup, AttributeType, AttributeValue, EntityReference,
    ProductAttribute, ProductAttributeValue, ProductAttributesContainer,
};
pub use category::{slugify, Category, ProductCategory};
pub use image::ProductImage;
pub use partner::{Partner, StockRecord};
pub use product::{Product, ProductRecommendation, ProductRelations, ProductStructure};
pub use product_class::ProductClass;
