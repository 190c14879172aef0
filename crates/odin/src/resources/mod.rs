//! Data-transfer records used at API boundaries

pub mod address;
pub mod catalogue;

pub use address::{BillingAddressResource, CountryResource, ShippingAddressResource};
pub use catalogue::{
    CategoryResource, ParentProductResource, PartnerResource, ProductClassResource,
    ProductImageResource, ProductRecommendationResource, ProductResource,
};

use crate::error::ValidationError;

/// Resource level validation, run before resources are persisted
pub trait Validate {
    fn full_clean(&self) -> Result<(), ValidationError>;
}
