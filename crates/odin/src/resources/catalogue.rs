//! Catalogue resources

use std::collections::BTreeMap;

use catalogue_orm::{AttributeValue, ProductStructure};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::resources::Validate;

/// An image for a product
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductImageResource {
    pub id: Option<i64>,
    pub code: String,
    /// Public URL of the image file
    pub original: Option<String>,
    pub caption: Option<String>,
    /// An image with a display order of zero is the primary image for a product
    pub display_order: i32,
    pub date_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryResource {
    pub id: Option<i64>,
    pub code: String,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub image: Option<String>,
    pub is_public: Option<bool>,
    pub ancestors_are_public: Option<bool>,
    pub depth: Option<i32>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductClassResource {
    pub name: Option<String>,
    pub slug: String,
    pub requires_shipping: Option<bool>,
    pub track_stock: Option<bool>,
}

/// Reference to a parent product by upc
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParentProductResource {
    pub upc: String,
}

/// Reference to a recommended product by upc
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductRecommendationResource {
    pub upc: String,
}

/// Fulfilment partner a stock record is held at
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartnerResource {
    pub id: Option<i64>,
    pub code: String,
    pub name: Option<String>,
}

/// A product within the catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductResource {
    pub id: Option<i64>,
    pub upc: Option<String>,
    pub structure: ProductStructure,
    pub title: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub meta_title: Option<String>,
    pub images: Vec<ProductImageResource>,
    pub rating: Option<f32>,
    pub is_discountable: bool,
    pub is_public: bool,
    pub parent: Option<ParentProductResource>,
    pub priority: i32,

    // Price information
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub availability: Option<i64>,
    pub is_available_to_buy: Option<bool>,
    pub partner: Option<PartnerResource>,

    pub product_class: Option<ProductClassResource>,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub categories: Vec<CategoryResource>,
    pub recommended_products: Vec<ProductRecommendationResource>,

    pub date_created: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,

    /// `None` when children were not requested, `Some(vec![])` when they
    /// were requested and there are none
    pub children: Option<Vec<ProductResource>>,
}

impl Default for ProductResource {
    fn default() -> Self {
        Self {
            id: None,
            upc: None,
            structure: ProductStructure::Standalone,
            title: String::new(),
            slug: None,
            description: Some(String::new()),
            meta_title: None,
            images: Vec::new(),
            rating: None,
            is_discountable: true,
            is_public: true,
            parent: None,
            priority: 0,
            price: None,
            currency: None,
            availability: None,
            is_available_to_buy: None,
            partner: None,
            product_class: None,
            attributes: BTreeMap::new(),
            categories: Vec::new(),
            recommended_products: Vec::new(),
            date_created: None,
            date_updated: None,
            children: None,
        }
    }
}

impl ProductResource {
    /// Short description used in error messages
    pub fn identify(&self) -> String {
        match &self.upc {
            Some(upc) => format!("ProductResource(upc={})", upc),
            None => format!("ProductResource(title={:?})", self.title),
        }
    }
}

impl Validate for ProductResource {
    fn full_clean(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();

        if self.structure != ProductStructure::Child && self.title.trim().is_empty() {
            errors.add("title", "This field cannot be blank.");
        }
        if matches!(&self.upc, Some(upc) if upc.trim().is_empty()) {
            errors.add("upc", "This field cannot be blank.");
        }

        match self.structure {
            ProductStructure::Child => {
                if self.parent.is_none() {
                    errors.add("parent", "A child product needs a parent.");
                }
                if self.product_class.is_some() {
                    errors.add("product_class", "A child product can't have a product class.");
                }
                if self.children.as_ref().is_some_and(|children| !children.is_empty()) {
                    errors.add("children", "A child product can't have children.");
                }
            }
            ProductStructure::Standalone | ProductStructure::Parent => {
                if self.parent.is_some() {
                    errors.add("parent", "Only child products can have a parent.");
                }
                if self.structure == ProductStructure::Standalone
                    && self.children.as_ref().is_some_and(|children| !children.is_empty())
                {
                    errors.add("children", "Only parent products can have children.");
                }
            }
        }

        if matches!(self.price, Some(price) if price.is_sign_negative()) {
            errors.add("price", "Ensure this value is greater than or equal to 0.");
        }
        if self.images.iter().any(|image| image.code.trim().is_empty()) {
            errors.add("images", "Every image needs a code.");
        }
        if self.categories.iter().any(|category| category.code.trim().is_empty()) {
            errors.add("categories", "Every category needs a code.");
        }
        if matches!(&self.product_class, Some(class) if class.slug.trim().is_empty()) {
            errors.add("product_class", "A product class needs a slug.");
        }
        if self.recommended_products.iter().any(|product| product.upc.trim().is_empty()) {
            errors.add("recommended_products", "Every recommendation needs a upc.");
        }

        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_init() {
        let resource = ProductResource::default();
        assert_eq!(resource.structure, ProductStructure::Standalone);
        assert!(resource.is_public);
        assert_eq!(resource.description.as_deref(), Some(""));
        assert!(resource.children.is_none());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let resource: ProductResource = serde_json::from_value(json!({
            "upc": "1234",
            "structure": "child",
            "title": "",
            "parent": {"upc": "12"},
            "price": "10.50",
            "attributes": {"size": 4, "colour": "Red", "tags": ["a", "b"]}
        }))
        .unwrap();

        assert_eq!(resource.structure, ProductStructure::Child);
        assert_eq!(resource.price, Some(Decimal::new(1050, 2)));
        assert_eq!(resource.attributes["size"], AttributeValue::Integer(4));
        assert!(resource.full_clean().is_ok());
    }

    #[test]
    fn test_full_clean_structure_rules() {
        let child = ProductResource {
            structure: ProductStructure::Child,
            product_class: Some(ProductClassResource {
                slug: "shirts".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = child.full_clean().unwrap_err();
        assert!(err.error_messages.contains_key("parent"));
        assert!(err.error_messages.contains_key("product_class"));

        let standalone = ProductResource {
            title: "Mug".to_string(),
            parent: Some(ParentProductResource { upc: "1".to_string() }),
            ..Default::default()
        };
        assert!(standalone.full_clean().unwrap_err().error_messages.contains_key("parent"));
    }
}
