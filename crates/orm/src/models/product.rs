//! Product entity with its relation cache and display helpers
//!
//! Relation accessors take the database handle and fall back to a lazy
//! query when the relation was neither joined nor prefetched. Lazy loads
//! are counted by the database so N+1 access patterns show up in the logs.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::{OrmError, OrmResult};
use crate::model::{Model, Related};
use crate::models::attribute::{ProductAttributeValue, ProductAttributesContainer};
use crate::models::category::Category;
use crate::models::image::ProductImage;
use crate::models::partner::StockRecord;
use crate::models::product_class::ProductClass;

/// Structure of a product within a parent/child family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStructure {
    #[default]
    Standalone,
    Parent,
    Child,
}

impl ProductStructure {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStructure::Standalone => "standalone",
            ProductStructure::Parent => "parent",
            ProductStructure::Child => "child",
        }
    }
}

impl fmt::Display for ProductStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loaded relations of a product
#[derive(Debug, Clone, Default)]
pub struct ProductRelations {
    pub product_class: Related<Option<ProductClass>>,
    pub parent: Related<Option<Box<Product>>>,
    pub children: Related<Vec<Product>>,
    pub public_children: Related<Vec<Product>>,
    pub images: Related<Vec<ProductImage>>,
    pub stockrecords: Related<Vec<StockRecord>>,
    pub categories: Related<Vec<Category>>,
    pub browsable_categories: Related<Vec<Category>>,
    pub attribute_values: Related<Vec<ProductAttributeValue>>,
    pub recommended_products: Related<Vec<Product>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Option<i64>,
    pub upc: Option<String>,
    pub structure: ProductStructure,
    pub parent_id: Option<i64>,
    pub product_class_id: Option<i64>,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub rating: Option<f32>,
    pub is_discountable: bool,
    pub is_public: bool,
    pub priority: i32,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    #[serde(skip)]
    pub relations: ProductRelations,
    #[serde(skip)]
    pub attr: ProductAttributesContainer,
}

impl Default for Product {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: None,
            upc: None,
            structure: ProductStructure::Standalone,
            parent_id: None,
            product_class_id: None,
            title: String::new(),
            slug: String::new(),
            description: String::new(),
            meta_title: None,
            meta_description: None,
            rating: None,
            is_discountable: true,
            is_public: true,
            priority: 0,
            date_created: now,
            date_updated: now,
            relations: ProductRelations::default(),
            attr: ProductAttributesContainer::default(),
        }
    }
}

impl Product {
    pub fn new(title: impl Into<String>, structure: ProductStructure) -> Self {
        Self {
            title: title.into(),
            structure,
            ..Self::default()
        }
    }

    pub fn is_standalone(&self) -> bool {
        self.structure == ProductStructure::Standalone
    }

    pub fn is_parent(&self) -> bool {
        self.structure == ProductStructure::Parent
    }

    pub fn is_child(&self) -> bool {
        self.structure == ProductStructure::Child
    }

    fn stored_id(&self) -> Option<i64> {
        self.id
    }

    // Relation accessors

    pub fn product_class<'a>(&'a self, db: &Database) -> OrmResult<Option<Cow<'a, ProductClass>>> {
        if let Some(loaded) = self.relations.product_class.get() {
            return Ok(loaded.as_ref().map(Cow::Borrowed));
        }
        let Some(class_id) = self.product_class_id else {
            return Ok(None);
        };
        db.record_lazy_load(Self::table_name(), "product_class");
        Ok(db.product_classes_by_ids(&[class_id]).into_iter().next().map(Cow::Owned))
    }

    pub fn parent<'a>(&'a self, db: &Database) -> OrmResult<Option<Cow<'a, Product>>> {
        if let Some(loaded) = self.relations.parent.get() {
            return Ok(loaded.as_deref().map(Cow::Borrowed));
        }
        let Some(parent_id) = self.parent_id else {
            return Ok(None);
        };
        db.record_lazy_load(Self::table_name(), "parent");
        let parent = db
            .products_by_ids(&[parent_id])
            .into_iter()
            .next()
            .ok_or_else(|| OrmError::NotFound(format!("catalogue_product id={}", parent_id)))?;
        Ok(Some(Cow::Owned(parent)))
    }

    pub fn children<'a>(&'a self, db: &Database) -> OrmResult<Cow<'a, [Product]>> {
        if let Some(children) = self.relations.children.get() {
            return Ok(Cow::Borrowed(children.as_slice()));
        }
        let Some(id) = self.stored_id() else {
            return Ok(Cow::Owned(Vec::new()));
        };
        db.record_lazy_load(Self::table_name(), "children");
        Ok(Cow::Owned(db.children_of(&[id], false)))
    }

    /// Children visible in the storefront
    pub fn public_children<'a>(&'a self, db: &Database) -> OrmResult<Cow<'a, [Product]>> {
        if let Some(children) = self.relations.public_children.get() {
            return Ok(Cow::Borrowed(children.as_slice()));
        }
        if let Some(children) = self.relations.children.get() {
            return Ok(Cow::Owned(
                children.iter().filter(|child| child.is_public).cloned().collect(),
            ));
        }
        let Some(id) = self.stored_id() else {
            return Ok(Cow::Owned(Vec::new()));
        };
        db.record_lazy_load(Self::table_name(), "public_children");
        Ok(Cow::Owned(db.children_of(&[id], true)))
    }

    pub fn images<'a>(&'a self, db: &Database) -> OrmResult<Cow<'a, [ProductImage]>> {
        if let Some(images) = self.relations.images.get() {
            return Ok(Cow::Borrowed(images.as_slice()));
        }
        let Some(id) = self.stored_id() else {
            return Ok(Cow::Owned(Vec::new()));
        };
        db.record_lazy_load(Self::table_name(), "images");
        Ok(Cow::Owned(db.images_for(&[id])))
    }

    pub fn stockrecords<'a>(&'a self, db: &Database) -> OrmResult<Cow<'a, [StockRecord]>> {
        if let Some(records) = self.relations.stockrecords.get() {
            return Ok(Cow::Borrowed(records.as_slice()));
        }
        let Some(id) = self.stored_id() else {
            return Ok(Cow::Owned(Vec::new()));
        };
        db.record_lazy_load(Self::table_name(), "stockrecords");
        Ok(Cow::Owned(db.stockrecords_for(&[id])))
    }

    pub fn categories<'a>(&'a self, db: &Database) -> OrmResult<Cow<'a, [Category]>> {
        if let Some(categories) = self.relations.categories.get() {
            return Ok(Cow::Borrowed(categories.as_slice()));
        }
        let Some(id) = self.stored_id() else {
            return Ok(Cow::Owned(Vec::new()));
        };
        db.record_lazy_load(Self::table_name(), "categories");
        Ok(Cow::Owned(strip_owner(db.categories_for(&[id], false))))
    }

    /// Categories that are public and have only public ancestors
    pub fn browsable_categories<'a>(&'a self, db: &Database) -> OrmResult<Cow<'a, [Category]>> {
        if let Some(categories) = self.relations.browsable_categories.get() {
            return Ok(Cow::Borrowed(categories.as_slice()));
        }
        if let Some(categories) = self.relations.categories.get() {
            return Ok(Cow::Owned(
                categories
                    .iter()
                    .filter(|category| category.is_browsable())
                    .cloned()
                    .collect(),
            ));
        }
        let Some(id) = self.stored_id() else {
            return Ok(Cow::Owned(Vec::new()));
        };
        db.record_lazy_load(Self::table_name(), "browsable_categories");
        Ok(Cow::Owned(strip_owner(db.categories_for(&[id], true))))
    }

    pub fn attribute_values<'a>(
        &'a self,
        db: &Database,
    ) -> OrmResult<Cow<'a, [ProductAttributeValue]>> {
        if let Some(values) = self.relations.attribute_values.get() {
            return Ok(Cow::Borrowed(values.as_slice()));
        }
        let Some(id) = self.stored_id() else {
            return Ok(Cow::Owned(Vec::new()));
        };
        db.record_lazy_load(Self::table_name(), "attribute_values");
        Ok(Cow::Owned(db.attribute_values_for(&[id])))
    }

    pub fn recommended_products<'a>(&'a self, db: &Database) -> OrmResult<Cow<'a, [Product]>> {
        if let Some(products) = self.relations.recommended_products.get() {
            return Ok(Cow::Borrowed(products.as_slice()));
        }
        let Some(id) = self.stored_id() else {
            return Ok(Cow::Owned(Vec::new()));
        };
        db.record_lazy_load(Self::table_name(), "recommended_products");
        Ok(Cow::Owned(strip_owner(db.recommended_for(&[id]))))
    }

    // Display helpers

    /// Own title, or the parent's title for a child without one
    pub fn get_title(&self, db: &Database) -> OrmResult<String> {
        if self.title.is_empty() && self.parent_id.is_some() {
            if let Some(parent) = self.parent(db)? {
                return Ok(parent.title.clone());
            }
        }
        Ok(self.title.clone())
    }

    /// Meta title with fallback to the parent's meta title, then to the title
    pub fn get_meta_title(&self, db: &Database) -> OrmResult<String> {
        let mut title = self.meta_title.clone().filter(|title| !title.is_empty());
        if title.is_none() && self.is_child() {
            if let Some(parent) = self.parent(db)? {
                title = parent.meta_title.clone().filter(|title| !title.is_empty());
            }
        }
        match title {
            Some(title) => Ok(title),
            None => self.get_title(db),
        }
    }

    /// Own images, or the parent's images for a child without any
    pub fn get_all_images<'a>(&'a self, db: &Database) -> OrmResult<Cow<'a, [ProductImage]>> {
        let images = self.images(db)?;
        if self.is_child() && images.is_empty() {
            match self.parent(db)? {
                Some(Cow::Borrowed(parent)) => return parent.images(db),
                Some(Cow::Owned(parent)) => {
                    return Ok(Cow::Owned(parent.images(db)?.into_owned()))
                }
                None => {}
            }
        }
        Ok(images)
    }

    /// Browsable categories, taken from the parent for child products
    pub fn get_categories<'a>(&'a self, db: &Database) -> OrmResult<Cow<'a, [Category]>> {
        if self.is_child() {
            return match self.parent(db)? {
                Some(Cow::Borrowed(parent)) => parent.browsable_categories(db),
                Some(Cow::Owned(parent)) => {
                    Ok(Cow::Owned(parent.browsable_categories(db)?.into_owned()))
                }
                None => Ok(Cow::Owned(Vec::new())),
            };
        }
        self.browsable_categories(db)
    }

    /// Effective product class: the parent's class for child products
    pub fn get_product_class<'a>(
        &'a self,
        db: &Database,
    ) -> OrmResult<Option<Cow<'a, ProductClass>>> {
        if self.is_child() {
            return match self.parent(db)? {
                Some(Cow::Borrowed(parent)) => parent.product_class(db),
                Some(Cow::Owned(parent)) => {
                    Ok(parent.product_class(db)?.map(|class| Cow::Owned(class.into_owned())))
                }
                None => Ok(None),
            };
        }
        self.product_class(db)
    }

    /// Own attribute values, plus the parent's values for attributes a
    /// child does not override
    pub fn get_attribute_values<'a>(
        &'a self,
        db: &Database,
    ) -> OrmResult<Cow<'a, [ProductAttributeValue]>> {
        let own = self.attribute_values(db)?;
        if !self.is_child() {
            return Ok(own);
        }
        let Some(parent) = self.parent(db)? else {
            return Ok(own);
        };

        let overridden: HashSet<i64> = own.iter().map(|value| value.attribute_id).collect();
        let inherited: Vec<ProductAttributeValue> = parent
            .attribute_values(db)?
            .iter()
            .filter(|value| !overridden.contains(&value.attribute_id))
            .cloned()
            .collect();

        if inherited.is_empty() {
            return Ok(own);
        }
        let mut merged = own.into_owned();
        merged.extend(inherited);
        Ok(Cow::Owned(merged))
    }
}

fn strip_owner<T>(rows: Vec<(i64, T)>) -> Vec<T> {
    rows.into_iter().map(|(_, row)| row).collect()
}

impl Model for Product {
    fn table_name() -> &'static str {
        "catalogue_product"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn set_primary_key(&mut self, key: i64) {
        self.id = Some(key);
    }

    fn reset_relations(&mut self) {
        self.relations = ProductRelations::default();
        self.attr = ProductAttributesContainer::default();
    }

    fn clean(&self) -> OrmResult<()> {
        let label = self.upc.as_deref().unwrap_or(self.title.as_str());
        match self.structure {
            ProductStructure::Standalone | ProductStructure::Parent => {
                if self.product_class_id.is_none() {
                    return Err(OrmError::Validation(format!(
                        "{}: Your product must have a product class.",
                        label
                    )));
                }
                if self.parent_id.is_some() {
                    return Err(OrmError::Validation(format!(
                        "{}: Only child products can have a parent.",
                        label
                    )));
                }
            }
            ProductStructure::Child => {
                if self.parent_id.is_none() {
                    return Err(OrmError::Validation(format!(
                        "{}: A child product needs a parent.",
                        label
                    )));
                }
                if self.product_class_id.is_some() {
                    return Err(OrmError::Validation(format!(
                        "{}: A child product can't have a product class.",
                        label
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Ranked recommendation of one product from another
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductRecommendation {
    pub id: Option<i64>,
    pub primary_id: i64,
    pub recommendation_id: i64,
    pub ranking: i16,
}

impl Model for ProductRecommendation {
    fn table_name() -> &'static str {
        "catalogue_productrecommendation"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn set_primary_key(&mut self, key: i64) {
        self.id = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ProductStructure::Child).unwrap(),
            serde_json::json!("child")
        );
        assert_eq!(ProductStructure::Parent.to_string(), "parent");
    }

    #[test]
    fn test_clean_structure_rules() {
        let mut product = Product::new("Shirt", ProductStructure::Standalone);
        assert!(product.clean().is_err());
        product.product_class_id = Some(1);
        assert!(product.clean().is_ok());

        let mut child = Product::new("Shirt S", ProductStructure::Child);
        assert!(child.clean().is_err());
        child.parent_id = Some(3);
        assert!(child.clean().is_ok());
        child.product_class_id = Some(1);
        assert!(child.clean().is_err());
    }

    #[test]
    fn test_display_helpers_use_loaded_parent() {
        let db = Database::new();
        let mut parent = Product::new("Shirt", ProductStructure::Parent);
        parent.id = Some(1);
        parent.meta_title = Some("Shirts for everyone".to_string());

        let mut child = Product::new("", ProductStructure::Child);
        child.id = Some(2);
        child.parent_id = Some(1);
        child.relations.parent.set(Some(Box::new(parent)));

        assert_eq!(child.get_title(&db).unwrap(), "Shirt");
        assert_eq!(child.get_meta_title(&db).unwrap(), "Shirts for everyone");
        assert_eq!(db.query_count(), 0);
    }
}
