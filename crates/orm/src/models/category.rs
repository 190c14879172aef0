use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};
use crate::files::FieldFile;
use crate::model::Model;

/// A node of the category tree (materialised path)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Option<i64>,
    pub code: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub image: Option<FieldFile>,
    pub is_public: bool,
    pub ancestors_are_public: bool,
    pub depth: i32,
    pub path: Option<String>,
}

impl Default for Category {
    fn default() -> Self {
        Self {
            id: None,
            code: String::new(),
            name: String::new(),
            slug: String::new(),
            description: String::new(),
            meta_title: None,
            meta_description: None,
            image: None,
            is_public: true,
            ancestors_are_public: true,
            depth: 0,
            path: None,
        }
    }
}

impl Category {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            code: code.into(),
            slug: slugify(&name),
            name,
            depth: 1,
            ..Self::default()
        }
    }

    /// Meta title, falling back to the category name
    pub fn get_meta_title(&self) -> String {
        match &self.meta_title {
            Some(title) if !title.is_empty() => title.clone(),
            _ => self.name.clone(),
        }
    }

    /// Public and all ancestors public
    pub fn is_browsable(&self) -> bool {
        self.is_public && self.ancestors_are_public
    }
}

impl Model for Category {
    fn table_name() -> &'static str {
        "catalogue_category"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn set_primary_key(&mut self, key: i64) {
        self.id = Some(key);
    }

    fn clean(&self) -> OrmResult<()> {
        if self.name.trim().is_empty() {
            return Err(OrmError::Validation("Category name is required".to_string()));
        }
        Ok(())
    }
}

/// Link row between a product and a category
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductCategory {
    pub id: Option<i64>,
    pub product_id: i64,
    pub category_id: i64,
}

impl ProductCategory {
    pub fn new(product_id: i64, category_id: i64) -> Self {
        Self {
            id: None,
            product_id,
            category_id,
        }
    }
}

impl Model for ProductCategory {
    fn table_name() -> &'static str {
        "catalogue_productcategory"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn set_primary_key(&mut self, key: i64) {
        self.id = Some(key);
    }
}

/// Lowercase, hyphen separated slug of a display name
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_title_fallback() {
        let mut category = Category::new("shoes", "Running Shoes");
        assert_eq!(category.get_meta_title(), "Running Shoes");

        category.meta_title = Some(String::new());
        assert_eq!(category.get_meta_title(), "Running Shoes");

        category.meta_title = Some("Buy running shoes".to_string());
        assert_eq!(category.get_meta_title(), "Buy running shoes");
    }

    #[test]
    fn test_browsable() {
        let mut category = Category::new("hidden", "Hidden");
        assert!(category.is_browsable());
        category.ancestors_are_public = false;
        assert!(!category.is_browsable());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Running Shoes & Socks"), "running-shoes-socks");
        assert_eq!(slugify("  T-Shirts "), "t-shirts");
    }
}
