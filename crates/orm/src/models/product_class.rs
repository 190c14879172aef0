use serde::{Deserialize, Serialize};

use crate::model::Model;

/// Product class (type of product), owns the attribute definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductClass {
    pub id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub requires_shipping: bool,
    pub track_stock: bool,
}

impl Default for ProductClass {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            slug: String::new(),
            requires_shipping: true,
            track_stock: true,
        }
    }
}

impl ProductClass {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            ..Self::default()
        }
    }
}

impl Model for ProductClass {
    fn table_name() -> &'static str {
        "catalogue_productclass"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn set_primary_key(&mut self, key: i64) {
        self.id = Some(key);
    }
}
