use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::files::FieldFile;
use crate::model::Model;

/// An image of a product. Display order zero is the primary image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: Option<i64>,
    pub product_id: i64,
    pub code: String,
    pub original: Option<FieldFile>,
    pub caption: String,
    pub display_order: i32,
    pub date_created: DateTime<Utc>,
}

impl Default for ProductImage {
    fn default() -> Self {
        Self {
            id: None,
            product_id: 0,
            code: String::new(),
            original: None,
            caption: String::new(),
            display_order: 0,
            date_created: Utc::now(),
        }
    }
}

impl ProductImage {
    pub fn new(code: impl Into<String>, original: impl Into<FieldFile>) -> Self {
        Self {
            code: code.into(),
            original: Some(original.into()),
            ..Self::default()
        }
    }

    pub fn is_primary(&self) -> bool {
        self.display_order == 0
    }
}

impl Model for ProductImage {
    fn table_name() -> &'static str {
        "catalogue_productimage"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn set_primary_key(&mut self, key: i64) {
        self.id = Some(key);
    }
}
