use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::{Model, Related};

/// A fulfilment partner holding stock
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Partner {
    pub id: Option<i64>,
    pub code: String,
    pub name: String,
}

impl Partner {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            code: code.into(),
            name: name.into(),
        }
    }
}

impl Model for Partner {
    fn table_name() -> &'static str {
        "partner_partner"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn set_primary_key(&mut self, key: i64) {
        self.id = Some(key);
    }
}

/// Stock and price of a product at one partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub id: Option<i64>,
    pub product_id: i64,
    pub partner_id: i64,
    pub partner_sku: String,
    pub price_currency: String,
    pub price: Option<Decimal>,
    pub num_in_stock: Option<i64>,
    pub num_allocated: Option<i64>,
    pub low_stock_threshold: Option<i64>,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    #[serde(skip)]
    pub partner: Related<Partner>,
}

impl Default for StockRecord {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: None,
            product_id: 0,
            partner_id: 0,
            partner_sku: String::new(),
            price_currency: String::new(),
            price: None,
            num_in_stock: None,
            num_allocated: None,
            low_stock_threshold: None,
            date_created: now,
            date_updated: now,
            partner: Related::Deferred,
        }
    }
}

impl StockRecord {
    /// Units that can still be sold: in stock minus allocated
    pub fn net_stock_level(&self) -> Option<i64> {
        let in_stock = self.num_in_stock?;
        Some(in_stock - self.num_allocated.unwrap_or(0))
    }
}

impl Model for StockRecord {
    fn table_name() -> &'static str {
        "partner_stockrecord"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn set_primary_key(&mut self, key: i64) {
        self.id = Some(key);
    }

    fn reset_relations(&mut self) {
        self.partner = Related::Deferred;
    }
}
