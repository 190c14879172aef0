use serde::{Deserialize, Serialize};

use crate::model::{Model, Related};

/// ISO 3166 country
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Country {
    pub id: Option<i64>,
    pub iso_3166_1_a2: String,
    pub iso_3166_1_a3: String,
    pub iso_3166_1_numeric: String,
    pub printable_name: String,
    pub name: String,
    pub display_order: i16,
    pub is_shipping_country: bool,
}

impl Model for Country {
    fn table_name() -> &'static str {
        "address_country"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn set_primary_key(&mut self, key: i64) {
        self.id = Some(key);
    }
}

/// Billing address of an order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BillingAddress {
    pub id: Option<i64>,
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub line1: String,
    pub line2: String,
    pub line3: String,
    pub line4: String,
    pub state: String,
    pub postcode: String,
    pub country_id: i64,
    #[serde(skip)]
    pub country: Related<Country>,
}

impl Model for BillingAddress {
    fn table_name() -> &'static str {
        "order_billingaddress"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn set_primary_key(&mut self, key: i64) {
        self.id = Some(key);
    }

    fn reset_relations(&mut self) {
        self.country = Related::Deferred;
    }
}

/// Shipping address of an order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub id: Option<i64>,
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub line1: String,
    pub line2: String,
    pub line3: String,
    pub line4: String,
    pub state: String,
    pub postcode: String,
    pub country_id: i64,
    pub phone_number: Option<String>,
    pub notes: String,
    #[serde(skip)]
    pub country: Related<Country>,
}

impl Model for ShippingAddress {
    fn table_name() -> &'static str {
        "order_shippingaddress"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn set_primary_key(&mut self, key: i64) {
        self.id = Some(key);
    }

    fn reset_relations(&mut self) {
        self.country = Related::Deferred;
    }
}
