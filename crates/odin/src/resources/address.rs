//! Address resources

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CountryResource {
    pub iso_3166_1_a2: String,
    pub iso_3166_1_a3: String,
    pub iso_3166_1_numeric: String,
    pub printable_name: String,
    pub name: String,
    pub display_order: i16,
    pub is_shipping_country: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingAddressResource {
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
    pub country: CountryResource,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingAddressResource {
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
    pub country: CountryResource,
    pub phone_number: Option<String>,
    pub notes: String,
}
