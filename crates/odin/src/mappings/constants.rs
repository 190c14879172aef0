//! Field selections and natural keys used by the bulk write path

use std::collections::BTreeMap;

/// A column of a catalogue table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelField {
    pub model: &'static str,
    pub name: &'static str,
}

impl ModelField {
    pub const fn new(model: &'static str, name: &'static str) -> Self {
        Self { model, name }
    }
}

pub const PRODUCT: &str = "catalogue_product";
pub const PRODUCT_CLASS: &str = "catalogue_productclass";
pub const PRODUCT_IMAGE: &str = "catalogue_productimage";
pub const CATEGORY: &str = "catalogue_category";
pub const STOCKRECORD: &str = "partner_stockrecord";
pub const PARTNER: &str = "partner_partner";

const fn field(model: &'static str, name: &'static str) -> ModelField {
    ModelField::new(model, name)
}

/// Every column the bulk write path may update
pub const ALL_CATALOGUE_FIELDS: &[ModelField] = &[
    field(PRODUCT, "upc"),
    field(PRODUCT, "structure"),
    field(PRODUCT, "title"),
    field(PRODUCT, "slug"),
    field(PRODUCT, "description"),
    field(PRODUCT, "meta_title"),
    field(PRODUCT, "rating"),
    field(PRODUCT, "is_discountable"),
    field(PRODUCT, "is_public"),
    field(PRODUCT, "priority"),
    field(PRODUCT, "parent_id"),
    field(PRODUCT, "product_class_id"),
    field(PRODUCT, "date_updated"),
    field(PRODUCT_CLASS, "name"),
    field(PRODUCT_CLASS, "requires_shipping"),
    field(PRODUCT_CLASS, "track_stock"),
    field(PRODUCT_IMAGE, "original"),
    field(PRODUCT_IMAGE, "caption"),
    field(PRODUCT_IMAGE, "display_order"),
    field(CATEGORY, "name"),
    field(CATEGORY, "slug"),
    field(CATEGORY, "description"),
    field(CATEGORY, "meta_title"),
    field(CATEGORY, "meta_description"),
    field(CATEGORY, "image"),
    field(CATEGORY, "is_public"),
    field(STOCKRECORD, "price"),
    field(STOCKRECORD, "price_currency"),
    field(STOCKRECORD, "num_in_stock"),
    field(STOCKRECORD, "date_updated"),
];

/// Columns of `model` selected in `fields`
pub fn fields_for(fields: &[ModelField], model: &str) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|field| field.model == model)
        .map(|field| field.name)
        .collect()
}

/// Natural keys used to match resources against stored rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierMapping {
    identifiers: BTreeMap<&'static str, Vec<&'static str>>,
}

impl IdentifierMapping {
    pub fn empty() -> Self {
        Self {
            identifiers: BTreeMap::new(),
        }
    }

    /// Use `fields` as the natural key of `model`
    pub fn with(mut self, model: &'static str, fields: &[&'static str]) -> Self {
        self.identifiers.insert(model, fields.to_vec());
        self
    }

    pub fn get(&self, model: &str) -> &[&'static str] {
        self.identifiers
            .get(model)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl Default for IdentifierMapping {
    fn default() -> Self {
        MODEL_IDENTIFIERS_MAPPING
            .iter()
            .fold(Self::empty(), |mapping, (model, fields)| mapping.with(model, fields))
    }
}

pub const MODEL_IDENTIFIERS_MAPPING: &[(&str, &[&str])] = &[
    (PRODUCT, &["upc"]),
    (CATEGORY, &["code"]),
    (PRODUCT_IMAGE, &["code"]),
    (PRODUCT_CLASS, &["slug"]),
    (PARTNER, &["code"]),
    (STOCKRECORD, &["partner_id", "partner_sku"]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_for_model() {
        let fields = fields_for(ALL_CATALOGUE_FIELDS, PRODUCT_CLASS);
        assert_eq!(fields, vec!["name", "requires_shipping", "track_stock"]);
    }

    #[test]
    fn test_default_identifiers() {
        let mapping = IdentifierMapping::default();
        assert_eq!(mapping.get(PRODUCT), &["upc"]);
        assert_eq!(mapping.get(STOCKRECORD), &["partner_id", "partner_sku"]);
        assert!(mapping.get("catalogue_unknown").is_empty());

        let custom = IdentifierMapping::default().with(PRODUCT, &["upc", "structure"]);
        assert_eq!(custom.get(PRODUCT).len(), 2);
    }
}
