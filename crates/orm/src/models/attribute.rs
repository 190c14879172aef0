//! Product attributes: definitions, options, stored values and the
//! per-product attribute container used before values are persisted.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OrmError, OrmResult};
use crate::files::FieldFile;
use crate::model::{Model, Related};

/// Declared type of a product attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Text,
    Integer,
    Boolean,
    Float,
    Richtext,
    Date,
    Datetime,
    Option,
    MultiOption,
    Entity,
    File,
    Image,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::Text => "text",
            AttributeType::Integer => "integer",
            AttributeType::Boolean => "boolean",
            AttributeType::Float => "float",
            AttributeType::Richtext => "richtext",
            AttributeType::Date => "date",
            AttributeType::Datetime => "datetime",
            AttributeType::Option => "option",
            AttributeType::MultiOption => "multi_option",
            AttributeType::Entity => "entity",
            AttributeType::File => "file",
            AttributeType::Image => "image",
        };
        f.write_str(name)
    }
}

/// Native value of an attribute as it travels through resources.
///
/// Dates and datetimes serialize as ISO strings and come back as `Text`
/// (`Json` accepts anything first), the attribute container coerces them
/// using the declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<AttributeValue>),
    Json(Value),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Text rendering used for `value_as_text` and for search indexes
    pub fn as_text(&self) -> String {
        match self {
            AttributeValue::Null => String::new(),
            AttributeValue::Boolean(value) => value.to_string(),
            AttributeValue::Integer(value) => value.to_string(),
            AttributeValue::Float(value) => value.to_string(),
            AttributeValue::Text(value) => value.clone(),
            AttributeValue::List(values) => values
                .iter()
                .map(AttributeValue::as_text)
                .collect::<Vec<_>>()
                .join(", "),
            AttributeValue::Json(value) => value.to_string(),
            AttributeValue::Date(value) => value.to_string(),
            AttributeValue::DateTime(value) => value.to_rfc3339(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Boolean(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

/// Attribute definition owned by a product class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAttribute {
    pub id: Option<i64>,
    pub product_class_id: Option<i64>,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    pub option_group_id: Option<i64>,
    pub required: bool,
}

impl ProductAttribute {
    pub fn new(code: impl Into<String>, name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            id: None,
            product_class_id: None,
            name: name.into(),
            code: code.into(),
            attr_type,
            option_group_id: None,
            required: false,
        }
    }

    /// Coerce a native value into the shape stored for this attribute type
    pub fn coerce(&self, value: AttributeValue) -> OrmResult<AttributeValue> {
        let invalid = |value: &AttributeValue| {
            OrmError::Attribute(format!(
                "'{}' is not a valid {} value for attribute '{}'",
                value.as_text(),
                self.attr_type,
                self.code
            ))
        };

        if value.is_null() {
            return Ok(AttributeValue::Null);
        }

        let coerced = match (self.attr_type, value) {
            (AttributeType::Text | AttributeType::Richtext, AttributeValue::Text(text)) => {
                AttributeValue::Text(text)
            }
            (AttributeType::Text | AttributeType::Richtext, other) => {
                AttributeValue::Text(other.as_text())
            }
            (AttributeType::Integer, AttributeValue::Integer(value)) => AttributeValue::Integer(value),
            (AttributeType::Integer, AttributeValue::Float(value)) if value.fract() == 0.0 => {
                AttributeValue::Integer(value as i64)
            }
            (AttributeType::Integer, AttributeValue::Text(text)) => text
                .trim()
                .parse::<i64>()
                .map(AttributeValue::Integer)
                .map_err(|_| invalid(&AttributeValue::Text(text.clone())))?,
            (AttributeType::Boolean, AttributeValue::Boolean(value)) => AttributeValue::Boolean(value),
            (AttributeType::Boolean, AttributeValue::Text(text)) => {
                let normalised = text.trim().to_lowercase();
                match normalised.as_str() {
                    "true" | "1" | "yes" => AttributeValue::Boolean(true),
                    "false" | "0" | "no" => AttributeValue::Boolean(false),
                    _ => return Err(invalid(&AttributeValue::Text(text))),
                }
            }
            (AttributeType::Float, AttributeValue::Float(value)) => AttributeValue::Float(value),
            (AttributeType::Float, AttributeValue::Integer(value)) => AttributeValue::Float(value as f64),
            (AttributeType::Float, AttributeValue::Text(text)) => text
                .trim()
                .parse::<f64>()
                .map(AttributeValue::Float)
                .map_err(|_| invalid(&AttributeValue::Text(text.clone())))?,
            (AttributeType::Date, AttributeValue::Date(value)) => AttributeValue::Date(value),
            (AttributeType::Date, AttributeValue::DateTime(value)) => {
                AttributeValue::Date(value.date_naive())
            }
            (AttributeType::Date, AttributeValue::Text(text)) => {
                NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                    .map(AttributeValue::Date)
                    .map_err(|_| invalid(&AttributeValue::Text(text.clone())))?
            }
            (AttributeType::Datetime, AttributeValue::DateTime(value)) => {
                AttributeValue::DateTime(value)
            }
            (AttributeType::Datetime, AttributeValue::Text(text)) => {
                DateTime::parse_from_rfc3339(text.trim())
                    .map(|value| AttributeValue::DateTime(value.with_timezone(&Utc)))
                    .map_err(|_| invalid(&AttributeValue::Text(text.clone())))?
            }
            (AttributeType::Option, AttributeValue::Text(label)) => AttributeValue::Text(label),
            (AttributeType::MultiOption, AttributeValue::List(values)) => {
                let mut labels = Vec::with_capacity(values.len());
                for value in values {
                    match value {
                        AttributeValue::Text(label) => labels.push(AttributeValue::Text(label)),
                        other => return Err(invalid(&other)),
                    }
                }
                AttributeValue::List(labels)
            }
            (AttributeType::MultiOption, AttributeValue::Text(label)) => {
                AttributeValue::List(vec![AttributeValue::Text(label)])
            }
            (AttributeType::Entity, AttributeValue::Json(value)) => AttributeValue::Json(value),
            (AttributeType::File | AttributeType::Image, AttributeValue::Text(name)) => {
                AttributeValue::Text(name)
            }
            (_, other) => return Err(invalid(&other)),
        };
        Ok(coerced)
    }
}

impl Model for ProductAttribute {
    fn table_name() -> &'static str {
        "catalogue_productattribute"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn set_primary_key(&mut self, key: i64) {
        self.id = Some(key);
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeOptionGroup {
    pub id: Option<i64>,
    pub name: String,
}

impl Model for AttributeOptionGroup {
    fn table_name() -> &'static str {
        "catalogue_attributeoptiongroup"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn set_primary_key(&mut self, key: i64) {
        self.id = Some(key);
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeOption {
    pub id: Option<i64>,
    pub group_id: i64,
    pub option: String,
}

impl Model for AttributeOption {
    fn table_name() -> &'static str {
        "catalogue_attributeoption"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn set_primary_key(&mut self, key: i64) {
        self.id = Some(key);
    }
}

/// Generic reference to an arbitrary stored object.
///
/// `json` holds the object's JSON projection when the referenced type
/// provides one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReference {
    pub content_type: String,
    pub object_id: i64,
    pub json: Option<Value>,
}

/// Stored value of one attribute for one product
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductAttributeValue {
    pub id: Option<i64>,
    pub product_id: i64,
    pub attribute_id: i64,
    pub value_text: Option<String>,
    pub value_richtext: Option<String>,
    pub value_integer: Option<i64>,
    pub value_boolean: Option<bool>,
    pub value_float: Option<f64>,
    pub value_date: Option<NaiveDate>,
    pub value_datetime: Option<DateTime<Utc>>,
    pub value_option_id: Option<i64>,
    pub value_multi_option_ids: Vec<i64>,
    pub value_file: Option<FieldFile>,
    pub value_image: Option<FieldFile>,
    pub value_entity: Option<EntityReference>,
    #[serde(skip)]
    pub attribute: Related<ProductAttribute>,
    #[serde(skip)]
    pub value_option: Related<Option<AttributeOption>>,
    #[serde(skip)]
    pub value_multi_option: Related<Vec<AttributeOption>>,
}

impl ProductAttributeValue {
    /// Build a value row for `attribute` from a coerced native value.
    /// Option labels are resolved against `options`.
    pub fn from_native(
        attribute: &ProductAttribute,
        product_id: i64,
        value: &AttributeValue,
        options: &[AttributeOption],
    ) -> OrmResult<Self> {
        let attribute_id = attribute
            .id
            .ok_or_else(|| OrmError::MissingPrimaryKey(ProductAttribute::table_name().to_string()))?;

        let find_option = |label: &str| -> OrmResult<&AttributeOption> {
            options
                .iter()
                .find(|option| {
                    Some(option.group_id) == attribute.option_group_id && option.option == label
                })
                .ok_or_else(|| {
                    OrmError::Attribute(format!(
                        "'{}' is not a valid option for attribute '{}'",
                        label, attribute.code
                    ))
                })
        };

        let mut row = ProductAttributeValue {
            product_id,
            attribute_id,
            ..Default::default()
        };

        match (attribute.attr_type, value) {
            (_, AttributeValue::Null) => {}
            (AttributeType::Text, AttributeValue::Text(text)) => row.value_text = Some(text.clone()),
            (AttributeType::Richtext, AttributeValue::Text(text)) => {
                row.value_richtext = Some(text.clone())
            }
            (AttributeType::Integer, AttributeValue::Integer(value)) => row.value_integer = Some(*value),
            (AttributeType::Boolean, AttributeValue::Boolean(value)) => row.value_boolean = Some(*value),
            (AttributeType::Float, AttributeValue::Float(value)) => row.value_float = Some(*value),
            (AttributeType::Date, AttributeValue::Date(value)) => row.value_date = Some(*value),
            (AttributeType::Datetime, AttributeValue::DateTime(value)) => {
                row.value_datetime = Some(*value)
            }
            (AttributeType::Option, AttributeValue::Text(label)) => {
                let option = find_option(label)?;
                row.value_option_id = option.id;
                row.value_option = Related::Loaded(Some(option.clone()));
            }
            (AttributeType::MultiOption, AttributeValue::List(labels)) => {
                let mut selected = Vec::with_capacity(labels.len());
                for label in labels {
                    selected.push(find_option(&label.as_text())?.clone());
                }
                row.value_multi_option_ids = selected.iter().filter_map(|option| option.id).collect();
                row.value_multi_option = Related::Loaded(selected);
            }
            (AttributeType::Entity, AttributeValue::Json(value)) => {
                row.value_entity = Some(EntityReference {
                    content_type: attribute.code.clone(),
                    object_id: value.get("id").and_then(Value::as_i64).unwrap_or_default(),
                    json: Some(value.clone()),
                });
            }
            (AttributeType::File, AttributeValue::Text(name)) => {
                row.value_file = Some(FieldFile::new(name.as_str()))
            }
            (AttributeType::Image, AttributeValue::Text(name)) => {
                row.value_image = Some(FieldFile::new(name.as_str()))
            }
            (attr_type, other) => {
                return Err(OrmError::Attribute(format!(
                    "cannot store '{}' in a {} attribute '{}'",
                    other.as_text(),
                    attr_type,
                    attribute.code
                )))
            }
        }

        row.attribute = Related::Loaded(attribute.clone());
        Ok(row)
    }

    /// The joined attribute definition
    pub fn attribute(&self) -> OrmResult<&ProductAttribute> {
        self.attribute.get().ok_or_else(|| {
            OrmError::Attribute(format!(
                "attribute {} of value {:?} is not loaded",
                self.attribute_id, self.id
            ))
        })
    }

    /// Label of the selected option
    pub fn option_label(&self) -> OrmResult<String> {
        match self.value_option.get() {
            Some(Some(option)) => Ok(option.option.clone()),
            _ => Err(OrmError::Attribute(format!(
                "attribute value {:?} has no option selected",
                self.id
            ))),
        }
    }

    /// Labels of the selected options, in selection order
    pub fn multi_option_labels(&self) -> OrmResult<Vec<String>> {
        self.value_multi_option
            .get()
            .map(|options| options.iter().map(|option| option.option.clone()).collect())
            .ok_or_else(|| {
                OrmError::Attribute(format!("options of value {:?} are not loaded", self.id))
            })
    }

    /// The file column matching the attribute type
    pub fn file(&self) -> Option<&FieldFile> {
        match self.attribute.get().map(|attribute| attribute.attr_type) {
            Some(AttributeType::Image) => self.value_image.as_ref(),
            _ => self.value_file.as_ref(),
        }
    }

    /// The stored value in its typed form, `Null` when the column is empty
    pub fn raw_value(&self) -> OrmResult<AttributeValue> {
        let attribute = self.attribute()?;
        let value = match attribute.attr_type {
            AttributeType::Text => self.value_text.clone().map(AttributeValue::Text),
            AttributeType::Richtext => self.value_richtext.clone().map(AttributeValue::Text),
            AttributeType::Integer => self.value_integer.map(AttributeValue::Integer),
            AttributeType::Boolean => self.value_boolean.map(AttributeValue::Boolean),
            AttributeType::Float => self.value_float.map(AttributeValue::Float),
            AttributeType::Date => self.value_date.map(AttributeValue::Date),
            AttributeType::Datetime => self.value_datetime.map(AttributeValue::DateTime),
            AttributeType::Option => Some(AttributeValue::Text(self.option_label()?)),
            AttributeType::MultiOption => Some(AttributeValue::List(
                self.multi_option_labels()?
                    .into_iter()
                    .map(AttributeValue::Text)
                    .collect(),
            )),
            AttributeType::Entity => self
                .value_entity
                .as_ref()
                .and_then(|entity| entity.json.clone())
                .map(AttributeValue::Json),
            AttributeType::File | AttributeType::Image => {
                self.file().map(|file| AttributeValue::Text(file.name.clone()))
            }
        };
        Ok(value.unwrap_or(AttributeValue::Null))
    }

    /// Text representation of whatever column holds a value
    pub fn value_as_text(&self) -> String {
        if let Ok(value) = self.raw_value() {
            if !value.is_null() {
                return value.as_text();
            }
        }

        self.value_text
            .clone()
            .or_else(|| self.value_richtext.clone())
            .or_else(|| self.value_integer.map(|v| v.to_string()))
            .or_else(|| self.value_boolean.map(|v| v.to_string()))
            .or_else(|| self.value_float.map(|v| v.to_string()))
            .or_else(|| self.value_date.map(|v| v.to_string()))
            .or_else(|| self.value_datetime.map(|v| v.to_rfc3339()))
            .or_else(|| self.value_file.as_ref().map(|f| f.name.clone()))
            .or_else(|| self.value_image.as_ref().map(|f| f.name.clone()))
            .unwrap_or_default()
    }
}

impl Model for ProductAttributeValue {
    fn table_name() -> &'static str {
        "catalogue_productattributevalue"
    }

    fn primary_key(&self) -> Option<i64> {
        self.id
    }

    fn set_primary_key(&mut self, key: i64) {
        self.id = Some(key);
    }

    fn reset_relations(&mut self) {
        self.attribute = Related::Deferred;
        self.value_option = Related::Deferred;
        self.value_multi_option = Related::Deferred;
    }
}

/// Attribute values of a product before they are written as value rows.
///
/// The container has to be initialised with the attribute definitions of
/// the product's effective class before values can be set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductAttributesContainer {
    initialised: bool,
    attributes: Vec<ProductAttribute>,
    values: BTreeMap<String, AttributeValue>,
}

impl ProductAttributesContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the attribute definitions the product may carry
    pub fn initialize(&mut self, attributes: Vec<ProductAttribute>) {
        self.attributes = attributes;
        self.initialised = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialised
    }

    pub fn attributes(&self) -> &[ProductAttribute] {
        &self.attributes
    }

    /// Set a value by attribute code, coercing it to the declared type
    pub fn set(&mut self, code: &str, value: AttributeValue) -> OrmResult<()> {
        if !self.initialised {
            return Err(OrmError::Attribute(format!(
                "cannot set '{}' before the attribute container is initialised",
                code
            )));
        }

        let attribute = self
            .attributes
            .iter()
            .find(|attribute| attribute.code == code)
            .ok_or_else(|| OrmError::Attribute(format!("product has no attribute '{}'", code)))?;

        let coerced = attribute.coerce(value)?;
        self.values.insert(code.to_string(), coerced);
        Ok(())
    }

    pub fn get(&self, code: &str) -> Option<&AttributeValue> {
        self.values.get(code)
    }

    pub fn values(&self) -> &BTreeMap<String, AttributeValue> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value rows for every attribute that was set
    pub fn to_value_rows(
        &self,
        product_id: i64,
        options: &[AttributeOption],
    ) -> OrmResult<Vec<ProductAttributeValue>> {
        self.attributes
            .iter()
            .filter_map(|attribute| {
                self.values
                    .get(&attribute.code)
                    .map(|value| ProductAttributeValue::from_native(attribute, product_id, value, options))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attribute(id: i64, code: &str, attr_type: AttributeType) -> ProductAttribute {
        ProductAttribute {
            id: Some(id),
            option_group_id: Some(1),
            ..ProductAttribute::new(code, code, attr_type)
        }
    }

    fn options() -> Vec<AttributeOption> {
        vec![
            AttributeOption {
                id: Some(10),
                group_id: 1,
                option: "Red".to_string(),
            },
            AttributeOption {
                id: Some(11),
                group_id: 1,
                option: "Blue".to_string(),
            },
        ]
    }

    #[test]
    fn test_coerce_by_type() {
        let size = attribute(1, "size", AttributeType::Integer);
        assert_eq!(size.coerce("42".into()).unwrap(), AttributeValue::Integer(42));
        assert!(size.coerce("big".into()).is_err());

        let launched = attribute(2, "launched", AttributeType::Date);
        assert_eq!(
            launched.coerce("2023-04-01".into()).unwrap(),
            AttributeValue::Date(NaiveDate::from_ymd_opt(2023, 4, 1).unwrap())
        );

        let weight = attribute(3, "weight", AttributeType::Float);
        assert_eq!(weight.coerce(3i64.into()).unwrap(), AttributeValue::Float(3.0));
    }

    #[test]
    fn test_container_requires_initialisation() {
        let mut container = ProductAttributesContainer::new();
        assert!(container.set("colour", "Red".into()).is_err());

        container.initialize(vec![attribute(1, "colour", AttributeType::Option)]);
        container.set("colour", "Red".into()).unwrap();
        assert_eq!(container.get("colour"), Some(&AttributeValue::Text("Red".to_string())));
        assert!(container.set("unknown", "x".into()).is_err());
    }

    #[test]
    fn test_value_rows_resolve_options() {
        let mut container = ProductAttributesContainer::new();
        container.initialize(vec![
            attribute(1, "colour", AttributeType::Option),
            attribute(2, "colours", AttributeType::MultiOption),
            attribute(3, "material", AttributeType::Text),
        ]);
        container.set("colour", "Blue".into()).unwrap();
        container
            .set("colours", AttributeValue::List(vec!["Red".into(), "Blue".into()]))
            .unwrap();

        let rows = container.to_value_rows(5, &options()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value_option_id, Some(11));
        assert_eq!(rows[0].option_label().unwrap(), "Blue");
        assert_eq!(rows[1].value_multi_option_ids, vec![10, 11]);
        assert_eq!(rows[1].multi_option_labels().unwrap(), vec!["Red", "Blue"]);
    }

    #[test]
    fn test_unknown_option_label_fails() {
        let colour = attribute(1, "colour", AttributeType::Option);
        let result =
            ProductAttributeValue::from_native(&colour, 5, &"Green".into(), &options());
        assert!(matches!(result, Err(OrmError::Attribute(_))));
    }

    #[test]
    fn test_value_as_text_without_attribute() {
        let row = ProductAttributeValue {
            value_integer: Some(7),
            ..Default::default()
        };
        assert!(row.raw_value().is_err());
        assert_eq!(row.value_as_text(), "7");
    }

    #[test]
    fn test_untagged_value_serialization() {
        let value = AttributeValue::List(vec!["a".into(), AttributeValue::Integer(2)]);
        assert_eq!(serde_json::to_value(&value).unwrap(), json!(["a", 2]));

        let parsed: AttributeValue = serde_json::from_value(json!({"id": 3})).unwrap();
        assert_eq!(parsed, AttributeValue::Json(json!({"id": 3})));
        let parsed: AttributeValue = serde_json::from_value(json!(null)).unwrap();
        assert!(parsed.is_null());
    }
}
