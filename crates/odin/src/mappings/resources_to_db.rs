//! Bulk persistence of product resources
//!
//! Resources are validated, mapped to unsaved products, matched against
//! stored rows by natural key and written with bulk statements. Related
//! rows (images, categories, stock records, recommendations and attribute
//! values) are saved once the products have primary keys.

use std::collections::{BTreeSet, HashMap, HashSet};

use catalogue_orm::{
    AttributeOption, Category, Database, Model, OrmError, Partner, Product,
    ProductAttributeValue, ProductCategory, ProductClass, ProductImage, ProductRecommendation,
    ProductStructure, StockRecord, Stored,
};

use crate::config::{OdinConfig, DEFAULT_BATCH_SIZE, DEFAULT_RESOURCES_TO_DB_CHUNK_SIZE};
use crate::error::{OdinError, OdinResult};
use crate::mappings::catalogue::ProductRelatedValues;
use crate::mappings::constants::{
    fields_for, IdentifierMapping, ModelField, ALL_CATALOGUE_FIELDS, CATEGORY, PRODUCT,
    PRODUCT_CLASS, PRODUCT_IMAGE, STOCKRECORD,
};
use crate::mappings::model_mapper::{ModelMapping, ModelMappingContext};
use crate::resources::ProductResource;
use crate::utils::{identifier_values, in_bulk, validate_resources, ErrorLog, QueryCounter};

const ATTRIBUTE_VALUE_FIELDS: &[&str] = &[
    "value_text",
    "value_richtext",
    "value_integer",
    "value_boolean",
    "value_float",
    "value_date",
    "value_datetime",
    "value_option_id",
    "value_multi_option_ids",
    "value_file",
    "value_image",
    "value_entity",
];

/// Options of [`products_to_db`](crate::mappings::products_to_db)
#[derive(Debug, Clone, PartialEq)]
pub struct ProductsToDbOptions {
    /// Columns written when a stored row is updated
    pub fields_to_update: Vec<ModelField>,
    /// Natural keys used to match resources against stored rows
    pub identifier_mapping: IdentifierMapping,
    /// Delete related rows of saved products that are not in the resources
    pub delete_related: bool,
    /// Run model validation before saving
    pub clean_instances: bool,
    /// Abort on the first failing record instead of collecting errors
    pub strict: bool,
    pub chunk_size: usize,
    pub batch_size: usize,
}

impl Default for ProductsToDbOptions {
    fn default() -> Self {
        Self {
            fields_to_update: ALL_CATALOGUE_FIELDS.to_vec(),
            identifier_mapping: IdentifierMapping::default(),
            delete_related: false,
            clean_instances: true,
            strict: false,
            chunk_size: DEFAULT_RESOURCES_TO_DB_CHUNK_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ProductsToDbOptions {
    pub fn from_config(config: &OdinConfig) -> Self {
        Self {
            chunk_size: config.resources_to_db_chunk_size,
            batch_size: config.batch_size,
            ..Self::default()
        }
    }

    pub fn with_fields_to_update(mut self, fields: impl IntoIterator<Item = ModelField>) -> Self {
        self.fields_to_update = fields.into_iter().collect();
        self
    }

    pub fn with_identifier_mapping(mut self, mapping: IdentifierMapping) -> Self {
        self.identifier_mapping = mapping;
        self
    }

    pub fn with_delete_related(mut self, delete_related: bool) -> Self {
        self.delete_related = delete_related;
        self
    }

    pub fn with_clean_instances(mut self, clean_instances: bool) -> Self {
        self.clean_instances = clean_instances;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Rows written (or deleted) per related table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelatedCounts {
    pub product_classes: usize,
    pub parents: usize,
    pub images: usize,
    pub categories: usize,
    pub product_categories: usize,
    pub stockrecords: usize,
    pub recommendations: usize,
    pub attribute_values: usize,
}

/// Outcome of a bulk save
#[derive(Debug, Default)]
pub struct SaveReport {
    pub created: usize,
    pub updated: usize,
    /// Resources that were not saved
    pub skipped: usize,
    pub related: RelatedCounts,
    pub deleted: RelatedCounts,
    pub errors: ErrorLog,
}

impl SaveReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Mapped products and their pending related values, kept index aligned
#[derive(Default)]
struct Staged {
    products: Vec<Product>,
    related: Vec<ProductRelatedValues>,
}

impl Staged {
    fn push(&mut self, product: Product, related: ProductRelatedValues) {
        self.products.push(product);
        self.related.push(related);
    }

    fn len(&self) -> usize {
        self.products.len()
    }

    fn iter(&self) -> impl Iterator<Item = (&Product, &ProductRelatedValues)> {
        self.products.iter().zip(self.related.iter())
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (&mut Product, &ProductRelatedValues)> {
        self.products.iter_mut().zip(self.related.iter())
    }

    /// Keep the products `keep` accepts
    fn try_retain<F>(&mut self, mut keep: F) -> OdinResult<()>
    where
        F: FnMut(&mut Product, &ProductRelatedValues) -> OdinResult<bool>,
    {
        let products = std::mem::take(&mut self.products);
        let related = std::mem::take(&mut self.related);
        for (mut product, values) in products.into_iter().zip(related) {
            if keep(&mut product, &values)? {
                self.push(product, values);
            }
        }
        Ok(())
    }
}

/// Bookkeeping shared by the stages of one save
struct SaveRun<'a> {
    db: &'a Database,
    options: &'a ProductsToDbOptions,
    report: SaveReport,
}

impl<'a> SaveRun<'a> {
    /// Log a per-record failure, or abort in strict mode
    fn record_error(&mut self, error: impl Into<OdinError>, product: &Product) -> OdinResult<()> {
        let error = error.into();
        if self.options.strict {
            return Err(error);
        }
        tracing::warn!(upc = ?product.upc, %error, "record skipped");
        self.report.errors.add_error(error, product);
        Ok(())
    }

    fn bulk_create<M: Stored>(&self, rows: Vec<M>) -> OdinResult<Vec<M>> {
        let mut created = Vec::with_capacity(rows.len());
        let mut rows = rows.into_iter();
        loop {
            let chunk: Vec<M> = rows.by_ref().take(self.options.chunk_size.max(1)).collect();
            if chunk.is_empty() {
                break;
            }
            let saved = self.db.bulk_create(chunk).map_err(|source| OdinError::BulkSave {
                model: M::table_name(),
                source,
            })?;
            created.extend(saved);
        }
        Ok(created)
    }

    fn bulk_update<M: Stored>(&self, rows: &[M], fields: &[&str]) -> OdinResult<usize> {
        let mut updated = 0;
        for chunk in rows.chunks(self.options.chunk_size.max(1)) {
            updated += self
                .db
                .bulk_update(chunk, fields)
                .map_err(|source| OdinError::BulkSave {
                    model: M::table_name(),
                    source,
                })?;
        }
        Ok(updated)
    }

    /// Create rows missing from the database and update the stored ones
    /// that `update_if` accepts. Rows sharing a natural key are written
    /// once.
    fn upsert<M, F>(&self, rows: Vec<M>, identifiers: &[&str], fields: &[&str], update_if: F) -> OdinResult<Upserted>
    where
        M: Stored,
        F: Fn(&M) -> bool,
    {
        let mut seen = HashSet::new();
        let unique: Vec<M> = rows
            .into_iter()
            .filter(|row| {
                let key = identifier_values(row, identifiers);
                key.iter().all(String::is_empty) || seen.insert(key)
            })
            .collect();

        let mut ids = in_bulk(self.db, &unique, identifiers, self.options.batch_size);
        let mut to_update = Vec::new();
        let mut to_create = Vec::new();
        for mut row in unique {
            match ids.get(&identifier_values(&row, identifiers)) {
                Some(&id) => {
                    if update_if(&row) {
                        row.set_primary_key(id);
                        to_update.push(row);
                    }
                }
                None => to_create.push(row),
            }
        }

        let updated = self.bulk_update(&to_update, fields)?;
        let created = self.bulk_create(to_create)?;
        for row in &created {
            if let Some(id) = row.primary_key() {
                ids.insert(identifier_values(row, identifiers), id);
            }
        }

        tracing::debug!(
            table = M::table_name(),
            created = created.len(),
            updated,
            "upserted rows"
        );
        Ok(Upserted {
            ids,
            created: created.len(),
            updated,
        })
    }
}

struct Upserted {
    /// Natural key -> primary key of every row in the batch
    ids: HashMap<Vec<String>, i64>,
    created: usize,
    updated: usize,
}

impl Upserted {
    fn written(&self) -> usize {
        self.created + self.updated
    }

    fn contains(&self, key: &[String]) -> bool {
        self.ids.contains_key(key)
    }
}

fn key_with<'k>(owner: &'k str, identifiers: &[&'k str]) -> Vec<&'k str> {
    let mut key = Vec::with_capacity(identifiers.len() + 1);
    key.push(owner);
    key.extend_from_slice(identifiers);
    key
}

/// Validate, map and persist product resources with mapping `M`
pub fn resources_to_db<M>(
    db: &Database,
    resources: Vec<ProductResource>,
    options: &ProductsToDbOptions,
) -> OdinResult<(Vec<Product>, SaveReport)>
where
    M: ModelMapping<Source = ProductResource, Model = Product, Related = ProductRelatedValues>,
{
    let counter = QueryCounter::start(db, "products_to_db");
    let product_identifiers = options.identifier_mapping.get(PRODUCT);
    let mut run = SaveRun {
        db,
        options,
        report: SaveReport {
            errors: ErrorLog::new(product_identifiers.iter().copied()),
            ..SaveReport::default()
        },
    };

    let total = resources.len();
    let (resources, invalid) = validate_resources(resources, product_identifiers);
    if options.strict {
        if let Some(first) = invalid.into_inner().into_iter().next() {
            return Err(first.error);
        }
    } else {
        run.report.skipped += invalid.len();
        run.report.errors.extend(invalid);
    }

    let context = ModelMappingContext::new(db.media());
    let mut staged = Staged::default();
    for resource in &resources {
        match M::apply(resource, &context) {
            Ok(mapped) => staged.push(mapped.instance, mapped.related),
            Err(error) => {
                if options.strict {
                    return Err(error.into());
                }
                run.report.errors.add_error(error, resource);
                run.report.skipped += 1;
            }
        }
    }
    drop(resources);

    save_product_classes(&mut run, &mut staged)?;
    save_parents(&mut run, &mut staged)?;
    match_existing_products(&run, &mut staged);
    initialise_attributes(&mut run, &mut staged)?;
    if options.clean_instances {
        clean_products(&mut run, &mut staged)?;
    }
    save_products(&mut run, &mut staged)?;

    let saved_ids: HashSet<i64> = staged.products.iter().filter_map(|product| product.id).collect();
    save_images(&mut run, &staged, &saved_ids)?;
    save_categories(&mut run, &staged, &saved_ids)?;
    save_stockrecords(&mut run, &staged, &saved_ids)?;
    save_recommendations(&mut run, &staged, &saved_ids)?;
    save_attribute_values(&mut run, &staged, &saved_ids)?;

    let report = run.report;
    tracing::info!(
        resources = total,
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        errors = report.errors.len(),
        queries = counter.count(),
        "products saved"
    );
    Ok((staged.products, report))
}

fn save_product_classes(run: &mut SaveRun<'_>, staged: &mut Staged) -> OdinResult<()> {
    let options = run.options;
    let classes: Vec<ProductClass> = staged
        .related
        .iter()
        .filter_map(|related| related.product_class.clone())
        .collect();
    if classes.is_empty() {
        return Ok(());
    }

    let identifiers = options.identifier_mapping.get(PRODUCT_CLASS);
    let fields = fields_for(&options.fields_to_update, PRODUCT_CLASS);
    let upserted = run.upsert(classes, identifiers, &fields, |_| true)?;
    run.report.related.product_classes += upserted.written();

    for (product, related) in staged.iter_mut() {
        if let Some(class) = &related.product_class {
            product.product_class_id = upserted.ids.get(&identifier_values(class, identifiers)).copied();
        }
    }
    Ok(())
}

/// Parents referenced by children are created as stubs when missing and
/// never updated from a child
fn save_parents(run: &mut SaveRun<'_>, staged: &mut Staged) -> OdinResult<()> {
    let options = run.options;
    let parents: Vec<Product> = staged
        .related
        .iter()
        .filter_map(|related| related.parent.clone())
        .collect();
    if parents.is_empty() {
        return Ok(());
    }

    let identifiers = options.identifier_mapping.get(PRODUCT);
    let upserted = run.upsert(parents, identifiers, &[], |_| false)?;
    run.report.related.parents += upserted.created;

    for (product, related) in staged.iter_mut() {
        if let Some(parent) = &related.parent {
            product.parent_id = upserted.ids.get(&identifier_values(parent, identifiers)).copied();
        }
    }
    Ok(())
}

fn match_existing_products(run: &SaveRun<'_>, staged: &mut Staged) {
    let (db, options) = (run.db, run.options);
    let identifiers = options.identifier_mapping.get(PRODUCT);
    let existing = in_bulk(db, &staged.products, identifiers, options.batch_size);
    for product in &mut staged.products {
        if let Some(&id) = existing.get(&identifier_values(product, identifiers)) {
            product.id = Some(id);
        }
    }
    tracing::debug!(matched = existing.len(), total = staged.len(), "matched stored products");
}

/// Initialise attribute containers from each product's effective class
/// and set the resource values
fn initialise_attributes(run: &mut SaveRun<'_>, staged: &mut Staged) -> OdinResult<()> {
    let db = run.db;
    if staged.related.iter().all(|related| related.attributes.is_empty()) {
        return Ok(());
    }

    // Classes of parents saved in this batch, then of stored parents
    let mut parent_classes: HashMap<i64, Option<i64>> = staged
        .products
        .iter()
        .filter_map(|product| product.id.map(|id| (id, product.product_class_id)))
        .collect();
    let missing_parents: Vec<i64> = staged
        .iter()
        .filter(|(product, related)| product.is_child() && !related.attributes.is_empty())
        .filter_map(|(product, _)| product.parent_id)
        .filter(|id| !parent_classes.contains_key(id))
        .collect();
    for parent in db.products_by_ids(&missing_parents) {
        if let Some(id) = parent.id {
            parent_classes.insert(id, parent.product_class_id);
        }
    }

    let effective_class = |product: &Product| match product.structure {
        ProductStructure::Child => product
            .parent_id
            .and_then(|id| parent_classes.get(&id).copied().flatten()),
        _ => product.product_class_id,
    };

    let class_ids: BTreeSet<i64> = staged
        .iter()
        .filter(|(_, related)| !related.attributes.is_empty())
        .filter_map(|(product, _)| effective_class(product))
        .collect();
    let class_ids: Vec<i64> = class_ids.into_iter().collect();
    let mut attributes_by_class: HashMap<i64, Vec<_>> = HashMap::new();
    for attribute in db.attributes_for_classes(&class_ids) {
        if let Some(class_id) = attribute.product_class_id {
            attributes_by_class.entry(class_id).or_default().push(attribute);
        }
    }

    let mut skipped = 0;
    let classes: Vec<Option<i64>> = staged.products.iter().map(|product| effective_class(product)).collect();
    let mut index = 0;
    staged.try_retain(|product, related| {
        let class_id = classes[index];
        index += 1;
        if related.attributes.is_empty() {
            return Ok(true);
        }

        let attributes = class_id
            .and_then(|id| attributes_by_class.get(&id).cloned())
            .unwrap_or_default();
        product.attr.initialize(attributes);
        for (code, value) in &related.attributes {
            if let Err(error) = product.attr.set(code, value.clone()) {
                run.record_error(error, product)?;
                skipped += 1;
                return Ok(false);
            }
        }
        Ok(true)
    })?;
    run.report.skipped += skipped;
    Ok(())
}

fn clean_products(run: &mut SaveRun<'_>, staged: &mut Staged) -> OdinResult<()> {
    let mut skipped = 0;
    staged.try_retain(|product, _| match product.clean() {
        Ok(()) => Ok(true),
        Err(error) => {
            run.record_error(error, product)?;
            skipped += 1;
            Ok(false)
        }
    })?;
    run.report.skipped += skipped;
    Ok(())
}

fn save_products(run: &mut SaveRun<'_>, staged: &mut Staged) -> OdinResult<()> {
    let options = run.options;
    let fields = fields_for(&options.fields_to_update, PRODUCT);
    let existing: Vec<Product> = staged
        .products
        .iter()
        .filter(|product| product.id.is_some())
        .cloned()
        .collect();
    run.bulk_update(&existing, &fields)?;
    run.report.updated += existing.len();

    let new_indexes: Vec<usize> = staged
        .products
        .iter()
        .enumerate()
        .filter(|(_, product)| product.id.is_none())
        .map(|(index, _)| index)
        .collect();
    let to_create: Vec<Product> = new_indexes
        .iter()
        .map(|&index| staged.products[index].clone())
        .collect();
    let created = run.bulk_create(to_create)?;
    run.report.created += created.len();
    for (index, product) in new_indexes.into_iter().zip(created) {
        staged.products[index].id = product.id;
    }
    Ok(())
}

fn save_images(run: &mut SaveRun<'_>, staged: &Staged, saved_ids: &HashSet<i64>) -> OdinResult<()> {
    let (db, options) = (run.db, run.options);
    let mut images = Vec::new();
    for (product, related) in staged.iter() {
        let Some(product_id) = product.id else { continue };
        images.extend(related.images.iter().cloned().map(|mut image| {
            image.product_id = product_id;
            image
        }));
    }

    let key = key_with("product_id", options.identifier_mapping.get(PRODUCT_IMAGE));
    let fields = fields_for(&options.fields_to_update, PRODUCT_IMAGE);
    let upserted = run.upsert(images, &key, &fields, |_| true)?;
    run.report.related.images += upserted.written();

    if options.delete_related && !saved_ids.is_empty() {
        run.report.deleted.images += db.delete_where(|image: &ProductImage| {
            saved_ids.contains(&image.product_id) && !upserted.contains(&identifier_values(image, &key))
        });
    }
    Ok(())
}

fn save_categories(run: &mut SaveRun<'_>, staged: &Staged, saved_ids: &HashSet<i64>) -> OdinResult<()> {
    let (db, options) = (run.db, run.options);
    let categories: Vec<Category> = staged
        .iter()
        .filter(|(product, _)| product.id.is_some())
        .flat_map(|(_, related)| related.categories.iter().cloned())
        .collect();

    let identifiers = options.identifier_mapping.get(CATEGORY);
    let fields = fields_for(&options.fields_to_update, CATEGORY);
    // A bare code references an existing category without touching it
    let upserted = run.upsert(categories, identifiers, &fields, |category| !category.name.is_empty())?;
    run.report.related.categories += upserted.written();

    let mut links = Vec::new();
    for (product, related) in staged.iter() {
        let Some(product_id) = product.id else { continue };
        for category in &related.categories {
            if let Some(&category_id) = upserted.ids.get(&identifier_values(category, identifiers)) {
                links.push(ProductCategory::new(product_id, category_id));
            }
        }
    }

    let key = ["product_id", "category_id"];
    let linked = run.upsert(links, &key, &[], |_| false)?;
    run.report.related.product_categories += linked.created;

    if options.delete_related && !saved_ids.is_empty() {
        run.report.deleted.product_categories += db.delete_where(|link: &ProductCategory| {
            saved_ids.contains(&link.product_id) && !linked.contains(&identifier_values(link, &key))
        });
    }
    Ok(())
}

fn save_stockrecords(run: &mut SaveRun<'_>, staged: &Staged, saved_ids: &HashSet<i64>) -> OdinResult<()> {
    let (db, options) = (run.db, run.options);
    let partner_codes: HashSet<&str> = staged
        .iter()
        .filter(|(product, _)| product.id.is_some())
        .filter_map(|(_, related)| related.stockrecord.as_ref())
        .map(|draft| draft.partner_code.as_str())
        .collect();
    let partners: HashMap<String, i64> = if partner_codes.is_empty() {
        HashMap::new()
    } else {
        db.filter(|partner: &Partner| partner_codes.contains(partner.code.as_str()))
            .into_iter()
            .filter_map(|partner| partner.id.map(|id| (partner.code, id)))
            .collect()
    };

    let mut records = Vec::new();
    for (product, related) in staged.iter() {
        let (Some(product_id), Some(draft)) = (product.id, &related.stockrecord) else {
            continue;
        };
        match partners.get(&draft.partner_code) {
            Some(&partner_id) => {
                let mut record = draft.record.clone();
                record.product_id = product_id;
                record.partner_id = partner_id;
                records.push(record);
            }
            None => run.record_error(
                OrmError::NotFound(format!("{} code={}", Partner::table_name(), draft.partner_code)),
                product,
            )?,
        }
    }

    let identifiers = options.identifier_mapping.get(STOCKRECORD);
    let fields = fields_for(&options.fields_to_update, STOCKRECORD);
    let upserted = run.upsert(records, identifiers, &fields, |_| true)?;
    run.report.related.stockrecords += upserted.written();

    if options.delete_related && !saved_ids.is_empty() {
        run.report.deleted.stockrecords += db.delete_where(|record: &StockRecord| {
            saved_ids.contains(&record.product_id)
                && !upserted.contains(&identifier_values(record, identifiers))
        });
    }
    Ok(())
}

fn save_recommendations(run: &mut SaveRun<'_>, staged: &Staged, saved_ids: &HashSet<i64>) -> OdinResult<()> {
    let (db, options) = (run.db, run.options);
    let upcs: HashSet<&str> = staged
        .iter()
        .filter(|(product, _)| product.id.is_some())
        .flat_map(|(_, related)| related.recommended_products.iter())
        .filter_map(|stub| stub.upc.as_deref())
        .collect();
    let products: HashMap<String, i64> = if upcs.is_empty() {
        HashMap::new()
    } else {
        db.filter(|product: &Product| product.upc.as_deref().is_some_and(|upc| upcs.contains(upc)))
            .into_iter()
            .filter_map(|product| Some((product.upc?, product.id?)))
            .collect()
    };

    let mut recommendations = Vec::new();
    for (product, related) in staged.iter() {
        let Some(primary_id) = product.id else { continue };
        let total = related.recommended_products.len();
        for (index, stub) in related.recommended_products.iter().enumerate() {
            let upc = stub.upc.clone().unwrap_or_default();
            match products.get(&upc) {
                Some(&recommendation_id) => recommendations.push(ProductRecommendation {
                    id: None,
                    primary_id,
                    recommendation_id,
                    ranking: i16::try_from(total - index).unwrap_or(i16::MAX),
                }),
                None => run.record_error(
                    OrmError::NotFound(format!("{} upc={}", Product::table_name(), upc)),
                    product,
                )?,
            }
        }
    }

    let key = ["primary_id", "recommendation_id"];
    let upserted = run.upsert(recommendations, &key, &["ranking"], |_| true)?;
    run.report.related.recommendations += upserted.written();

    if options.delete_related && !saved_ids.is_empty() {
        run.report.deleted.recommendations += db.delete_where(|link: &ProductRecommendation| {
            saved_ids.contains(&link.primary_id) && !upserted.contains(&identifier_values(link, &key))
        });
    }
    Ok(())
}

fn save_attribute_values(run: &mut SaveRun<'_>, staged: &Staged, saved_ids: &HashSet<i64>) -> OdinResult<()> {
    let (db, options) = (run.db, run.options);
    let groups: HashSet<i64> = staged
        .products
        .iter()
        .filter(|product| !product.attr.is_empty())
        .flat_map(|product| product.attr.attributes().iter())
        .filter_map(|attribute| attribute.option_group_id)
        .collect();
    let attribute_options: Vec<AttributeOption> = if groups.is_empty() {
        Vec::new()
    } else {
        db.filter(|option: &AttributeOption| groups.contains(&option.group_id))
    };

    let mut values: Vec<ProductAttributeValue> = Vec::new();
    for product in &staged.products {
        let Some(product_id) = product.id else { continue };
        if product.attr.is_empty() {
            continue;
        }
        match product.attr.to_value_rows(product_id, &attribute_options) {
            Ok(rows) => values.extend(rows),
            Err(error) => run.record_error(error, product)?,
        }
    }

    let key = ["product_id", "attribute_id"];
    let upserted = run.upsert(values, &key, ATTRIBUTE_VALUE_FIELDS, |_| true)?;
    run.report.related.attribute_values += upserted.written();

    if options.delete_related && !saved_ids.is_empty() {
        run.report.deleted.attribute_values += db.delete_where(|value: &ProductAttributeValue| {
            saved_ids.contains(&value.product_id) && !upserted.contains(&identifier_values(value, &key))
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappings::catalogue::ProductToModel;
    use crate::resources::{ParentProductResource, ProductClassResource};

    fn resource(upc: &str, title: &str) -> ProductResource {
        ProductResource {
            upc: Some(upc.to_string()),
            title: title.to_string(),
            product_class: Some(ProductClassResource {
                slug: "mugs".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_options_from_config() {
        let config = OdinConfig {
            resources_to_db_chunk_size: 50,
            batch_size: 10,
            ..OdinConfig::default()
        };
        let options = ProductsToDbOptions::from_config(&config);
        assert_eq!(options.chunk_size, 50);
        assert_eq!(options.batch_size, 10);
        assert!(options.clean_instances);
        assert!(!options.strict);
    }

    #[test]
    fn test_chunked_bulk_create() {
        let db = Database::new();
        let options = ProductsToDbOptions {
            chunk_size: 2,
            ..ProductsToDbOptions::default()
        };
        let resources = vec![resource("1", "A"), resource("2", "B"), resource("3", "C")];

        let counter = QueryCounter::start(&db, "chunks");
        let (products, report) = resources_to_db::<ProductToModel>(&db, resources, &options).unwrap();
        assert_eq!(products.len(), 3);
        assert_eq!(report.created, 3);
        let inserts = counter
            .queries()
            .into_iter()
            .filter(|query| query.starts_with("INSERT INTO catalogue_product "))
            .count();
        assert_eq!(inserts, 2);
    }

    #[test]
    fn test_child_without_stored_parent_creates_stub() {
        let db = Database::new();
        let child = ProductResource {
            upc: Some("c1".to_string()),
            structure: ProductStructure::Child,
            parent: Some(ParentProductResource { upc: "p1".to_string() }),
            ..Default::default()
        };

        let (products, report) =
            resources_to_db::<ProductToModel>(&db, vec![child], &ProductsToDbOptions::default()).unwrap();
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert_eq!(report.related.parents, 1);

        let parent = db
            .first(|product: &Product| product.upc.as_deref() == Some("p1"))
            .unwrap();
        assert_eq!(parent.structure, ProductStructure::Parent);
        assert_eq!(products[0].parent_id, parent.id);
    }
}
