//! In-memory catalogue database
//!
//! Tables are plain ordered maps guarded by one `RwLock`. Each public
//! operation stands for a single SQL statement and records exactly one
//! entry in the query log, so callers can assert on query counts the same
//! way they would against a real connection.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{OrmError, OrmResult};
use crate::files::MediaStorage;
use crate::loading::{LazyLoadTracker, QueryLog};
use crate::model::{Model, Related};
use crate::models::{
    AttributeOption, AttributeOptionGroup, BillingAddress, Category, Country, Partner, Product,
    ProductAttribute, ProductAttributeValue, ProductCategory, ProductClass, ProductImage,
    ProductRecommendation, ShippingAddress, StockRecord,
};

/// Rows of one model keyed by primary key
#[derive(Debug, Clone)]
pub struct Table<M> {
    rows: BTreeMap<i64, M>,
    next_id: i64,
}

impl<M> Default for Table<M> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<M: Model> Table<M> {
    /// Store a row, assigning the next primary key when it has none
    fn insert(&mut self, mut row: M) -> OrmResult<M> {
        let id = match row.primary_key() {
            Some(id) if self.rows.contains_key(&id) => {
                return Err(OrmError::Validation(format!(
                    "duplicate key value violates unique constraint \"{}_pkey\" (id={})",
                    M::table_name(),
                    id
                )))
            }
            Some(id) => id,
            None => self.next_id,
        };
        self.next_id = self.next_id.max(id + 1);

        row.set_primary_key(id);
        let mut stored = row.clone();
        stored.reset_relations();
        self.rows.insert(id, stored);
        Ok(row)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&M> {
        self.rows.get(&id)
    }

    pub fn rows(&self) -> impl Iterator<Item = &M> {
        self.rows.values()
    }
}

/// All catalogue tables
#[derive(Debug, Default)]
pub struct Tables {
    pub product_classes: Table<ProductClass>,
    pub products: Table<Product>,
    pub categories: Table<Category>,
    pub product_categories: Table<ProductCategory>,
    pub images: Table<ProductImage>,
    pub partners: Table<Partner>,
    pub stockrecords: Table<StockRecord>,
    pub attributes: Table<ProductAttribute>,
    pub option_groups: Table<AttributeOptionGroup>,
    pub options: Table<AttributeOption>,
    pub attribute_values: Table<ProductAttributeValue>,
    pub recommendations: Table<ProductRecommendation>,
    pub countries: Table<Country>,
    pub billing_addresses: Table<BillingAddress>,
    pub shipping_addresses: Table<ShippingAddress>,
}

/// A model with a table in [`Tables`]
pub trait Stored: Model {
    fn table(tables: &Tables) -> &Table<Self>;
    fn table_mut(tables: &mut Tables) -> &mut Table<Self>;
}

macro_rules! stored {
    ($($model:ty => $field:ident),* $(,)?) => {
        $(
            impl Stored for $model {
                fn table(tables: &Tables) -> &Table<Self> {
                    &tables.$field
                }

                fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
                    &mut tables.$field
                }
            }
        )*
    };
}

stored! {
    ProductClass => product_classes,
    Product => products,
    Category => categories,
    ProductCategory => product_categories,
    ProductImage => images,
    Partner => partners,
    StockRecord => stockrecords,
    ProductAttribute => attributes,
    AttributeOptionGroup => option_groups,
    AttributeOption => options,
    ProductAttributeValue => attribute_values,
    ProductRecommendation => recommendations,
    Country => countries,
    BillingAddress => billing_addresses,
    ShippingAddress => shipping_addresses,
}

/// In-memory database handle
#[derive(Debug, Default)]
pub struct Database {
    tables: RwLock<Tables>,
    queries: QueryLog,
    lazy_loads: LazyLoadTracker,
    media: MediaStorage,
}

fn id_list(ids: &[i64]) -> String {
    ids.iter().map(i64::to_string).collect::<Vec<_>>().join(", ")
}

fn unique(ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `media` to resolve file URLs
    pub fn with_media(mut self, media: MediaStorage) -> Self {
        self.media = media;
        self
    }

    /// Warn after `threshold` lazy loads of the same relation
    pub fn with_lazy_load_threshold(mut self, threshold: usize) -> Self {
        self.lazy_loads = LazyLoadTracker::new(threshold);
        self
    }

    pub fn media(&self) -> &MediaStorage {
        &self.media
    }

    pub fn queries(&self) -> &QueryLog {
        &self.queries
    }

    /// Number of queries executed so far
    pub fn query_count(&self) -> usize {
        self.queries.count()
    }

    pub fn lazy_loads(&self) -> &LazyLoadTracker {
        &self.lazy_loads
    }

    pub(crate) fn record_lazy_load(&self, model: &str, relation: &str) {
        self.lazy_loads.record(model, relation);
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    // Generic row operations

    pub fn insert<M: Stored>(&self, row: M) -> OrmResult<M> {
        self.queries
            .record(format!("INSERT INTO {} VALUES (...)", M::table_name()));
        let mut tables = self.write();
        M::table_mut(&mut tables).insert(row)
    }

    /// Insert many rows with one statement. Nothing is executed for an
    /// empty batch.
    pub fn bulk_create<M: Stored>(&self, rows: Vec<M>) -> OrmResult<Vec<M>> {
        if rows.is_empty() {
            return Ok(rows);
        }
        self.queries.record(format!(
            "INSERT INTO {} VALUES ... ({} rows)",
            M::table_name(),
            rows.len()
        ));

        let mut tables = self.write();
        let table = M::table_mut(&mut tables);
        for row in &rows {
            if let Some(id) = row.primary_key() {
                if table.get(id).is_some() {
                    return Err(OrmError::Validation(format!(
                        "duplicate key value violates unique constraint \"{}_pkey\" (id={})",
                        M::table_name(),
                        id
                    )));
                }
            }
        }
        rows.into_iter().map(|row| table.insert(row)).collect()
    }

    /// Update the named columns of stored rows with one statement.
    ///
    /// Every row must carry a primary key of an existing row; the batch is
    /// rejected before anything is written otherwise.
    pub fn bulk_update<M: Stored>(&self, rows: &[M], fields: &[&str]) -> OrmResult<usize> {
        if rows.is_empty() || fields.is_empty() {
            return Ok(0);
        }
        self.queries.record(format!(
            "UPDATE {} SET {} WHERE id IN (...) ({} rows)",
            M::table_name(),
            fields.join(", "),
            rows.len()
        ));

        let mut tables = self.write();
        let table = M::table_mut(&mut tables);

        let mut updated = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row
                .primary_key()
                .ok_or_else(|| OrmError::MissingPrimaryKey(M::table_name().to_string()))?;
            let mut stored = table
                .get(id)
                .cloned()
                .ok_or_else(|| OrmError::NotFound(format!("{} id={}", M::table_name(), id)))?;
            stored.update_fields(row, fields)?;
            stored.reset_relations();
            updated.push((id, stored));
        }

        let count = updated.len();
        for (id, stored) in updated {
            table.rows.insert(id, stored);
        }
        Ok(count)
    }

    pub fn get<M: Stored>(&self, id: i64) -> OrmResult<M> {
        self.queries
            .record(format!("SELECT * FROM {} WHERE id = {}", M::table_name(), id));
        let tables = self.read();
        M::table(&tables)
            .get(id)
            .cloned()
            .ok_or_else(|| OrmError::NotFound(format!("{} id={}", M::table_name(), id)))
    }

    pub fn all<M: Stored>(&self) -> Vec<M> {
        self.filter(|_: &M| true)
    }

    pub fn filter<M, F>(&self, predicate: F) -> Vec<M>
    where
        M: Stored,
        F: Fn(&M) -> bool,
    {
        self.queries
            .record(format!("SELECT * FROM {} WHERE ...", M::table_name()));
        let tables = self.read();
        M::table(&tables)
            .rows()
            .filter(|row| predicate(row))
            .cloned()
            .collect()
    }

    pub fn first<M, F>(&self, predicate: F) -> Option<M>
    where
        M: Stored,
        F: Fn(&M) -> bool,
    {
        self.queries
            .record(format!("SELECT * FROM {} WHERE ... LIMIT 1", M::table_name()));
        let tables = self.read();
        let found = M::table(&tables).rows().find(|row| predicate(row)).cloned();
        found
    }

    pub fn count<M: Stored>(&self) -> usize {
        self.queries
            .record(format!("SELECT COUNT(*) FROM {}", M::table_name()));
        M::table(&self.read()).len()
    }

    /// Delete the matching rows, returning how many were removed
    pub fn delete_where<M, F>(&self, predicate: F) -> usize
    where
        M: Stored,
        F: Fn(&M) -> bool,
    {
        self.queries
            .record(format!("DELETE FROM {} WHERE ...", M::table_name()));
        let mut tables = self.write();
        let table = M::table_mut(&mut tables);
        let before = table.rows.len();
        table.rows.retain(|_, row| !predicate(row));
        before - table.rows.len()
    }

    // Product queries with joins

    /// Select products matching `predicate`, joining the cardinality-1
    /// relations named in `select_related` into the same statement
    pub fn select_products<F>(&self, predicate: F, select_related: &[String]) -> OrmResult<Vec<Product>>
    where
        F: Fn(&Product) -> bool,
    {
        let join_class = select_related.iter().any(|path| path == "product_class");
        let join_parent = select_related
            .iter()
            .any(|path| path == "parent" || path == "parent__product_class");
        let join_parent_class = select_related
            .iter()
            .any(|path| path == "parent__product_class");

        if let Some(unknown) = select_related.iter().find(|path| {
            !matches!(path.as_str(), "product_class" | "parent" | "parent__product_class")
        }) {
            return Err(OrmError::Relationship(format!(
                "Invalid field name(s) given in select_related: '{}'. Choices are: product_class, parent",
                unknown
            )));
        }

        let mut statement = "SELECT * FROM catalogue_product".to_string();
        if join_class {
            statement.push_str(" LEFT JOIN catalogue_productclass");
        }
        if join_parent {
            statement.push_str(" LEFT JOIN catalogue_product parent");
        }
        self.queries.record(statement);

        let tables = self.read();
        let class_of = |id: Option<i64>| id.and_then(|id| tables.product_classes.get(id).cloned());

        let mut products: Vec<Product> = tables
            .products
            .rows()
            .filter(|product| predicate(product))
            .cloned()
            .collect();

        for product in &mut products {
            if join_class {
                product.relations.product_class = Related::Loaded(class_of(product.product_class_id));
            }
            if join_parent {
                let parent = product.parent_id.and_then(|id| tables.products.get(id).cloned());
                let parent = parent.map(|mut parent| {
                    if join_parent_class {
                        parent.relations.product_class =
                            Related::Loaded(class_of(parent.product_class_id));
                    }
                    Box::new(parent)
                });
                product.relations.parent = Related::Loaded(parent);
            }
        }
        Ok(products)
    }

    pub fn products_by_ids(&self, ids: &[i64]) -> Vec<Product> {
        if ids.is_empty() {
            return Vec::new();
        }
        let ids = unique(ids.iter().copied());
        self.queries.record(format!(
            "SELECT * FROM catalogue_product WHERE id IN ({})",
            id_list(&ids)
        ));
        let tables = self.read();
        ids.iter()
            .filter_map(|id| tables.products.get(*id).cloned())
            .collect()
    }

    pub fn product_classes_by_ids(&self, ids: &[i64]) -> Vec<ProductClass> {
        if ids.is_empty() {
            return Vec::new();
        }
        let ids = unique(ids.iter().copied());
        self.queries.record(format!(
            "SELECT * FROM catalogue_productclass WHERE id IN ({})",
            id_list(&ids)
        ));
        let tables = self.read();
        ids.iter()
            .filter_map(|id| tables.product_classes.get(*id).cloned())
            .collect()
    }

    /// Children of the given parents, ordered by primary key
    pub fn children_of(&self, parent_ids: &[i64], public_only: bool) -> Vec<Product> {
        if parent_ids.is_empty() {
            return Vec::new();
        }
        self.queries.record(format!(
            "SELECT * FROM catalogue_product WHERE parent_id IN ({}){}",
            id_list(parent_ids),
            if public_only { " AND is_public" } else { "" }
        ));
        let parents: HashSet<i64> = parent_ids.iter().copied().collect();
        self.read()
            .products
            .rows()
            .filter(|product| {
                product.parent_id.is_some_and(|id| parents.contains(&id))
                    && (!public_only || product.is_public)
            })
            .cloned()
            .collect()
    }

    pub fn images_for(&self, product_ids: &[i64]) -> Vec<ProductImage> {
        if product_ids.is_empty() {
            return Vec::new();
        }
        self.queries.record(format!(
            "SELECT * FROM catalogue_productimage WHERE product_id IN ({}) ORDER BY display_order, id",
            id_list(product_ids)
        ));
        let owners: HashSet<i64> = product_ids.iter().copied().collect();
        let mut images: Vec<ProductImage> = self
            .read()
            .images
            .rows()
            .filter(|image| owners.contains(&image.product_id))
            .cloned()
            .collect();
        images.sort_by_key(|image| (image.display_order, image.id));
        images
    }

    /// Stock records with their partner joined
    pub fn stockrecords_for(&self, product_ids: &[i64]) -> Vec<StockRecord> {
        if product_ids.is_empty() {
            return Vec::new();
        }
        self.queries.record(format!(
            "SELECT * FROM partner_stockrecord INNER JOIN partner_partner WHERE product_id IN ({})",
            id_list(product_ids)
        ));
        let owners: HashSet<i64> = product_ids.iter().copied().collect();
        let tables = self.read();
        tables
            .stockrecords
            .rows()
            .filter(|record| owners.contains(&record.product_id))
            .map(|record| {
                let mut record = record.clone();
                if let Some(partner) = tables.partners.get(record.partner_id) {
                    record.partner = Related::Loaded(partner.clone());
                }
                record
            })
            .collect()
    }

    /// Categories linked to the given products as (product id, category)
    /// pairs, ordered by tree path
    pub fn categories_for(&self, product_ids: &[i64], browsable_only: bool) -> Vec<(i64, Category)> {
        if product_ids.is_empty() {
            return Vec::new();
        }
        self.queries.record(format!(
            "SELECT * FROM catalogue_category INNER JOIN catalogue_productcategory WHERE product_id IN ({}){}",
            id_list(product_ids),
            if browsable_only {
                " AND is_public AND ancestors_are_public"
            } else {
                ""
            }
        ));
        let owners: HashSet<i64> = product_ids.iter().copied().collect();
        let tables = self.read();
        let mut linked: Vec<(i64, Category)> = tables
            .product_categories
            .rows()
            .filter(|link| owners.contains(&link.product_id))
            .filter_map(|link| {
                tables
                    .categories
                    .get(link.category_id)
                    .filter(|category| !browsable_only || category.is_browsable())
                    .map(|category| (link.product_id, category.clone()))
            })
            .collect();
        linked.sort_by(|(_, a), (_, b)| a.path.cmp(&b.path).then(a.id.cmp(&b.id)));
        linked
    }

    /// Attribute values with their attribute and selected options joined
    pub fn attribute_values_for(&self, product_ids: &[i64]) -> Vec<ProductAttributeValue> {
        if product_ids.is_empty() {
            return Vec::new();
        }
        self.queries.record(format!(
            "SELECT * FROM catalogue_productattributevalue INNER JOIN catalogue_productattribute \
             LEFT JOIN catalogue_attributeoption WHERE product_id IN ({})",
            id_list(product_ids)
        ));
        let owners: HashSet<i64> = product_ids.iter().copied().collect();
        let tables = self.read();
        tables
            .attribute_values
            .rows()
            .filter(|value| owners.contains(&value.product_id))
            .map(|value| {
                let mut value = value.clone();
                if let Some(attribute) = tables.attributes.get(value.attribute_id) {
                    value.attribute = Related::Loaded(attribute.clone());
                }
                value.value_option = Related::Loaded(
                    value
                        .value_option_id
                        .and_then(|id| tables.options.get(id).cloned()),
                );
                value.value_multi_option = Related::Loaded(
                    value
                        .value_multi_option_ids
                        .iter()
                        .filter_map(|id| tables.options.get(*id).cloned())
                        .collect(),
                );
                value
            })
            .collect()
    }

    /// Recommended products as (primary id, product) pairs, highest
    /// ranking first
    pub fn recommended_for(&self, product_ids: &[i64]) -> Vec<(i64, Product)> {
        if product_ids.is_empty() {
            return Vec::new();
        }
        self.queries.record(format!(
            "SELECT * FROM catalogue_product INNER JOIN catalogue_productrecommendation WHERE primary_id IN ({})",
            id_list(product_ids)
        ));
        let owners: HashSet<i64> = product_ids.iter().copied().collect();
        let tables = self.read();
        let mut links: Vec<&ProductRecommendation> = tables
            .recommendations
            .rows()
            .filter(|link| owners.contains(&link.primary_id))
            .collect();
        links.sort_by(|a, b| b.ranking.cmp(&a.ranking).then(a.id.cmp(&b.id)));
        links
            .into_iter()
            .filter_map(|link| {
                tables
                    .products
                    .get(link.recommendation_id)
                    .map(|product| (link.primary_id, product.clone()))
            })
            .collect()
    }

    /// Attribute definitions of the given product classes
    pub fn attributes_for_classes(&self, class_ids: &[i64]) -> Vec<ProductAttribute> {
        if class_ids.is_empty() {
            return Vec::new();
        }
        let classes: HashSet<i64> = class_ids.iter().copied().collect();
        self.filter(|attribute: &ProductAttribute| {
            attribute
                .product_class_id
                .is_some_and(|id| classes.contains(&id))
        })
    }
}

/// Group rows by owner id, keeping row order within each group
pub fn group_by_owner<T>(rows: Vec<(i64, T)>) -> HashMap<i64, Vec<T>> {
    let mut grouped: HashMap<i64, Vec<T>> = HashMap::new();
    for (owner, row) in rows {
        grouped.entry(owner).or_default().push(row);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductStructure;

    #[test]
    fn test_insert_assigns_keys_and_logs() {
        let db = Database::new();
        let class = db.insert(ProductClass::new("Shirts", "shirts")).unwrap();
        assert_eq!(class.id, Some(1));
        let other = db.insert(ProductClass::new("Books", "books")).unwrap();
        assert_eq!(other.id, Some(2));
        assert_eq!(db.query_count(), 2);
    }

    #[test]
    fn test_bulk_create_empty_batch_runs_nothing() {
        let db = Database::new();
        let created = db.bulk_create::<ProductClass>(Vec::new()).unwrap();
        assert!(created.is_empty());
        assert_eq!(db.query_count(), 0);
    }

    #[test]
    fn test_bulk_update_only_touches_named_fields() {
        let db = Database::new();
        let mut stored = db
            .bulk_create(vec![ProductClass::new("Shirts", "shirts")])
            .unwrap()
            .remove(0);
        stored.name = "T-Shirts".to_string();
        stored.track_stock = false;

        assert_eq!(db.bulk_update(&[stored.clone()], &["name"]).unwrap(), 1);
        let reloaded: ProductClass = db.get(stored.id.unwrap()).unwrap();
        assert_eq!(reloaded.name, "T-Shirts");
        assert!(reloaded.track_stock);
    }

    #[test]
    fn test_bulk_update_requires_primary_key() {
        let db = Database::new();
        let unsaved = ProductClass::new("Shirts", "shirts");
        assert!(matches!(
            db.bulk_update(&[unsaved], &["name"]),
            Err(OrmError::MissingPrimaryKey(_))
        ));
    }

    #[test]
    fn test_select_products_joins_in_one_query() {
        let db = Database::new();
        let class = db.insert(ProductClass::new("Shirts", "shirts")).unwrap();
        let parent = db
            .insert(Product {
                product_class_id: class.id,
                ..Product::new("Shirt", ProductStructure::Parent)
            })
            .unwrap();
        db.insert(Product {
            parent_id: parent.id,
            ..Product::new("Shirt S", ProductStructure::Child)
        })
        .unwrap();

        let before = db.query_count();
        let products = db
            .select_products(
                |_| true,
                &["product_class".to_string(), "parent".to_string()],
            )
            .unwrap();
        assert_eq!(db.query_count() - before, 1);

        let child = &products[1];
        let loaded_parent = child.parent(&db).unwrap().unwrap();
        assert_eq!(loaded_parent.title, "Shirt");
        assert_eq!(products[0].product_class(&db).unwrap().unwrap().slug, "shirts");
        assert_eq!(db.query_count() - before, 1);
    }

    #[test]
    fn test_select_related_rejects_unknown_path() {
        let db = Database::new();
        let result = db.select_products(|_| true, &["images".to_string()]);
        assert!(matches!(result, Err(OrmError::Relationship(_))));
    }

    #[test]
    fn test_first_returns_matching_row() {
        let db = Database::new();
        db.bulk_create(vec![Partner::new("a", "A"), Partner::new("b", "B")])
            .unwrap();

        let found = db.first(|partner: &Partner| partner.code == "b").unwrap();
        assert_eq!(found.name, "B");
        assert!(db.first(|partner: &Partner| partner.code == "c").is_none());
    }

    #[test]
    fn test_delete_where() {
        let db = Database::new();
        db.bulk_create(vec![
            Partner::new("a", "A"),
            Partner::new("b", "B"),
        ])
        .unwrap();
        assert_eq!(db.delete_where(|partner: &Partner| partner.code == "a"), 1);
        assert_eq!(db.count::<Partner>(), 1);
    }
}
