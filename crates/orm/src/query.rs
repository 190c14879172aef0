//! Product query builder with select-related joins and prefetch lookups
//!
//! A [`ProductQuery`] is a description only; nothing runs until
//! [`ProductQuery::execute`]. Execution issues one statement for the rows
//! (with the select-related joins) and then one statement per prefetch
//! level, whatever the number of rows.

use std::collections::{HashMap, HashSet};

use crate::database::{group_by_owner, Database};
use crate::error::{OrmError, OrmResult};
use crate::model::{Model, Related};
use crate::models::{Category, Product, ProductStructure};

/// Row filter of a product query
#[derive(Debug, Clone, PartialEq)]
pub enum ProductFilter {
    Ids(Vec<i64>),
    Upcs(Vec<String>),
    Structures(Vec<ProductStructure>),
    IsPublic(bool),
    ParentIds(Vec<i64>),
    ProductClassIds(Vec<i64>),
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        match self {
            ProductFilter::Ids(ids) => product.id.is_some_and(|id| ids.contains(&id)),
            ProductFilter::Upcs(upcs) => product
                .upc
                .as_ref()
                .is_some_and(|upc| upcs.contains(upc)),
            ProductFilter::Structures(structures) => structures.contains(&product.structure),
            ProductFilter::IsPublic(public) => product.is_public == *public,
            ProductFilter::ParentIds(ids) => product.parent_id.is_some_and(|id| ids.contains(&id)),
            ProductFilter::ProductClassIds(ids) => product
                .product_class_id
                .is_some_and(|id| ids.contains(&id)),
        }
    }
}

/// Restriction of a category prefetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryQuery {
    browsable_only: bool,
}

impl CategoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Public categories whose ancestors are all public
    pub fn browsable() -> Self {
        Self {
            browsable_only: true,
        }
    }

    pub fn matches(&self, category: &Category) -> bool {
        !self.browsable_only || category.is_browsable()
    }
}

/// Query used to load the rows of a prefetched relation
#[derive(Debug, Clone, PartialEq)]
pub enum RelatedQuery {
    Products(ProductQuery),
    Categories(CategoryQuery),
}

/// A prefetch lookup: relation path, optional query for the related rows,
/// optional attribute to store the result under
#[derive(Debug, Clone, PartialEq)]
pub struct Prefetch {
    pub lookup: String,
    pub query: Option<RelatedQuery>,
    pub to_attr: Option<String>,
}

impl Prefetch {
    pub fn new(lookup: impl Into<String>) -> Self {
        Self {
            lookup: lookup.into(),
            query: None,
            to_attr: None,
        }
    }

    pub fn with_query(mut self, query: RelatedQuery) -> Self {
        self.query = Some(query);
        self
    }

    pub fn to_attr(mut self, attr: impl Into<String>) -> Self {
        self.to_attr = Some(attr.into());
        self
    }

    /// Name under which the result is stored on each instance
    pub fn prefetch_to(&self) -> String {
        match &self.to_attr {
            Some(attr) => match self.lookup.rsplit_once("__") {
                Some((through, _)) => format!("{}__{}", through, attr),
                None => attr.clone(),
            },
            None => self.lookup.clone(),
        }
    }
}

impl From<&str> for Prefetch {
    fn from(lookup: &str) -> Self {
        Prefetch::new(lookup)
    }
}

impl From<String> for Prefetch {
    fn from(lookup: String) -> Self {
        Prefetch::new(lookup)
    }
}

/// Query over catalogue products
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductQuery {
    filters: Vec<ProductFilter>,
    select_related: Vec<String>,
    prefetches: Vec<Prefetch>,
}

impl ProductQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: ProductFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn ids(self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.filter(ProductFilter::Ids(ids.into_iter().collect()))
    }

    pub fn upcs<S: Into<String>>(self, upcs: impl IntoIterator<Item = S>) -> Self {
        self.filter(ProductFilter::Upcs(upcs.into_iter().map(Into::into).collect()))
    }

    pub fn public(self) -> Self {
        self.filter(ProductFilter::IsPublic(true))
    }

    /// Public products that are listed on their own (no children)
    pub fn browsable(self) -> Self {
        self.public().filter(ProductFilter::Structures(vec![
            ProductStructure::Standalone,
            ProductStructure::Parent,
        ]))
    }

    pub fn filters(&self) -> &[ProductFilter] {
        &self.filters
    }

    pub fn matches(&self, product: &Product) -> bool {
        self.filters.iter().all(|filter| filter.matches(product))
    }

    /// Join a cardinality-1 relation into the main statement
    pub fn select_related(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !self.select_related.contains(&path) {
            self.select_related.push(path);
        }
        self
    }

    pub fn select_related_paths(&self) -> &[String] {
        &self.select_related
    }

    /// Add a prefetch lookup. A lookup storing to the same place as an
    /// earlier one replaces it.
    pub fn prefetch_related(mut self, prefetch: impl Into<Prefetch>) -> Self {
        let prefetch = prefetch.into();
        let target = prefetch.prefetch_to();
        match self
            .prefetches
            .iter_mut()
            .find(|existing| existing.prefetch_to() == target)
        {
            Some(existing) => *existing = prefetch,
            None => self.prefetches.push(prefetch),
        }
        self
    }

    pub fn prefetches(&self) -> &[Prefetch] {
        &self.prefetches
    }

    pub fn has_prefetch(&self, lookup: &str) -> bool {
        self.prefetches
            .iter()
            .any(|prefetch| prefetch.lookup == lookup || prefetch.prefetch_to() == lookup)
    }

    /// Prefetch attribute values, and those of parents and children when
    /// `include_parent_children` is set
    pub fn prefetch_attribute_values(self, include_parent_children: bool) -> Self {
        let query = self.prefetch_related("attribute_values");
        if include_parent_children {
            query
                .prefetch_related("parent__attribute_values")
                .prefetch_related("children__attribute_values")
        } else {
            query
        }
    }

    /// Prefetch browsable categories of products and their parents into
    /// `browsable_categories`
    pub fn prefetch_browsable_categories(self) -> Self {
        self.prefetch_related(
            Prefetch::new("categories")
                .with_query(RelatedQuery::Categories(CategoryQuery::browsable()))
                .to_attr("browsable_categories"),
        )
        .prefetch_related(
            Prefetch::new("parent__categories")
                .with_query(RelatedQuery::Categories(CategoryQuery::browsable()))
                .to_attr("browsable_categories"),
        )
    }

    /// Prefetch public children into `public_children`, loading them with
    /// `query`
    pub fn prefetch_public_children(self, query: ProductQuery) -> Self {
        self.prefetch_related(
            Prefetch::new("children")
                .with_query(RelatedQuery::Products(query.public()))
                .to_attr("public_children"),
        )
    }

    /// Run the query
    pub fn execute(&self, db: &Database) -> OrmResult<Vec<Product>> {
        let mut products = db.select_products(|product| self.matches(product), &self.select_related)?;
        self.apply_prefetches(db, &mut products)?;
        link_children_to_parents(&mut products);
        Ok(products)
    }

    /// Run this query's prefetch lookups over already loaded products
    pub fn apply_prefetches(&self, db: &Database, products: &mut [Product]) -> OrmResult<()> {
        for prefetch in &self.prefetches {
            tracing::debug!(lookup = %prefetch.lookup, to_attr = ?prefetch.to_attr, "prefetching");
            let segments: Vec<&str> = prefetch.lookup.split("__").collect();
            prefetch_level(db, products.iter_mut().collect(), &segments, prefetch)?;
        }
        Ok(())
    }
}

fn prefetch_level(
    db: &Database,
    mut instances: Vec<&mut Product>,
    segments: &[&str],
    prefetch: &Prefetch,
) -> OrmResult<()> {
    let Some((relation, rest)) = segments.split_first() else {
        return Ok(());
    };
    if instances.is_empty() {
        return Ok(());
    }

    if rest.is_empty() {
        return load_relation(db, instances, relation, prefetch);
    }

    if !instances.iter().all(|product| is_loaded(product, relation)) {
        let level = instances.iter_mut().map(|product| &mut **product).collect();
        load_relation(db, level, relation, &Prefetch::new(*relation))?;
    }

    let mut next = Vec::new();
    for product in instances {
        next.extend(related_products_mut(product, relation)?);
    }
    prefetch_level(db, next, rest, prefetch)
}

fn is_loaded(product: &Product, relation: &str) -> bool {
    let relations = &product.relations;
    match relation {
        "product_class" => relations.product_class.is_loaded(),
        "parent" => relations.parent.is_loaded(),
        "children" => relations.children.is_loaded(),
        "public_children" => relations.public_children.is_loaded(),
        "images" => relations.images.is_loaded(),
        "stockrecords" => relations.stockrecords.is_loaded(),
        "categories" => relations.categories.is_loaded(),
        "browsable_categories" => relations.browsable_categories.is_loaded(),
        "attribute_values" => relations.attribute_values.is_loaded(),
        "recommended_products" => relations.recommended_products.is_loaded(),
        _ => false,
    }
}

/// Products reachable through `relation`, for walking nested lookups
fn related_products_mut<'a>(product: &'a mut Product, relation: &str) -> OrmResult<Vec<&'a mut Product>> {
    let relations = &mut product.relations;
    let related = match relation {
        "parent" => relations
            .parent
            .get_mut()
            .and_then(|parent| parent.as_deref_mut())
            .into_iter()
            .collect(),
        "children" => relations
            .children
            .get_mut()
            .map(|children| children.iter_mut().collect())
            .unwrap_or_default(),
        "public_children" => relations
            .public_children
            .get_mut()
            .map(|children| children.iter_mut().collect())
            .unwrap_or_default(),
        "recommended_products" => relations
            .recommended_products
            .get_mut()
            .map(|products| products.iter_mut().collect())
            .unwrap_or_default(),
        other => {
            return Err(OrmError::Relationship(format!(
                "'{}' does not resolve to products and cannot be traversed in a prefetch lookup",
                other
            )))
        }
    };
    Ok(related)
}

fn unsupported_to_attr(relation: &str, attr: &str) -> OrmError {
    OrmError::Query(format!(
        "prefetch of '{}' cannot be stored to '{}'",
        relation, attr
    ))
}

/// Load one relation for every instance with a single statement
fn load_relation(
    db: &Database,
    mut instances: Vec<&mut Product>,
    relation: &str,
    prefetch: &Prefetch,
) -> OrmResult<()> {
    let to_attr = prefetch.to_attr.as_deref();
    if to_attr.is_none() && instances.iter().all(|product| is_loaded(product, relation)) {
        return Ok(());
    }

    let ids: Vec<i64> = instances.iter().filter_map(|product| product.id).collect();

    match (relation, to_attr) {
        ("product_class", None) => {
            let class_ids: Vec<i64> = instances
                .iter()
                .filter_map(|product| product.product_class_id)
                .collect();
            let classes: HashMap<i64, _> = db
                .product_classes_by_ids(&class_ids)
                .into_iter()
                .filter_map(|class| class.id.map(|id| (id, class)))
                .collect();
            for product in instances.iter_mut() {
                let class = product
                    .product_class_id
                    .and_then(|id| classes.get(&id).cloned());
                product.relations.product_class = Related::Loaded(class);
            }
        }
        ("parent", None) => {
            let parent_ids: Vec<i64> = instances.iter().filter_map(|product| product.parent_id).collect();
            let mut parents = db.products_by_ids(&parent_ids);
            if let Some(RelatedQuery::Products(query)) = &prefetch.query {
                query.apply_prefetches(db, &mut parents)?;
            }
            let parents: HashMap<i64, Product> = parents
                .into_iter()
                .filter_map(|parent| parent.id.map(|id| (id, parent)))
                .collect();
            for product in instances.iter_mut() {
                let parent = product
                    .parent_id
                    .and_then(|id| parents.get(&id).cloned())
                    .map(Box::new);
                product.relations.parent = Related::Loaded(parent);
            }
        }
        ("children", None | Some("public_children")) => {
            let nested = match &prefetch.query {
                Some(RelatedQuery::Products(query)) => query.clone(),
                Some(RelatedQuery::Categories(_)) => {
                    return Err(OrmError::Query(
                        "children can only be prefetched with a product query".to_string(),
                    ))
                }
                None => ProductQuery::new(),
            };
            let parents: HashSet<i64> = ids.iter().copied().collect();
            let mut children = db.select_products(
                |product| {
                    product.parent_id.is_some_and(|id| parents.contains(&id)) && nested.matches(product)
                },
                nested.select_related_paths(),
            )?;
            nested.apply_prefetches(db, &mut children)?;

            let mut grouped = group_by_owner(
                children
                    .into_iter()
                    .filter_map(|child| child.parent_id.map(|parent| (parent, child)))
                    .collect(),
            );
            for product in instances.iter_mut() {
                let loaded = product
                    .id
                    .and_then(|id| grouped.remove(&id))
                    .unwrap_or_default();
                if to_attr.is_some() {
                    product.relations.public_children = Related::Loaded(loaded);
                } else {
                    product.relations.children = Related::Loaded(loaded);
                }
            }
        }
        ("images", None) => {
            let mut grouped = group_by_owner(
                db.images_for(&ids)
                    .into_iter()
                    .map(|image| (image.product_id, image))
                    .collect(),
            );
            for product in instances.iter_mut() {
                let loaded = product.id.and_then(|id| grouped.remove(&id)).unwrap_or_default();
                product.relations.images = Related::Loaded(loaded);
            }
        }
        ("stockrecords", None) => {
            let mut grouped = group_by_owner(
                db.stockrecords_for(&ids)
                    .into_iter()
                    .map(|record| (record.product_id, record))
                    .collect(),
            );
            for product in instances.iter_mut() {
                let loaded = product.id.and_then(|id| grouped.remove(&id)).unwrap_or_default();
                product.relations.stockrecords = Related::Loaded(loaded);
            }
        }
        ("categories", None | Some("browsable_categories")) => {
            let browsable_only = match &prefetch.query {
                Some(RelatedQuery::Categories(query)) => query.browsable_only,
                Some(RelatedQuery::Products(_)) => {
                    return Err(OrmError::Query(
                        "categories can only be prefetched with a category query".to_string(),
                    ))
                }
                None => false,
            };
            let mut grouped = group_by_owner(db.categories_for(&ids, browsable_only));
            for product in instances.iter_mut() {
                let loaded = product.id.and_then(|id| grouped.remove(&id)).unwrap_or_default();
                if to_attr.is_some() {
                    product.relations.browsable_categories = Related::Loaded(loaded);
                } else {
                    product.relations.categories = Related::Loaded(loaded);
                }
            }
        }
        ("attribute_values", None) => {
            let mut grouped = group_by_owner(
                db.attribute_values_for(&ids)
                    .into_iter()
                    .map(|value| (value.product_id, value))
                    .collect(),
            );
            for product in instances.iter_mut() {
                let loaded = product.id.and_then(|id| grouped.remove(&id)).unwrap_or_default();
                product.relations.attribute_values = Related::Loaded(loaded);
            }
        }
        ("recommended_products", None) => {
            let mut grouped = group_by_owner(db.recommended_for(&ids));
            for product in instances.iter_mut() {
                let loaded = product.id.and_then(|id| grouped.remove(&id)).unwrap_or_default();
                product.relations.recommended_products = Related::Loaded(loaded);
            }
        }
        (
            "product_class" | "parent" | "children" | "images" | "stockrecords" | "categories"
            | "attribute_values" | "recommended_products",
            Some(attr),
        ) => return Err(unsupported_to_attr(relation, attr)),
        (other, _) => return Err(OrmError::unknown_relation(Product::table_name(), other)),
    }
    Ok(())
}

/// Point each loaded child back at its parent, the way a reverse foreign
/// key fetch fills the forward cache
fn link_children_to_parents(products: &mut [Product]) {
    for product in products.iter_mut() {
        if !product.relations.children.is_loaded() && !product.relations.public_children.is_loaded() {
            continue;
        }
        let mut parent = product.clone();
        parent.relations.children = Related::Deferred;
        parent.relations.public_children = Related::Deferred;
        let parent = Box::new(parent);

        for slot in [
            &mut product.relations.children,
            &mut product.relations.public_children,
        ] {
            if let Some(children) = slot.get_mut() {
                for child in children.iter_mut() {
                    child.relations.parent = Related::Loaded(Some(parent.clone()));
                }
            }
        }
    }
}
