mod common;

use catalogue_orm::{Prefetch, ProductQuery};
use oscar_odin::prefetching::{DefaultPrefetchRegistry, PrefetchContext};
use oscar_odin::{
    product_queryset_to_resources, PrefetchDirective, PrefetchError, PrefetchRegistry,
    StrategyContext,
};
use serde_json::json;

#[test]
fn test_register_and_unregister() {
    let mut registry = PrefetchRegistry::new();
    registry.register_prefetch("images");
    registry.register_prefetch("stockrecords");
    assert_eq!(registry.prefetch_keys(), vec!["images", "stockrecords"]);

    registry.unregister_prefetch("images");
    assert_eq!(registry.prefetch_keys(), vec!["stockrecords"]);

    // Absent keys are ignored
    registry.unregister_prefetch("images");
    registry.unregister_children_prefetch("children__images");
    assert_eq!(registry.get_prefetches().len(), 1);
}

#[test]
fn test_select_related_is_deduplicated() {
    let mut registry = PrefetchRegistry::new();
    registry.register_select_related("product_class");
    registry.register_select_related(["product_class", "parent"]);
    registry.register_select_related(vec!["parent".to_string()]);
    assert_eq!(
        registry.get_select_related(),
        &["product_class".to_string(), "parent".to_string()]
    );

    registry.unregister_select_related("product_class");
    assert_eq!(registry.get_select_related(), &["parent".to_string()]);
}

#[test]
fn test_children_prefetches_are_kept_apart() {
    let mut registry = PrefetchRegistry::new();
    registry.register_prefetch("images");
    registry.register_children_prefetch("children__images");

    assert!(registry.contains_prefetch("images"));
    assert!(!registry.contains_prefetch("children__images"));
    assert!(registry.contains_children_prefetch("children__images"));
    assert_eq!(registry.children_prefetch_keys(), vec!["children__images"]);

    registry.clear();
    assert!(registry.get_prefetches().is_empty());
    assert!(registry.get_children_prefetches().is_empty());
    assert!(registry.get_select_related().is_empty());
}

#[test]
fn test_keys() {
    assert_eq!(PrefetchRegistry::get_key(&"images".into()), "images");
    assert_eq!(
        PrefetchRegistry::get_key(&Prefetch::new("categories").to_attr("browsable_categories").into()),
        "categories"
    );
    let transform = PrefetchDirective::transform("everything", |query: ProductQuery, _: &PrefetchContext| query);
    assert_eq!(PrefetchRegistry::get_key(&transform), "everything");

    assert_eq!(PrefetchRegistry::get_spec_key(&json!("parent__images")).unwrap(), "parent__images");
    assert_eq!(
        PrefetchRegistry::get_spec_key(&json!({"lookup": "categories", "to_attr": "cats"})).unwrap(),
        "categories"
    );
    assert_eq!(
        PrefetchRegistry::get_spec_key(&json!(3)),
        Err(PrefetchError::InvalidDirectiveKind {
            kind: "number".to_string()
        })
    );
}

#[test]
fn test_register_from_spec() {
    let mut registry = PrefetchRegistry::new();
    registry.register_prefetch_spec(&json!("images")).unwrap();
    registry
        .register_prefetch_spec(&json!({"transform": "prefetch_attribute_values"}))
        .unwrap();
    registry
        .register_children_prefetch_spec(&json!({"lookup": "children__stockrecords"}))
        .unwrap();

    let query = registry.apply(ProductQuery::new(), true);
    assert!(query.has_prefetch("images"));
    assert!(query.has_prefetch("attribute_values"));
    assert!(query.has_prefetch("children__attribute_values"));
    assert!(query.has_prefetch("children__stockrecords"));
}

#[test]
fn test_invalid_specs_are_rejected_at_registration() {
    let mut registry = PrefetchRegistry::new();

    assert_eq!(
        registry.register_prefetch_spec(&json!(42)),
        Err(PrefetchError::InvalidDirectiveKind {
            kind: "number".to_string()
        })
    );
    assert!(matches!(
        registry.register_prefetch_spec(&json!({"to_attr": "cats"})),
        Err(PrefetchError::InvalidDescriptor { .. })
    ));
    assert!(matches!(
        registry.register_children_prefetch_spec(&json!({"transform": "prefetch_everything"})),
        Err(PrefetchError::UnknownTransform { .. })
    ));
    assert!(registry.get_prefetches().is_empty());
    assert!(registry.get_children_prefetches().is_empty());
}

#[test]
fn test_default_registry_contents() {
    let registry = DefaultPrefetchRegistry::new();
    assert_eq!(
        registry.get_select_related(),
        &["product_class".to_string(), "parent".to_string()]
    );
    for key in [
        "images",
        "stockrecords",
        "categories",
        "parent__product_class",
        "parent__images",
        "recommended_products",
        "prefetch_attribute_values",
        "prefetch_browsable_categories",
        "prefetch_public_children_stockrecords",
    ] {
        assert!(registry.contains_prefetch(key), "missing {}", key);
    }
    assert_eq!(
        registry.children_prefetch_keys(),
        vec!["children__images", "children__stockrecords", "children__recommended_products"]
    );
}

#[test]
fn test_customised_registry_drives_mapping() {
    let catalogue = common::catalogue();
    let db = &catalogue.db;

    let mut registry = DefaultPrefetchRegistry::new();
    registry.unregister_prefetch("recommended_products");

    let resources = product_queryset_to_resources(
        db,
        ProductQuery::new().browsable(),
        &registry,
        &StrategyContext::new(),
        false,
    )
    .unwrap();
    assert_eq!(resources.len(), 3);
    assert_eq!(
        db.lazy_loads().count_for("catalogue_product", "recommended_products"),
        3
    );

    registry.register_prefetch("recommended_products");
    db.lazy_loads().reset();
    product_queryset_to_resources(
        db,
        ProductQuery::new().browsable(),
        &registry,
        &StrategyContext::new(),
        false,
    )
    .unwrap();
    assert_eq!(db.lazy_loads().stats().total_loads, 0);
}
