mod common;

use catalogue_orm::{
    AttributeValue, OrmError, Product, ProductCategory, ProductClass, ProductImage, ProductQuery,
    ProductRecommendation, ProductStructure, StockRecord,
};
use oscar_odin::resources::{
    CategoryResource, ParentProductResource, PartnerResource, ProductClassResource,
    ProductImageResource, ProductRecommendationResource,
};
use oscar_odin::{
    default_prefetch_registry, product_queryset_to_resources, products_to_db, OdinError,
    ProductResource, ProductsToDbOptions, StrategyContext,
};
use rust_decimal::Decimal;

fn shirts() -> Option<ProductClassResource> {
    Some(ProductClassResource {
        slug: "shirts".to_string(),
        name: Some("Shirts".to_string()),
        ..Default::default()
    })
}

fn warehouse() -> Option<PartnerResource> {
    Some(PartnerResource {
        code: "warehouse".to_string(),
        ..Default::default()
    })
}

fn linen_shirt() -> ProductResource {
    ProductResource {
        upc: Some("5001".to_string()),
        title: "Linen shirt".to_string(),
        description: Some("Breezy".to_string()),
        product_class: shirts(),
        images: vec![ProductImageResource {
            code: "linen-front".to_string(),
            original: Some("/media/images/products/linen-front.jpg".to_string()),
            ..Default::default()
        }],
        categories: vec![CategoryResource {
            code: "clothing".to_string(),
            ..Default::default()
        }],
        price: Some(Decimal::new(3450, 2)),
        currency: Some("EUR".to_string()),
        availability: Some(7),
        partner: warehouse(),
        attributes: [
            ("size".to_string(), AttributeValue::Text("L".to_string())),
            ("material".to_string(), AttributeValue::Text("linen".to_string())),
        ]
        .into_iter()
        .collect(),
        ..Default::default()
    }
}

#[test]
fn test_saved_product_maps_back_to_the_same_resource() {
    let catalogue = common::catalogue();
    let db = &catalogue.db;

    let (products, report) = products_to_db(db, vec![linen_shirt()], &ProductsToDbOptions::default()).unwrap();
    assert!(!report.has_errors(), "{:?}", report.errors);
    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(report.related.images, 1);
    assert_eq!(report.related.product_categories, 1);
    assert_eq!(report.related.stockrecords, 1);
    assert_eq!(report.related.attribute_values, 2);
    assert!(products[0].id.is_some());
    assert_eq!(products[0].product_class_id, catalogue.shirts.id);

    let resources = product_queryset_to_resources(
        db,
        ProductQuery::new().upcs(["5001"]),
        &default_prefetch_registry(),
        &StrategyContext::new(),
        false,
    )
    .unwrap();
    let resource = &resources[0];
    assert_eq!(resource.title, "Linen shirt");
    assert_eq!(resource.slug.as_deref(), Some("linen-shirt"));
    assert_eq!(resource.description.as_deref(), Some("Breezy"));
    assert_eq!(resource.images[0].original.as_deref(), Some("/media/images/products/linen-front.jpg"));
    assert_eq!(resource.categories[0].code, "clothing");
    assert_eq!(resource.categories[0].name.as_deref(), Some("Clothing"));
    assert_eq!(resource.attributes["size"], AttributeValue::Text("L".to_string()));
    assert_eq!(resource.attributes["material"], AttributeValue::Text("linen".to_string()));
    assert_eq!(resource.price, Some(Decimal::new(3450, 2)));
    assert_eq!(resource.availability, Some(7));
}

fn read_all(db: &catalogue_orm::Database) -> Vec<ProductResource> {
    product_queryset_to_resources(
        db,
        ProductQuery::new(),
        &default_prefetch_registry(),
        &StrategyContext::new(),
        false,
    )
    .unwrap()
}

fn text_fields(resources: &[ProductResource]) -> Vec<(Option<String>, String, Option<String>, Option<String>)> {
    let mut fields: Vec<_> = resources
        .iter()
        .map(|resource| {
            (
                resource.upc.clone(),
                resource.title.clone(),
                resource.slug.clone(),
                resource.description.clone(),
            )
        })
        .collect();
    fields.sort();
    fields
}

#[test]
fn test_stored_products_survive_a_write_back() {
    let catalogue = common::catalogue();
    let db = &catalogue.db;

    let resources = read_all(db);
    assert_eq!(resources.len(), 5);
    let before = text_fields(&resources);

    let (_, report) = products_to_db(db, resources, &ProductsToDbOptions::default()).unwrap();
    assert!(!report.has_errors(), "{:?}", report.errors);
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 5);

    assert_eq!(text_fields(&read_all(db)), before);

    // The child keeps its own blank slug
    let small = db.get::<Product>(catalogue.hoodie_small.id.unwrap()).unwrap();
    assert_eq!(small.slug, "");
}

#[test]
fn test_existing_products_are_updated_by_upc() {
    let catalogue = common::catalogue();
    let db = &catalogue.db;
    let products_before = db.count::<Product>();

    let resource = ProductResource {
        upc: Some("1001".to_string()),
        title: "Plain shirt, organic".to_string(),
        product_class: shirts(),
        ..Default::default()
    };
    let (products, report) = products_to_db(db, vec![resource], &ProductsToDbOptions::default()).unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 1);
    assert_eq!(products[0].id, catalogue.plain_shirt.id);

    let stored = db.get::<Product>(catalogue.plain_shirt.id.unwrap()).unwrap();
    assert_eq!(stored.title, "Plain shirt, organic");
    assert_eq!(stored.slug, "plain-shirt-organic");
    assert_eq!(db.count::<Product>(), products_before);
}

#[test]
fn test_only_selected_fields_are_updated() {
    let catalogue = common::catalogue();
    let db = &catalogue.db;

    let resource = ProductResource {
        upc: Some("1001".to_string()),
        title: "Renamed".to_string(),
        description: Some("New description".to_string()),
        product_class: shirts(),
        ..Default::default()
    };
    let options = ProductsToDbOptions::default().with_fields_to_update([oscar_odin::mappings::ModelField::new(
        "catalogue_product",
        "description",
    )]);
    products_to_db(db, vec![resource], &options).unwrap();

    let stored = db.get::<Product>(catalogue.plain_shirt.id.unwrap()).unwrap();
    assert_eq!(stored.title, "Plain shirt");
    assert_eq!(stored.description, "New description");
}

#[test]
fn test_product_class_shared_by_resources_is_created_once() {
    let catalogue = common::catalogue();
    let db = &catalogue.db;

    let resources: Vec<ProductResource> = (0..3)
        .map(|index| ProductResource {
            upc: Some(format!("70{}", index)),
            title: format!("Jacket {}", index),
            product_class: Some(ProductClassResource {
                slug: "jackets".to_string(),
                name: Some("Jackets".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect();

    let (products, report) = products_to_db(db, resources, &ProductsToDbOptions::default()).unwrap();
    assert_eq!(report.created, 3);
    assert_eq!(report.related.product_classes, 1);

    let jackets = db.filter(|class: &ProductClass| class.slug == "jackets");
    assert_eq!(jackets.len(), 1);
    assert!(products.iter().all(|product| product.product_class_id == jackets[0].id));
}

#[test]
fn test_parent_and_children_in_one_batch() {
    let catalogue = common::catalogue();
    let db = &catalogue.db;

    let parent = ProductResource {
        upc: Some("6000".to_string()),
        structure: ProductStructure::Parent,
        title: "Rain jacket".to_string(),
        product_class: shirts(),
        ..Default::default()
    };
    let child = |upc: &str, size: &str| ProductResource {
        upc: Some(upc.to_string()),
        structure: ProductStructure::Child,
        parent: Some(ParentProductResource { upc: "6000".to_string() }),
        price: Some(Decimal::new(8000, 2)),
        currency: Some("EUR".to_string()),
        availability: Some(2),
        partner: warehouse(),
        attributes: [("size".to_string(), AttributeValue::Text(size.to_string()))]
            .into_iter()
            .collect(),
        ..Default::default()
    };

    let (_, report) = products_to_db(
        db,
        vec![child("6001", "S"), parent, child("6002", "M")],
        &ProductsToDbOptions::default(),
    )
    .unwrap();
    assert!(!report.has_errors(), "{:?}", report.errors);

    let parents = db.filter(|product: &Product| product.upc.as_deref() == Some("6000"));
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].title, "Rain jacket");
    assert_eq!(parents[0].product_class_id, catalogue.shirts.id);

    let children = db.filter(|product: &Product| product.parent_id == parents[0].id);
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|child| child.product_class_id.is_none()));
    assert_eq!(report.related.attribute_values, 2);
    assert_eq!(report.related.stockrecords, 2);
}

#[test]
fn test_invalid_resources_are_collected() {
    let catalogue = common::catalogue();
    let db = &catalogue.db;

    let blank = ProductResource {
        upc: Some("5002".to_string()),
        product_class: shirts(),
        ..Default::default()
    };
    let (products, report) =
        products_to_db(db, vec![blank, linen_shirt()], &ProductsToDbOptions::default()).unwrap();

    assert_eq!(products.len(), 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.skipped, 1);
    let errors: Vec<_> = report.errors.iter().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].identifier_values, vec!["5002".to_string()]);
    assert!(matches!(errors[0].error, OdinError::Validation(_)));
}

#[test]
fn test_strict_mode_aborts_on_first_error() {
    let catalogue = common::catalogue();
    let db = &catalogue.db;

    let blank = ProductResource {
        upc: Some("5002".to_string()),
        product_class: shirts(),
        ..Default::default()
    };
    let options = ProductsToDbOptions::default().with_strict(true);
    let result = products_to_db(db, vec![linen_shirt(), blank], &options);
    assert!(matches!(result, Err(OdinError::Validation(_))));
    assert!(db
        .first(|product: &Product| product.upc.as_deref() == Some("5001"))
        .is_none());
}

#[test]
fn test_unknown_attribute_skips_the_product() {
    let catalogue = common::catalogue();
    let db = &catalogue.db;

    let mut resource = linen_shirt();
    resource
        .attributes
        .insert("colour".to_string(), AttributeValue::Text("blue".to_string()));

    let (products, report) = products_to_db(db, vec![resource], &ProductsToDbOptions::default()).unwrap();
    assert!(products.is_empty());
    assert_eq!(report.skipped, 1);
    assert!(report.errors.iter().any(|error| error.to_string().contains("colour")));
}

#[test]
fn test_missing_partner_is_a_record_error() {
    let catalogue = common::catalogue();
    let db = &catalogue.db;

    let mut resource = linen_shirt();
    resource.partner = Some(PartnerResource {
        code: "dropshipper".to_string(),
        ..Default::default()
    });

    let (products, report) =
        products_to_db(db, vec![resource.clone()], &ProductsToDbOptions::default()).unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.related.stockrecords, 0);
    let errors: Vec<_> = report.errors.iter().collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].error, OdinError::Orm(OrmError::NotFound(_))));

    let strict = ProductsToDbOptions::default().with_strict(true);
    resource.upc = Some("5003".to_string());
    assert!(matches!(
        products_to_db(db, vec![resource], &strict),
        Err(OdinError::Orm(OrmError::NotFound(_)))
    ));
}

#[test]
fn test_recommendations_are_ranked_in_order() {
    let catalogue = common::catalogue();
    let db = &catalogue.db;

    let mut resource = linen_shirt();
    resource.recommended_products = ["1001", "9999", "1002"]
        .into_iter()
        .map(|upc| ProductRecommendationResource { upc: upc.to_string() })
        .collect();

    let (products, report) = products_to_db(db, vec![resource], &ProductsToDbOptions::default()).unwrap();
    assert_eq!(report.related.recommendations, 2);
    assert_eq!(report.errors.len(), 1);

    let primary_id = products[0].id.unwrap();
    let mut links = db.filter(|link: &ProductRecommendation| link.primary_id == primary_id);
    links.sort_by_key(|link| std::cmp::Reverse(link.ranking));
    let recommended: Vec<_> = links.iter().map(|link| link.recommendation_id).collect();
    assert_eq!(
        recommended,
        vec![catalogue.plain_shirt.id.unwrap(), catalogue.striped_shirt.id.unwrap()]
    );
}

#[test]
fn test_delete_related_removes_rows_missing_from_resources() {
    let catalogue = common::catalogue();
    let db = &catalogue.db;
    let product_id = catalogue.plain_shirt.id.unwrap();

    let resource = ProductResource {
        upc: Some("1001".to_string()),
        title: "Plain shirt".to_string(),
        product_class: shirts(),
        images: vec![ProductImageResource {
            code: "plain-front".to_string(),
            original: Some("images/products/plain-front.jpg".to_string()),
            ..Default::default()
        }],
        categories: vec![CategoryResource {
            code: "clothing".to_string(),
            ..Default::default()
        }],
        ..Default::default()
    };

    // Without delete_related nothing is removed
    products_to_db(db, vec![resource.clone()], &ProductsToDbOptions::default()).unwrap();
    assert_eq!(db.filter(|image: &ProductImage| image.product_id == product_id).len(), 2);

    let options = ProductsToDbOptions::default().with_delete_related(true);
    let (_, report) = products_to_db(db, vec![resource], &options).unwrap();
    assert_eq!(report.deleted.images, 1);
    assert_eq!(report.deleted.product_categories, 1);
    assert_eq!(report.deleted.stockrecords, 1);

    let images = db.filter(|image: &ProductImage| image.product_id == product_id);
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].code, "plain-front");
    let links = db.filter(|link: &ProductCategory| link.product_id == product_id);
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].category_id, catalogue.clothing.id.unwrap());
    assert!(db.filter(|record: &StockRecord| record.product_id == product_id).is_empty());

    // Rows of other products are untouched
    assert_eq!(
        db.filter(|image: &ProductImage| image.product_id == catalogue.hoodie.id.unwrap()).len(),
        1
    );
}
