//! Shared catalogue fixture for integration tests

#![allow(dead_code)]

use catalogue_orm::{
    AttributeOption, AttributeOptionGroup, AttributeType, AttributeValue, Category, Database,
    Partner, Product, ProductAttribute, ProductAttributeValue, ProductCategory, ProductClass,
    ProductImage, ProductRecommendation, ProductStructure, StockRecord,
};
use rust_decimal::Decimal;

/// Stored ids of the fixture rows
pub struct Catalogue {
    pub db: Database,
    pub shirts: ProductClass,
    pub partner: Partner,
    pub size: ProductAttribute,
    pub material: ProductAttribute,
    pub sizes: Vec<AttributeOption>,
    pub clothing: Category,
    pub hidden: Category,
    pub plain_shirt: Product,
    pub striped_shirt: Product,
    pub hoodie: Product,
    pub hoodie_small: Product,
    pub hoodie_large: Product,
}

pub fn product(upc: &str, title: &str, structure: ProductStructure) -> Product {
    Product {
        upc: Some(upc.to_string()),
        slug: catalogue_orm::slugify(title),
        ..Product::new(title, structure)
    }
}

pub fn stockrecord(product: &Product, partner: &Partner, price: Decimal, num_in_stock: i64) -> StockRecord {
    StockRecord {
        product_id: product.id.unwrap_or_default(),
        partner_id: partner.id.unwrap_or_default(),
        partner_sku: product.upc.clone().unwrap_or_default(),
        price_currency: "EUR".to_string(),
        price: Some(price),
        num_in_stock: Some(num_in_stock),
        num_allocated: Some(0),
        ..StockRecord::default()
    }
}

fn image(product: &Product, code: &str, display_order: i32) -> ProductImage {
    ProductImage {
        product_id: product.id.unwrap_or_default(),
        display_order,
        ..ProductImage::new(code, format!("images/products/{}.jpg", code).as_str())
    }
}

fn attribute_value(
    db: &Database,
    attribute: &ProductAttribute,
    product: &Product,
    value: AttributeValue,
    options: &[AttributeOption],
) {
    let row = ProductAttributeValue::from_native(attribute, product.id.unwrap_or_default(), &value, options)
        .unwrap();
    db.insert(row).unwrap();
}

/// A small catalogue: two standalone shirts, a hoodie parent with a public
/// and a hidden child, one browsable and one hidden category
pub fn catalogue() -> Catalogue {
    let db = Database::new();

    let shirts = db.insert(ProductClass::new("Shirts", "shirts")).unwrap();
    let partner = db.insert(Partner::new("warehouse", "Central warehouse")).unwrap();

    let group = db
        .insert(AttributeOptionGroup {
            id: None,
            name: "Sizes".to_string(),
        })
        .unwrap();
    let group_id = group.id.unwrap();
    let sizes: Vec<AttributeOption> = ["S", "M", "L"]
        .into_iter()
        .map(|label| {
            db.insert(AttributeOption {
                id: None,
                group_id,
                option: label.to_string(),
            })
            .unwrap()
        })
        .collect();

    let size = db
        .insert(ProductAttribute {
            product_class_id: shirts.id,
            option_group_id: Some(group_id),
            ..ProductAttribute::new("size", "Size", AttributeType::Option)
        })
        .unwrap();
    let material = db
        .insert(ProductAttribute {
            product_class_id: shirts.id,
            ..ProductAttribute::new("material", "Material", AttributeType::Text)
        })
        .unwrap();

    let clothing = db
        .insert(Category {
            path: Some("0001".to_string()),
            ..Category::new("clothing", "Clothing")
        })
        .unwrap();
    let hidden = db
        .insert(Category {
            path: Some("0002".to_string()),
            is_public: false,
            ..Category::new("clearance", "Clearance")
        })
        .unwrap();

    let plain_shirt = db
        .insert(Product {
            product_class_id: shirts.id,
            description: "Plain cotton shirt".to_string(),
            ..product("1001", "Plain shirt", ProductStructure::Standalone)
        })
        .unwrap();
    let striped_shirt = db
        .insert(Product {
            product_class_id: shirts.id,
            ..product("1002", "Striped shirt", ProductStructure::Standalone)
        })
        .unwrap();
    let hoodie = db
        .insert(Product {
            product_class_id: shirts.id,
            ..product("2000", "Hoodie", ProductStructure::Parent)
        })
        .unwrap();
    let hoodie_small = db
        .insert(Product {
            parent_id: hoodie.id,
            ..product("2001", "", ProductStructure::Child)
        })
        .unwrap();
    let hoodie_large = db
        .insert(Product {
            parent_id: hoodie.id,
            is_public: false,
            ..product("2002", "Hoodie (L)", ProductStructure::Child)
        })
        .unwrap();

    db.insert(image(&plain_shirt, "plain-front", 0)).unwrap();
    db.insert(image(&plain_shirt, "plain-back", 1)).unwrap();
    db.insert(image(&hoodie, "hoodie-front", 0)).unwrap();

    for category in [&clothing, &hidden] {
        db.insert(ProductCategory::new(plain_shirt.id.unwrap(), category.id.unwrap()))
            .unwrap();
    }
    db.insert(ProductCategory::new(hoodie.id.unwrap(), clothing.id.unwrap()))
        .unwrap();

    db.insert(stockrecord(&plain_shirt, &partner, Decimal::new(1999, 2), 10))
        .unwrap();
    db.insert(stockrecord(&hoodie_small, &partner, Decimal::new(4500, 2), 3))
        .unwrap();
    db.insert(stockrecord(&hoodie_large, &partner, Decimal::new(4900, 2), 0))
        .unwrap();

    attribute_value(&db, &size, &plain_shirt, AttributeValue::Text("M".to_string()), &sizes);
    attribute_value(&db, &material, &plain_shirt, AttributeValue::Text("cotton".to_string()), &sizes);
    attribute_value(&db, &material, &hoodie, AttributeValue::Text("fleece".to_string()), &sizes);
    attribute_value(&db, &size, &hoodie_small, AttributeValue::Text("S".to_string()), &sizes);

    db.insert(ProductRecommendation {
        id: None,
        primary_id: striped_shirt.id.unwrap(),
        recommendation_id: plain_shirt.id.unwrap(),
        ranking: 1,
    })
    .unwrap();

    db.queries().reset();

    Catalogue {
        db,
        shirts,
        partner,
        size,
        material,
        sizes,
        clothing,
        hidden,
        plain_shirt,
        striped_shirt,
        hoodie,
        hoodie_small,
        hoodie_large,
    }
}
