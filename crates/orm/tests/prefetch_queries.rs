use catalogue_orm::{
    Category, CategoryQuery, Database, OrmError, Prefetch, Product, ProductCategory, ProductClass,
    ProductImage, ProductQuery, ProductStructure, RelatedQuery,
};

fn seed(db: &Database, products: usize) -> ProductClass {
    let class = db.insert(ProductClass::new("Books", "books")).unwrap();
    let public = db.insert(Category::new("fiction", "Fiction")).unwrap();
    let hidden = db
        .insert(Category {
            is_public: false,
            ..Category::new("drafts", "Drafts")
        })
        .unwrap();

    for index in 0..products {
        let parent = db
            .insert(Product {
                upc: Some(format!("p{}", index)),
                product_class_id: class.id,
                ..Product::new(format!("Series {}", index), ProductStructure::Parent)
            })
            .unwrap();
        let parent_id = parent.id.unwrap();
        for volume in 0..2 {
            db.insert(Product {
                upc: Some(format!("p{}-{}", index, volume)),
                parent_id: Some(parent_id),
                is_public: volume == 0,
                ..Product::new(format!("Volume {}", volume), ProductStructure::Child)
            })
            .unwrap();
        }
        db.insert(ProductImage {
            product_id: parent_id,
            ..ProductImage::new(format!("cover-{}", index), "images/cover.jpg")
        })
        .unwrap();
        for category in [&public, &hidden] {
            db.insert(ProductCategory::new(parent_id, category.id.unwrap()))
                .unwrap();
        }
    }
    db.queries().reset();
    class
}

fn full_query() -> ProductQuery {
    ProductQuery::new()
        .filter(catalogue_orm::ProductFilter::Structures(vec![ProductStructure::Parent]))
        .select_related("product_class")
        .prefetch_related("images")
        .prefetch_related("children__images")
        .prefetch_browsable_categories()
        .prefetch_public_children(ProductQuery::new().prefetch_related("stockrecords"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_per_level_are_constant() {
        let small = Database::new();
        seed(&small, 2);
        let large = Database::new();
        seed(&large, 20);

        let products = full_query().execute(&small).unwrap();
        assert_eq!(products.len(), 2);
        let products = full_query().execute(&large).unwrap();
        assert_eq!(products.len(), 20);

        assert_eq!(small.query_count(), large.query_count());
    }

    #[test]
    fn test_prefetched_relations_do_not_hit_the_database() {
        let db = Database::new();
        seed(&db, 3);
        let products = full_query().execute(&db).unwrap();
        let before = db.query_count();

        for product in &products {
            assert!(product.product_class(&db).unwrap().is_some());
            assert_eq!(product.images(&db).unwrap().len(), 1);
            assert_eq!(product.children(&db).unwrap().len(), 2);
            assert_eq!(product.public_children(&db).unwrap().len(), 1);
            let categories = product.browsable_categories(&db).unwrap();
            assert_eq!(categories.len(), 1);
            assert_eq!(categories[0].code, "fiction");

            for child in product.children(&db).unwrap().iter() {
                assert_eq!(child.parent(&db).unwrap().unwrap().id, product.id);
                assert!(child.images(&db).unwrap().is_empty());
            }
        }

        assert_eq!(db.query_count(), before);
        assert_eq!(db.lazy_loads().stats().total_loads, 0);
    }

    #[test]
    fn test_lazy_access_is_tracked() {
        let db = Database::new().with_lazy_load_threshold(2);
        seed(&db, 3);
        let products = ProductQuery::new()
            .filter(catalogue_orm::ProductFilter::Structures(vec![ProductStructure::Parent]))
            .execute(&db)
            .unwrap();

        for product in &products {
            product.images(&db).unwrap();
        }
        assert_eq!(db.lazy_loads().count_for("catalogue_product", "images"), 3);
        assert_eq!(db.lazy_loads().stats().potential_n1, 1);
    }

    #[test]
    fn test_category_prefetch_rejects_product_query() {
        let db = Database::new();
        seed(&db, 1);
        let result = ProductQuery::new()
            .prefetch_related(
                Prefetch::new("categories")
                    .with_query(RelatedQuery::Products(ProductQuery::new()))
                    .to_attr("browsable_categories"),
            )
            .execute(&db);
        assert!(matches!(result, Err(OrmError::Query(_))));

        let result = ProductQuery::new()
            .prefetch_related(
                Prefetch::new("categories")
                    .with_query(RelatedQuery::Categories(CategoryQuery::new()))
                    .to_attr("browsable_categories"),
            )
            .execute(&db);
        assert!(result.is_ok());
    }

    #[test]
    fn test_unknown_select_related_is_rejected() {
        let db = Database::new();
        seed(&db, 1);
        let result = ProductQuery::new().select_related("reviews").execute(&db);
        assert!(matches!(result, Err(OrmError::Relationship(_))));
    }
}
