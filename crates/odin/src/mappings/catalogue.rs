//! Mappings between catalogue models and resources
//!
//! The read path turns products (with whatever relations the prefetch plan
//! loaded) into [`ProductResource`]s. The write path turns resources back
//! into unsaved models plus the related values that are stored after the
//! products themselves, see [`products_to_db`].

use std::collections::BTreeMap;

use catalogue_orm::{
    AttributeType, AttributeValue, Category, Database, MediaStorage, OrmResult, Product,
    ProductAttributeValue, ProductClass, ProductImage, ProductQuery, ProductStructure,
    StockRecord, slugify,
};
use rust_decimal::Decimal;

use crate::error::{MappingResult, OdinResult};
use crate::mappings::common::{map_source, FieldRule, MapSource, Mapping};
use crate::mappings::context::MappingContext;
use crate::mappings::model_mapper::{ModelMapping, ModelMappingContext};
use crate::mappings::resources_to_db::{resources_to_db, ProductsToDbOptions, SaveReport};
use crate::prefetching::{prefetch_product_queryset, PrefetchRegistry};
use crate::resources::{
    CategoryResource, ParentProductResource, ProductClassResource, ProductImageResource,
    ProductRecommendationResource, ProductResource,
};
use crate::strategy::{DefaultSelector, StockStrategy, StrategyContext, StrategySelector};

// Read path

/// Public URL of a stored file, absent when the file is missing or
/// malformed
fn file_url(media: &MediaStorage, file: Option<&catalogue_orm::FieldFile>) -> Option<String> {
    let file = file?;
    match media.url(file) {
        Ok(url) => Some(url),
        Err(error) => {
            tracing::debug!(file = %file.name, %error, "no url for file");
            None
        }
    }
}

/// Map a product image model to a resource
pub struct ProductImageToResource;

impl ProductImageToResource {
    fn copy_fields(
        image: &ProductImage,
        _context: &MappingContext<'_>,
        resource: &mut ProductImageResource,
    ) -> MappingResult<()> {
        resource.id = image.id;
        resource.code = image.code.clone();
        resource.caption = Some(image.caption.clone());
        resource.display_order = image.display_order;
        resource.date_created = Some(image.date_created);
        Ok(())
    }

    fn original(
        image: &ProductImage,
        context: &MappingContext<'_>,
        resource: &mut ProductImageResource,
    ) -> MappingResult<()> {
        resource.original = file_url(context.media(), image.original.as_ref());
        Ok(())
    }
}

impl Mapping for ProductImageToResource {
    type Source = ProductImage;
    type Target = ProductImageResource;

    const NAME: &'static str = "ProductImageToResource";

    fn rules() -> &'static [FieldRule<ProductImage, ProductImageResource>] {
        const RULES: &[FieldRule<ProductImage, ProductImageResource>] = &[
            FieldRule::new(
                &["id", "code", "caption", "display_order", "date_created"],
                ProductImageToResource::copy_fields,
            ),
            FieldRule::new(&["original"], ProductImageToResource::original),
        ];
        RULES
    }

    fn identify(image: &ProductImage) -> String {
        format!("ProductImage(code={})", image.code)
    }
}

/// Map a category model to a resource
pub struct CategoryToResource;

impl CategoryToResource {
    fn copy_fields(
        category: &Category,
        _context: &MappingContext<'_>,
        resource: &mut CategoryResource,
    ) -> MappingResult<()> {
        resource.id = category.id;
        resource.code = category.code.clone();
        resource.name = Some(category.name.clone());
        resource.slug = Some(category.slug.clone());
        resource.description = Some(category.description.clone());
        resource.meta_description = category.meta_description.clone();
        resource.is_public = Some(category.is_public);
        resource.ancestors_are_public = Some(category.ancestors_are_public);
        resource.depth = Some(category.depth);
        resource.path = category.path.clone();
        Ok(())
    }

    fn meta_title(
        category: &Category,
        _context: &MappingContext<'_>,
        resource: &mut CategoryResource,
    ) -> MappingResult<()> {
        resource.meta_title = Some(category.get_meta_title());
        Ok(())
    }

    fn image(
        category: &Category,
        context: &MappingContext<'_>,
        resource: &mut CategoryResource,
    ) -> MappingResult<()> {
        resource.image = file_url(context.media(), category.image.as_ref());
        Ok(())
    }
}

impl Mapping for CategoryToResource {
    type Source = Category;
    type Target = CategoryResource;

    const NAME: &'static str = "CategoryToResource";

    fn rules() -> &'static [FieldRule<Category, CategoryResource>] {
        const RULES: &[FieldRule<Category, CategoryResource>] = &[
            FieldRule::new(
                &[
                    "id",
                    "code",
                    "name",
                    "slug",
                    "description",
                    "meta_description",
                    "is_public",
                    "ancestors_are_public",
                    "depth",
                    "path",
                ],
                CategoryToResource::copy_fields,
            ),
            FieldRule::new(&["meta_title"], CategoryToResource::meta_title),
            FieldRule::new(&["image"], CategoryToResource::image),
        ];
        RULES
    }

    fn identify(category: &Category) -> String {
        format!("Category(code={})", category.code)
    }
}

pub struct ProductClassToResource;

impl ProductClassToResource {
    fn copy_fields(
        class: &ProductClass,
        _context: &MappingContext<'_>,
        resource: &mut ProductClassResource,
    ) -> MappingResult<()> {
        resource.name = Some(class.name.clone());
        resource.slug = class.slug.clone();
        resource.requires_shipping = Some(class.requires_shipping);
        resource.track_stock = Some(class.track_stock);
        Ok(())
    }
}

impl Mapping for ProductClassToResource {
    type Source = ProductClass;
    type Target = ProductClassResource;

    const NAME: &'static str = "ProductClassToResource";

    fn rules() -> &'static [FieldRule<ProductClass, ProductClassResource>] {
        const RULES: &[FieldRule<ProductClass, ProductClassResource>] = &[FieldRule::new(
            &["name", "slug", "requires_shipping", "track_stock"],
            ProductClassToResource::copy_fields,
        )];
        RULES
    }

    fn identify(class: &ProductClass) -> String {
        format!("ProductClass(slug={})", class.slug)
    }
}

fn structured_value(value: &ProductAttributeValue, media: &MediaStorage) -> OrmResult<AttributeValue> {
    let attribute = value.attribute()?;
    let native = match attribute.attr_type {
        AttributeType::Option => AttributeValue::Text(value.option_label()?),
        AttributeType::MultiOption => AttributeValue::List(
            value
                .multi_option_labels()?
                .into_iter()
                .map(AttributeValue::Text)
                .collect(),
        ),
        AttributeType::File | AttributeType::Image => match value.file() {
            Some(file) => AttributeValue::Text(media.url(file)?),
            None => AttributeValue::Null,
        },
        AttributeType::Entity => match &value.value_entity {
            Some(entity) => match &entity.json {
                Some(json) => AttributeValue::Json(json.clone()),
                None => AttributeValue::Text(format!(
                    "{:?} has no json method, can not convert to json",
                    entity
                )),
            },
            None => AttributeValue::Null,
        },
        _ => value.raw_value()?,
    };
    Ok(native)
}

/// Native value of a stored attribute value.
///
/// Options map to their labels, files to URLs and entities to their JSON
/// projection. When the structured value cannot be read the text rendering
/// of whatever column holds a value is used.
pub fn attribute_value_to_native(value: &ProductAttributeValue, media: &MediaStorage) -> AttributeValue {
    match structured_value(value, media) {
        Ok(AttributeValue::Null) | Err(_) => {
            let text = value.value_as_text();
            if text.is_empty() {
                AttributeValue::Null
            } else {
                AttributeValue::Text(text)
            }
        }
        Ok(native) => native,
    }
}

/// Map a product model to a resource
pub struct ProductToResource;

impl ProductToResource {
    fn copy_fields(
        product: &Product,
        _context: &MappingContext<'_>,
        resource: &mut ProductResource,
    ) -> MappingResult<()> {
        resource.id = product.id;
        resource.upc = product.upc.clone();
        resource.structure = product.structure;
        resource.slug = Some(product.slug.clone());
        resource.description = Some(product.description.clone());
        resource.rating = product.rating;
        resource.is_discountable = product.is_discountable;
        resource.is_public = product.is_public;
        resource.priority = product.priority;
        resource.date_created = Some(product.date_created);
        resource.date_updated = Some(product.date_updated);
        Ok(())
    }

    fn title(product: &Product, context: &MappingContext<'_>, resource: &mut ProductResource) -> MappingResult<()> {
        resource.title = product.get_title(context.db)?;
        Ok(())
    }

    fn meta_title(
        product: &Product,
        context: &MappingContext<'_>,
        resource: &mut ProductResource,
    ) -> MappingResult<()> {
        resource.meta_title = Some(product.get_meta_title(context.db)?);
        Ok(())
    }

    fn images(product: &Product, context: &MappingContext<'_>, resource: &mut ProductResource) -> MappingResult<()> {
        let images = product.get_all_images(context.db)?;
        resource.images = ProductImageToResource::apply_all(images.iter(), context)?;
        Ok(())
    }

    fn parent(product: &Product, context: &MappingContext<'_>, resource: &mut ProductResource) -> MappingResult<()> {
        resource.parent = product.parent(context.db)?.map(|parent| ParentProductResource {
            upc: parent.upc.clone().unwrap_or_default(),
        });
        Ok(())
    }

    fn categories(
        product: &Product,
        context: &MappingContext<'_>,
        resource: &mut ProductResource,
    ) -> MappingResult<()> {
        let categories = product.get_categories(context.db)?;
        resource.categories = CategoryToResource::apply_all(categories.iter(), context)?;
        Ok(())
    }

    fn product_class(
        product: &Product,
        context: &MappingContext<'_>,
        resource: &mut ProductResource,
    ) -> MappingResult<()> {
        if product.is_child() {
            resource.product_class = None;
            return Ok(());
        }
        resource.product_class = match product.get_product_class(context.db)? {
            Some(class) => Some(ProductClassToResource::apply(&class, context)?),
            None => None,
        };
        Ok(())
    }

    fn attributes(
        product: &Product,
        context: &MappingContext<'_>,
        resource: &mut ProductResource,
    ) -> MappingResult<()> {
        let mut attributes = BTreeMap::new();
        for value in product.get_attribute_values(context.db)?.iter() {
            let code = value.attribute()?.code.clone();
            attributes.insert(code, attribute_value_to_native(value, context.media()));
        }
        resource.attributes = attributes;
        Ok(())
    }

    fn recommended_products(
        product: &Product,
        context: &MappingContext<'_>,
        resource: &mut ProductResource,
    ) -> MappingResult<()> {
        resource.recommended_products = product
            .recommended_products(context.db)?
            .iter()
            .map(|recommended| ProductRecommendationResource {
                upc: recommended.upc.clone().unwrap_or_default(),
            })
            .collect();
        Ok(())
    }

    fn price(product: &Product, context: &MappingContext<'_>, resource: &mut ProductResource) -> MappingResult<()> {
        let strategy = context.stock_strategy()?;
        let info = if product.is_parent() {
            strategy.fetch_for_parent(product, context.db)?
        } else {
            strategy.fetch_for_product(product, context.db)?
        };

        resource.price = Some(info.price.excl_tax.unwrap_or(Decimal::ZERO));
        resource.currency = Some(info.price.currency.unwrap_or_default());
        resource.availability = Some(info.availability.num_available.unwrap_or(0));
        resource.is_available_to_buy = Some(info.availability.is_available_to_buy);
        Ok(())
    }

    fn children(product: &Product, context: &MappingContext<'_>, resource: &mut ProductResource) -> MappingResult<()> {
        resource.children = if context.include_children && product.is_parent() {
            let children = product.children(context.db)?;
            Some(Self::apply_all(children.iter(), context)?)
        } else {
            None
        };
        Ok(())
    }
}

impl Mapping for ProductToResource {
    type Source = Product;
    type Target = ProductResource;

    const NAME: &'static str = "ProductToResource";

    fn rules() -> &'static [FieldRule<Product, ProductResource>] {
        const RULES: &[FieldRule<Product, ProductResource>] = &[
            FieldRule::new(
                &[
                    "id",
                    "upc",
                    "structure",
                    "slug",
                    "description",
                    "rating",
                    "is_discountable",
                    "is_public",
                    "priority",
                    "date_created",
                    "date_updated",
                ],
                ProductToResource::copy_fields,
            ),
            FieldRule::new(&["title"], ProductToResource::title),
            FieldRule::new(&["meta_title"], ProductToResource::meta_title),
            FieldRule::new(&["images"], ProductToResource::images),
            FieldRule::new(&["parent"], ProductToResource::parent),
            FieldRule::new(&["categories"], ProductToResource::categories),
            FieldRule::new(&["product_class"], ProductToResource::product_class),
            FieldRule::new(&["attributes"], ProductToResource::attributes),
            FieldRule::new(&["recommended_products"], ProductToResource::recommended_products),
            FieldRule::new(
                &["price", "currency", "availability", "is_available_to_buy"],
                ProductToResource::price,
            ),
            FieldRule::new(&["children"], ProductToResource::children),
        ];
        RULES
    }

    fn identify(product: &Product) -> String {
        match (&product.upc, product.id) {
            (Some(upc), _) => format!("Product(upc={})", upc),
            (None, Some(id)) => format!("Product(id={})", id),
            (None, None) => format!("Product(title={:?})", product.title),
        }
    }
}

// Write path

pub struct ProductImageToModel;

impl ModelMapping for ProductImageToModel {
    type Source = ProductImageResource;
    type Model = ProductImage;
    type Related = ();

    const NAME: &'static str = "ProductImageToModel";

    fn identify(image: &ProductImageResource) -> String {
        format!("ProductImageResource(code={})", image.code)
    }

    fn map_fields(image: &ProductImageResource, context: &ModelMappingContext<'_>) -> MappingResult<ProductImage> {
        Ok(ProductImage {
            id: None,
            product_id: 0,
            code: image.code.clone(),
            original: image.original.as_deref().map(|url| context.media.name_from_url(url)),
            caption: image.caption.clone().unwrap_or_default(),
            display_order: image.display_order,
            date_created: image.date_created.unwrap_or(context.now),
        })
    }
}

pub struct CategoryToModel;

impl ModelMapping for CategoryToModel {
    type Source = CategoryResource;
    type Model = Category;
    type Related = ();

    const NAME: &'static str = "CategoryToModel";

    fn identify(category: &CategoryResource) -> String {
        format!("CategoryResource(code={})", category.code)
    }

    fn map_fields(category: &CategoryResource, context: &ModelMappingContext<'_>) -> MappingResult<Category> {
        let name = category.name.clone().unwrap_or_default();
        let slug = match &category.slug {
            Some(slug) if !slug.is_empty() => slug.clone(),
            _ => slugify(&name),
        };
        Ok(Category {
            id: None,
            code: category.code.clone(),
            slug,
            name,
            description: category.description.clone().unwrap_or_default(),
            meta_title: category.meta_title.clone(),
            meta_description: category.meta_description.clone(),
            image: category.image.as_deref().map(|url| context.media.name_from_url(url)),
            is_public: category.is_public.unwrap_or(true),
            ancestors_are_public: category.ancestors_are_public.unwrap_or(true),
            depth: category.depth.unwrap_or(0),
            path: category.path.clone(),
        })
    }
}

pub struct ProductClassToModel;

impl ModelMapping for ProductClassToModel {
    type Source = ProductClassResource;
    type Model = ProductClass;
    type Related = ();

    const NAME: &'static str = "ProductClassToModel";

    fn identify(class: &ProductClassResource) -> String {
        format!("ProductClassResource(slug={})", class.slug)
    }

    fn map_fields(class: &ProductClassResource, _context: &ModelMappingContext<'_>) -> MappingResult<ProductClass> {
        Ok(ProductClass {
            id: None,
            name: class.name.clone().unwrap_or_else(|| class.slug.clone()),
            slug: class.slug.clone(),
            requires_shipping: class.requires_shipping.unwrap_or(true),
            track_stock: class.track_stock.unwrap_or(true),
        })
    }
}

/// Parent reference to a parent product stub
pub struct ParentToModel;

impl ModelMapping for ParentToModel {
    type Source = ParentProductResource;
    type Model = Product;
    type Related = ();

    const NAME: &'static str = "ParentToModel";

    fn identify(parent: &ParentProductResource) -> String {
        format!("ParentProductResource(upc={})", parent.upc)
    }

    fn map_fields(parent: &ParentProductResource, context: &ModelMappingContext<'_>) -> MappingResult<Product> {
        Ok(Product {
            upc: Some(parent.upc.clone()),
            structure: ProductStructure::Parent,
            date_created: context.now,
            date_updated: context.now,
            ..Product::default()
        })
    }
}

/// Recommendation reference to a product stub
pub struct RecommendedProductToModel;

impl ModelMapping for RecommendedProductToModel {
    type Source = ProductRecommendationResource;
    type Model = Product;
    type Related = ();

    const NAME: &'static str = "RecommendedProductToModel";

    fn identify(recommended: &ProductRecommendationResource) -> String {
        format!("ProductRecommendationResource(upc={})", recommended.upc)
    }

    fn map_fields(
        recommended: &ProductRecommendationResource,
        _context: &ModelMappingContext<'_>,
    ) -> MappingResult<Product> {
        Ok(Product {
            upc: Some(recommended.upc.clone()),
            ..Product::default()
        })
    }
}

/// A stock record waiting for its partner to be resolved
#[derive(Debug, Clone, PartialEq)]
pub struct StockRecordDraft {
    pub partner_code: String,
    pub record: StockRecord,
}

/// Values of a product resource that are stored after the product
#[derive(Debug, Clone, Default)]
pub struct ProductRelatedValues {
    pub images: Vec<ProductImage>,
    pub categories: Vec<Category>,
    pub stockrecord: Option<StockRecordDraft>,
    pub recommended_products: Vec<Product>,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub product_class: Option<ProductClass>,
    pub parent: Option<Product>,
}

/// Map a product resource to an unsaved product
pub struct ProductToModel;

impl ProductToModel {
    fn stockrecord(product: &ProductResource, context: &ModelMappingContext<'_>) -> Option<StockRecordDraft> {
        let upc = product.upc.as_deref().filter(|upc| !upc.is_empty())?;
        let currency = product.currency.as_deref().filter(|currency| !currency.is_empty())?;
        let partner = product.partner.as_ref().filter(|partner| !partner.code.is_empty())?;

        Some(StockRecordDraft {
            partner_code: partner.code.clone(),
            record: StockRecord {
                partner_sku: upc.to_string(),
                price_currency: currency.to_string(),
                price: product.price,
                num_in_stock: product.availability,
                date_created: context.now,
                date_updated: context.now,
                ..StockRecord::default()
            },
        })
    }
}

impl ModelMapping for ProductToModel {
    type Source = ProductResource;
    type Model = Product;
    type Related = ProductRelatedValues;

    const NAME: &'static str = "ProductToModel";

    fn identify(product: &ProductResource) -> String {
        product.identify()
    }

    fn map_fields(product: &ProductResource, context: &ModelMappingContext<'_>) -> MappingResult<Product> {
        let slug = match &product.slug {
            Some(slug) if !slug.is_empty() => slug.clone(),
            // A child's title may be the parent's display fallback
            _ if product.structure == ProductStructure::Child => String::new(),
            _ => slugify(&product.title),
        };
        Ok(Product {
            id: None,
            upc: product.upc.clone(),
            structure: product.structure,
            parent_id: None,
            product_class_id: None,
            title: product.title.clone(),
            slug,
            description: product.description.clone().unwrap_or_default(),
            meta_title: product.meta_title.clone(),
            meta_description: None,
            rating: product.rating,
            is_discountable: product.is_discountable,
            is_public: product.is_public,
            priority: product.priority,
            date_created: product.date_created.unwrap_or(context.now),
            date_updated: product.date_updated.unwrap_or(context.now),
            ..Product::default()
        })
    }

    fn related_field_values(
        product: &ProductResource,
        context: &ModelMappingContext<'_>,
    ) -> MappingResult<ProductRelatedValues> {
        let product_class = match &product.product_class {
            Some(class) if product.structure != ProductStructure::Child => {
                Some(ProductClassToModel::apply(class, context)?.instance)
            }
            _ => None,
        };
        let parent = match &product.parent {
            Some(parent) => Some(ParentToModel::apply(parent, context)?.instance),
            None => None,
        };

        Ok(ProductRelatedValues {
            images: ProductImageToModel::apply_all(&product.images, context)?,
            categories: CategoryToModel::apply_all(&product.categories, context)?,
            stockrecord: Self::stockrecord(product, context),
            recommended_products: RecommendedProductToModel::apply_all(&product.recommended_products, context)?,
            attributes: product.attributes.clone(),
            product_class,
            parent,
        })
    }
}

// Orchestration

/// Map one product or a collection of products to resources, using the
/// strategy the default selector picks for `context`
pub fn product_to_resource<S>(
    db: &Database,
    source: S,
    context: &StrategyContext,
    include_children: bool,
) -> OdinResult<S::Output<ProductResource>>
where
    S: MapSource<Product>,
{
    product_to_resource_with_selector(db, source, &DefaultSelector, context, include_children)
}

pub fn product_to_resource_with_selector<S, Sel>(
    db: &Database,
    source: S,
    selector: &Sel,
    context: &StrategyContext,
    include_children: bool,
) -> OdinResult<S::Output<ProductResource>>
where
    S: MapSource<Product>,
    Sel: StrategySelector + ?Sized,
{
    let strategy = selector.strategy(context);
    product_to_resource_with_strategy(db, source, strategy.as_ref(), include_children)
}

pub fn product_to_resource_with_strategy<S>(
    db: &Database,
    source: S,
    stock_strategy: &dyn StockStrategy,
    include_children: bool,
) -> OdinResult<S::Output<ProductResource>>
where
    S: MapSource<Product>,
{
    product_to_resource_with_mapper::<ProductToResource, S>(db, source, stock_strategy, include_children)
}

/// Map products with a custom product mapping
pub fn product_to_resource_with_mapper<M, S>(
    db: &Database,
    source: S,
    stock_strategy: &dyn StockStrategy,
    include_children: bool,
) -> OdinResult<S::Output<M::Target>>
where
    M: Mapping<Source = Product>,
    S: MapSource<Product>,
{
    let context = MappingContext::new(db)
        .with_stock_strategy(stock_strategy)
        .with_include_children(include_children);
    Ok(map_source::<M, S>(source, &context)?)
}

/// Apply the prefetch plan of `registry` to `query`, load the products and
/// map them to resources
pub fn product_queryset_to_resources(
    db: &Database,
    query: ProductQuery,
    registry: &PrefetchRegistry,
    context: &StrategyContext,
    include_children: bool,
) -> OdinResult<Vec<ProductResource>> {
    let query = prefetch_product_queryset(query, registry, include_children);
    let products = query.execute(db)?;
    tracing::debug!(products = products.len(), include_children, "mapping product queryset");
    product_to_resource(db, products, context, include_children)
}

/// Persist product resources, see [`ProductsToDbOptions`]
pub fn products_to_db(
    db: &Database,
    resources: Vec<ProductResource>,
    options: &ProductsToDbOptions,
) -> OdinResult<(Vec<Product>, SaveReport)> {
    products_to_db_with_mapper::<ProductToModel>(db, resources, options)
}

/// Persist product resources with a custom product model mapping
pub fn products_to_db_with_mapper<M>(
    db: &Database,
    resources: Vec<ProductResource>,
    options: &ProductsToDbOptions,
) -> OdinResult<(Vec<Product>, SaveReport)>
where
    M: ModelMapping<Source = ProductResource, Model = Product, Related = ProductRelatedValues>,
{
    resources_to_db::<M>(db, resources, options)
}
