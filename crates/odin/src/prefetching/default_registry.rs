//! The prefetch plan used by the product mapping
//!
//! Every relation [`ProductToResource`](crate::mappings::ProductToResource)
//! reads has a directive here; a relation read without one costs a query
//! per product.

use std::ops::{Deref, DerefMut};

use catalogue_orm::ProductQuery;

use crate::prefetching::registry::{PrefetchContext, PrefetchDirective, PrefetchRegistry};

pub const PREFETCH_ATTRIBUTE_VALUES: &str = "prefetch_attribute_values";
pub const PREFETCH_BROWSABLE_CATEGORIES: &str = "prefetch_browsable_categories";
pub const PREFETCH_PUBLIC_CHILDREN_STOCKRECORDS: &str = "prefetch_public_children_stockrecords";

/// Attribute values, including those of parents and children when
/// children are requested
pub fn prefetch_attribute_values(query: ProductQuery, context: &PrefetchContext) -> ProductQuery {
    query.prefetch_attribute_values(context.include_children)
}

/// Browsable categories of products and their parents
pub fn prefetch_browsable_categories(query: ProductQuery, _context: &PrefetchContext) -> ProductQuery {
    query.prefetch_browsable_categories()
}

/// Public children with their stock records, for parent pricing
pub fn prefetch_public_children_stockrecords(
    query: ProductQuery,
    _context: &PrefetchContext,
) -> ProductQuery {
    query.prefetch_public_children(ProductQuery::new().prefetch_related("stockrecords"))
}

/// Built-in transform directive by name
pub fn builtin_transform(name: &str) -> Option<PrefetchDirective> {
    let directive = match name {
        PREFETCH_ATTRIBUTE_VALUES => PrefetchDirective::transform(name, prefetch_attribute_values),
        PREFETCH_BROWSABLE_CATEGORIES => {
            PrefetchDirective::transform(name, prefetch_browsable_categories)
        }
        PREFETCH_PUBLIC_CHILDREN_STOCKRECORDS => {
            PrefetchDirective::transform(name, prefetch_public_children_stockrecords)
        }
        _ => return None,
    };
    Some(directive)
}

/// Registry populated with everything the product mapping needs.
///
/// Customise it by unregistering or registering directives before the
/// first query is mapped:
///
/// ```
/// use oscar_odin::prefetching::DefaultPrefetchRegistry;
///
/// let mut registry = DefaultPrefetchRegistry::new();
/// registry.unregister_prefetch("parent__images");
/// assert!(!registry.contains_prefetch("parent__images"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultPrefetchRegistry {
    registry: PrefetchRegistry,
}

impl DefaultPrefetchRegistry {
    pub fn new() -> Self {
        let mut registry = PrefetchRegistry::new();
        Self::register(&mut registry);
        Self { registry }
    }

    /// Add the default directives to `registry`
    pub fn register(registry: &mut PrefetchRegistry) {
        // product_class -> get_product_class
        registry.register_select_related(["product_class", "parent"]);

        // images -> get_all_images
        registry.register_prefetch("images");

        // price fan-out -> fetch_for_product
        registry.register_prefetch("stockrecords");

        registry.register_prefetch("categories");

        // A child falls back to its parent's class and images
        registry.register_prefetch("parent__product_class");
        registry.register_prefetch("parent__images");

        registry.register_prefetch("recommended_products");

        // attributes -> get_attribute_values
        registry.register_prefetch(PrefetchDirective::transform(
            PREFETCH_ATTRIBUTE_VALUES,
            prefetch_attribute_values,
        ));

        // categories -> get_categories, which reads the parent's for a child
        registry.register_prefetch(PrefetchDirective::transform(
            PREFETCH_BROWSABLE_CATEGORIES,
            prefetch_browsable_categories,
        ));

        // fetch_for_parent -> public children -> stockrecords
        registry.register_prefetch(PrefetchDirective::transform(
            PREFETCH_PUBLIC_CHILDREN_STOCKRECORDS,
            prefetch_public_children_stockrecords,
        ));

        registry.register_children_prefetch("children__images");
        registry.register_children_prefetch("children__stockrecords");
        registry.register_children_prefetch("children__recommended_products");
    }

    pub fn into_inner(self) -> PrefetchRegistry {
        self.registry
    }
}

impl Default for DefaultPrefetchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for DefaultPrefetchRegistry {
    type Target = PrefetchRegistry;

    fn deref(&self) -> &Self::Target {
        &self.registry
    }
}

impl DerefMut for DefaultPrefetchRegistry {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.registry
    }
}

impl From<DefaultPrefetchRegistry> for PrefetchRegistry {
    fn from(registry: DefaultPrefetchRegistry) -> Self {
        registry.registry
    }
}

/// A freshly populated default registry. Build it once at startup and pass
/// it by reference.
pub fn default_prefetch_registry() -> PrefetchRegistry {
    DefaultPrefetchRegistry::new().into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_transforms() {
        for name in [
            PREFETCH_ATTRIBUTE_VALUES,
            PREFETCH_BROWSABLE_CATEGORIES,
            PREFETCH_PUBLIC_CHILDREN_STOCKRECORDS,
        ] {
            assert_eq!(builtin_transform(name).map(|d| d.key().to_string()), Some(name.to_string()));
        }
        assert!(builtin_transform("prefetch_everything").is_none());
    }

    #[test]
    fn test_attribute_values_follow_include_children() {
        let registry = DefaultPrefetchRegistry::new();

        let query = registry.apply(ProductQuery::new(), false);
        assert!(query.has_prefetch("attribute_values"));
        assert!(!query.has_prefetch("parent__attribute_values"));
        assert!(!query.has_prefetch("children__images"));

        let query = registry.apply(ProductQuery::new(), true);
        assert!(query.has_prefetch("parent__attribute_values"));
        assert!(query.has_prefetch("children__attribute_values"));
        assert!(query.has_prefetch("children__stockrecords"));
    }
}
