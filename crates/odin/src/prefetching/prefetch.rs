use catalogue_orm::ProductQuery;

use crate::prefetching::registry::PrefetchRegistry;

/// Attach the registry's select-related paths and prefetches to `query`.
/// Children prefetches are added only when `include_children` is set.
pub fn prefetch_product_queryset(
    query: ProductQuery,
    registry: &PrefetchRegistry,
    include_children: bool,
) -> ProductQuery {
    registry.apply(query, include_children)
}
