//! Read-path mapping primitives
//!
//! A mapping is an ordered list of field rules. Each rule reads the source
//! entity and the shared [`MappingContext`] and writes one or more fields of
//! the target. A failing rule is reported with the mapping name, the output
//! fields and the source entity.

use catalogue_orm::{
    BillingAddress, Category, Country, Product, ProductClass, ProductImage, ShippingAddress,
};

use crate::error::{MappingError, MappingResult};
use crate::mappings::context::MappingContext;

pub type Resolve<S, T> = fn(&S, &MappingContext<'_>, &mut T) -> MappingResult<()>;

/// One translation step of a mapping
pub struct FieldRule<S, T> {
    /// Output fields written by the rule
    pub to_fields: &'static [&'static str],
    pub resolve: Resolve<S, T>,
}

impl<S, T> FieldRule<S, T> {
    pub const fn new(to_fields: &'static [&'static str], resolve: Resolve<S, T>) -> Self {
        Self { to_fields, resolve }
    }
}

pub trait Mapping {
    type Source: 'static;
    type Target: Default + 'static;

    /// Name used in error reports
    const NAME: &'static str;

    fn rules() -> &'static [FieldRule<Self::Source, Self::Target>];

    /// Short description of a source entity for error reports
    fn identify(source: &Self::Source) -> String;

    /// Map one entity
    fn apply(source: &Self::Source, context: &MappingContext<'_>) -> MappingResult<Self::Target> {
        let mut target = Self::Target::default();
        for rule in Self::rules() {
            (rule.resolve)(source, context, &mut target).map_err(|error| MappingError::Field {
                mapping: Self::NAME,
                field: rule.to_fields.join(", "),
                entity: Self::identify(source),
                source: Box::new(error),
            })?;
        }
        Ok(target)
    }

    /// Map entities in order, stopping at the first failure
    fn apply_all<'s, I>(sources: I, context: &MappingContext<'_>) -> MappingResult<Vec<Self::Target>>
    where
        I: IntoIterator<Item = &'s Self::Source>,
    {
        sources
            .into_iter()
            .map(|source| Self::apply(source, context))
            .collect()
    }
}

/// One entity or a collection of entities; the mapped output has the same
/// shape
pub trait MapSource<S> {
    type Output<T>;

    fn map_with<T, F>(self, f: F) -> MappingResult<Self::Output<T>>
    where
        F: FnMut(&S) -> MappingResult<T>;
}

macro_rules! single_source {
    ($($entity:ty),* $(,)?) => {
        $(
            impl<'a> MapSource<$entity> for &'a $entity {
                type Output<T> = T;

                fn map_with<T, F>(self, mut f: F) -> MappingResult<Self::Output<T>>
                where
                    F: FnMut(&$entity) -> MappingResult<T>,
                {
                    f(self)
                }
            }
        )*
    };
}

single_source!(Product, Category, ProductClass, ProductImage, Country, BillingAddress, ShippingAddress);

impl<'a, S> MapSource<S> for &'a [S] {
    type Output<T> = Vec<T>;

    fn map_with<T, F>(self, f: F) -> MappingResult<Self::Output<T>>
    where
        F: FnMut(&S) -> MappingResult<T>,
    {
        self.iter().map(f).collect()
    }
}

impl<'a, S> MapSource<S> for &'a Vec<S> {
    type Output<T> = Vec<T>;

    fn map_with<T, F>(self, f: F) -> MappingResult<Self::Output<T>>
    where
        F: FnMut(&S) -> MappingResult<T>,
    {
        self.iter().map(f).collect()
    }
}

impl<S> MapSource<S> for Vec<S> {
    type Output<T> = Vec<T>;

    fn map_with<T, F>(self, f: F) -> MappingResult<Self::Output<T>>
    where
        F: FnMut(&S) -> MappingResult<T>,
    {
        self.iter().map(f).collect()
    }
}

/// Map one entity or a collection with `M`
pub fn map_source<M, S>(source: S, context: &MappingContext<'_>) -> MappingResult<S::Output<M::Target>>
where
    M: Mapping,
    S: MapSource<M::Source>,
{
    source.map_with(|entity| M::apply(entity, context))
}
