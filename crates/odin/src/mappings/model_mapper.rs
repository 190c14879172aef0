//! Write-path mapping: resources to unsaved models
//!
//! A model mapping splits a resource into the model's own columns and the
//! related values that can only be stored once the model has a primary key.

use catalogue_orm::MediaStorage;
use chrono::{DateTime, Utc};

use crate::error::{MappingError, MappingResult};

/// Shared state of one write-path mapping call
#[derive(Debug, Clone, Copy)]
pub struct ModelMappingContext<'a> {
    /// Storage used to turn image URLs back into file names
    pub media: &'a MediaStorage,
    /// Timestamp for missing creation dates
    pub now: DateTime<Utc>,
}

impl<'a> ModelMappingContext<'a> {
    pub fn new(media: &'a MediaStorage) -> Self {
        Self {
            media,
            now: Utc::now(),
        }
    }
}

/// A mapped model and the related values saved after it
#[derive(Debug, Clone)]
pub struct MappedModel<M, R> {
    pub instance: M,
    pub related: R,
}

pub trait ModelMapping {
    type Source;
    type Model;
    type Related: Default;

    const NAME: &'static str;

    fn identify(source: &Self::Source) -> String;

    /// The model's own columns
    fn map_fields(source: &Self::Source, context: &ModelMappingContext<'_>) -> MappingResult<Self::Model>;

    /// Values stored in other tables
    fn related_field_values(
        _source: &Self::Source,
        _context: &ModelMappingContext<'_>,
    ) -> MappingResult<Self::Related> {
        Ok(Self::Related::default())
    }

    fn apply(
        source: &Self::Source,
        context: &ModelMappingContext<'_>,
    ) -> MappingResult<MappedModel<Self::Model, Self::Related>> {
        let wrap = |field: &str, error: MappingError| MappingError::Field {
            mapping: Self::NAME,
            field: field.to_string(),
            entity: Self::identify(source),
            source: Box::new(error),
        };

        let instance = Self::map_fields(source, context).map_err(|error| wrap("fields", error))?;
        let related =
            Self::related_field_values(source, context).map_err(|error| wrap("related", error))?;
        Ok(MappedModel { instance, related })
    }

    /// Map only the model columns of many resources
    fn apply_all<'s, I>(sources: I, context: &ModelMappingContext<'_>) -> MappingResult<Vec<Self::Model>>
    where
        I: IntoIterator<Item = &'s Self::Source>,
        Self::Source: 's,
    {
        sources
            .into_iter()
            .map(|source| Self::apply(source, context).map(|mapped| mapped.instance))
            .collect()
    }
}
