use std::fmt;

use catalogue_orm::{Database, MediaStorage};

use crate::error::{MappingError, MappingResult};
use crate::strategy::StockStrategy;

/// Shared read-only state of one read-path mapping call
#[derive(Clone, Copy)]
pub struct MappingContext<'a> {
    pub db: &'a Database,
    pub stock_strategy: Option<&'a dyn StockStrategy>,
    pub include_children: bool,
}

impl<'a> MappingContext<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            stock_strategy: None,
            include_children: false,
        }
    }

    pub fn with_stock_strategy(mut self, strategy: &'a dyn StockStrategy) -> Self {
        self.stock_strategy = Some(strategy);
        self
    }

    pub fn with_include_children(mut self, include_children: bool) -> Self {
        self.include_children = include_children;
        self
    }

    pub fn media(&self) -> &'a MediaStorage {
        self.db.media()
    }

    pub fn stock_strategy(&self) -> MappingResult<&'a dyn StockStrategy> {
        self.stock_strategy.ok_or_else(|| {
            MappingError::invalid_value("stock_strategy", "no stock strategy in the mapping context")
        })
    }
}

impl fmt::Debug for MappingContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingContext")
            .field("has_stock_strategy", &self.stock_strategy.is_some())
            .field("include_children", &self.include_children)
            .finish_non_exhaustive()
    }
}
