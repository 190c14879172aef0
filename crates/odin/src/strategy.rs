//! Stock and pricing strategies
//!
//! A strategy resolves the price and availability of a product from its
//! stock records. Parent products are priced from their public children.

use std::collections::BTreeMap;

use catalogue_orm::{Database, OrmResult, Product, ProductClass, StockRecord};
use rust_decimal::Decimal;

/// Price of a product. `exists` is false when no price is known.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Price {
    pub currency: Option<String>,
    pub excl_tax: Option<Decimal>,
    pub incl_tax: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub exists: bool,
}

impl Price {
    /// A known price with no tax
    pub fn fixed(currency: impl Into<String>, excl_tax: Decimal) -> Self {
        Self {
            currency: Some(currency.into()),
            excl_tax: Some(excl_tax),
            incl_tax: Some(excl_tax),
            tax: Some(Decimal::ZERO),
            exists: true,
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub num_available: Option<i64>,
    pub is_available_to_buy: bool,
    pub message: String,
}

impl Availability {
    /// Buyable without a stock limit
    pub fn available() -> Self {
        Self {
            num_available: None,
            is_available_to_buy: true,
            message: "Available".to_string(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            num_available: None,
            is_available_to_buy: false,
            message: "Unavailable".to_string(),
        }
    }

    /// Buyable while there is net stock left
    pub fn stock_required(num_available: Option<i64>) -> Self {
        let in_stock = num_available.unwrap_or(0);
        Self {
            num_available: Some(in_stock),
            is_available_to_buy: in_stock > 0,
            message: if in_stock > 0 {
                format!("In stock ({} available)", in_stock)
            } else {
                "Unavailable".to_string()
            },
        }
    }
}

/// Result of a strategy lookup
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseInfo {
    pub price: Price,
    pub availability: Availability,
    pub stockrecord: Option<StockRecord>,
}

pub trait StockStrategy: Send + Sync {
    /// Price and availability of a standalone or child product
    fn fetch_for_product(&self, product: &Product, db: &Database) -> OrmResult<PurchaseInfo>;

    /// Price and availability of a parent product, aggregated over its
    /// children
    fn fetch_for_parent(&self, product: &Product, db: &Database) -> OrmResult<PurchaseInfo>;
}

/// Uses the first stock record, prices it without tax and requires stock
/// when the product class tracks stock
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStrategy;

impl DefaultStrategy {
    pub fn new() -> Self {
        Self
    }

    fn select_stockrecord(&self, product: &Product, db: &Database) -> OrmResult<Option<StockRecord>> {
        Ok(product.stockrecords(db)?.first().cloned())
    }

    fn pricing_policy(&self, stockrecord: Option<&StockRecord>) -> Price {
        match stockrecord {
            Some(record) => match record.price {
                Some(price) => Price::fixed(record.price_currency.as_str(), price),
                None => Price::unavailable(),
            },
            None => Price::unavailable(),
        }
    }

    fn availability_policy(
        &self,
        product_class: Option<&ProductClass>,
        stockrecord: Option<&StockRecord>,
    ) -> Availability {
        let Some(record) = stockrecord else {
            return Availability::unavailable();
        };
        if product_class.is_some_and(|class| !class.track_stock) {
            return Availability::available();
        }
        Availability::stock_required(record.net_stock_level())
    }
}

impl StockStrategy for DefaultStrategy {
    fn fetch_for_product(&self, product: &Product, db: &Database) -> OrmResult<PurchaseInfo> {
        let stockrecord = self.select_stockrecord(product, db)?;
        let product_class = product.get_product_class(db)?;

        Ok(PurchaseInfo {
            price: self.pricing_policy(stockrecord.as_ref()),
            availability: self.availability_policy(product_class.as_deref(), stockrecord.as_ref()),
            stockrecord,
        })
    }

    fn fetch_for_parent(&self, product: &Product, db: &Database) -> OrmResult<PurchaseInfo> {
        // Children share the parent's class
        let product_class = product.product_class(db)?;
        let children = product.public_children(db)?;

        let mut children_stock = Vec::with_capacity(children.len());
        for child in children.iter() {
            children_stock.push(self.select_stockrecord(child, db)?);
        }

        let first_stocked = children_stock.iter().flatten().next();
        let price = self.pricing_policy(first_stocked);

        let availability = if children_stock.iter().any(|stockrecord| {
            self.availability_policy(product_class.as_deref(), stockrecord.as_ref())
                .is_available_to_buy
        }) {
            Availability::available()
        } else {
            Availability::unavailable()
        };

        Ok(PurchaseInfo {
            price,
            availability,
            stockrecord: first_stocked.cloned(),
        })
    }
}

/// Request and user information a selector may use to pick a strategy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyContext {
    pub request: Option<BTreeMap<String, String>>,
    pub user: Option<String>,
}

impl StrategyContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_request_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Picks the stock strategy for a request
pub trait StrategySelector {
    fn strategy(&self, context: &StrategyContext) -> Box<dyn StockStrategy>;
}

/// Always selects [`DefaultStrategy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSelector;

impl StrategySelector for DefaultSelector {
    fn strategy(&self, _context: &StrategyContext) -> Box<dyn StockStrategy> {
        Box::new(DefaultStrategy::new())
    }
}
