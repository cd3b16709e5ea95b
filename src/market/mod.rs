//! Market data from the external provider.
//!
//! [`PriceLookup`] is the narrow seam the trade workflow depends on;
//! [`MarketData`] adds the read-only passthroughs served to clients.

mod error;
mod fmp;

pub use error::MarketDataError;
pub use fmp::FmpClient;

use async_trait::async_trait;

use crate::models::{
    PriceBar, PriceTick, ScreenerFilters, ScreenerRow, StockProfile, StockQuote, SymbolMatch,
};

/// Most symbols accepted by one batched quote request.
pub const MAX_BATCH_SYMBOLS: usize = 50;

#[async_trait]
pub trait PriceLookup: Send + Sync {
    /// Current price and display name for `symbol`.
    async fn quote(&self, symbol: &str) -> Result<StockQuote, MarketDataError>;
}

#[async_trait]
pub trait MarketData: PriceLookup {
    async fn profile(&self, symbol: &str) -> Result<StockProfile, MarketDataError>;

    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, MarketDataError>;

    /// Daily bars, oldest first.
    async fn history(&self, symbol: &str) -> Result<Vec<PriceBar>, MarketDataError>;

    /// Latest prices for up to [`MAX_BATCH_SYMBOLS`] symbols in one call.
    /// Symbols the provider does not know are left out of the result.
    async fn quotes(&self, symbols: &[String]) -> Result<Vec<PriceTick>, MarketDataError>;

    async fn screener(&self, filters: &ScreenerFilters)
        -> Result<Vec<ScreenerRow>, MarketDataError>;
}
