use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Current price for a symbol as used to execute a trade.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StockQuote {
    pub symbol: String,
    pub company_name: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StockProfile {
    pub symbol: String,
    pub company_name: String,
    pub price: Decimal,
    pub changes: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub exchange: Option<String>,
    pub beta: Option<Decimal>,
    pub open: Option<Decimal>,
    pub previous_close: Option<Decimal>,
    pub volume_avg: Option<Decimal>,
    pub year_high: Option<Decimal>,
    pub year_low: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: String,
    pub currency: Option<String>,
    pub exchange: Option<String>,
}

/// One daily candle, `time` is the trading date (`YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PriceBar {
    pub time: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Latest price from the batched quote feed.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PriceTick {
    pub symbol: String,
    pub price: Decimal,
    pub volume: Option<Decimal>,
}

/// Screener thresholds; unset fields fall back to large, liquid, low-beta names.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ScreenerFilters {
    /// Minimum market capitalisation, default 1 000 000 000
    pub market_cap_more_than: Option<u64>,
    /// Minimum average volume, default 1 000 000
    pub volume_more_than: Option<u64>,
    /// Maximum beta, default 1.2
    pub beta_lower_than: Option<Decimal>,
    /// Maximum rows, 1 to 100, default 50
    pub limit: Option<u32>,
}

impl ScreenerFilters {
    pub fn market_cap_floor(&self) -> u64 {
        self.market_cap_more_than.unwrap_or(1_000_000_000)
    }

    pub fn volume_floor(&self) -> u64 {
        self.volume_more_than.unwrap_or(1_000_000)
    }

    pub fn beta_ceiling(&self) -> Decimal {
        self.beta_lower_than.unwrap_or(Decimal::new(12, 1))
    }

    pub fn row_limit(&self) -> u32 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ScreenerRow {
    pub symbol: String,
    pub company_name: String,
    pub price: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub beta: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
}
