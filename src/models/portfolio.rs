use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PositionValuation {
    pub symbol: String,
    pub stock_name: String,
    pub shares_owned: i64,
    pub avg_buy_price: Decimal,
    /// Falls back to the average buy price when no live quote was available.
    pub market_price: Decimal,
    pub price_available: bool,
    pub market_value: Decimal,
    pub cost_basis: Decimal,
    pub unrealized_gain: Decimal,
    pub unrealized_gain_pct: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PortfolioValuation {
    pub cash_balance: Decimal,
    pub holdings_value: Decimal,
    pub cost_basis: Decimal,
    pub unrealized_gain: Decimal,
    pub total_value: Decimal,
    pub positions: Vec<PositionValuation>,
}
