use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[serde(alias = "BUY")]
    Buy,
    #[serde(alias = "SELL")]
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "buy",
            TransactionType::Sell => "sell",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(TransactionType::Buy),
            "sell" => Ok(TransactionType::Sell),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

/// An executed trade. Rows are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stock_symbol: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub shares: i64,
    pub price_at_exec: Decimal,
    pub stock_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub stock_symbol: String,
    pub kind: TransactionType,
    pub shares: i64,
    pub price_at_exec: Decimal,
    pub stock_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExecuteTradeRequest {
    pub symbol: String,
    #[serde(rename = "type", alias = "order_type")]
    pub kind: TransactionType,
    pub quantity: i64,
    /// Must match the authenticated user when present.
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TradeOutcome {
    pub transaction_id: Uuid,
    pub symbol: String,
    pub stock_name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub quantity: i64,
    pub price: Decimal,
    pub total_amount: Decimal,
    pub shares_owned: i64,
    pub avg_buy_price: Decimal,
    pub balance: Decimal,
    pub executed_at: chrono::DateTime<chrono::Utc>,
}
