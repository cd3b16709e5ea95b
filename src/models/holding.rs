use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A user's position in one symbol. `shares_owned` is never negative.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, ToSchema)]
pub struct Holding {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stock_symbol: String,
    pub stock_name: String,
    pub shares_owned: i64,
    pub avg_buy_price: Decimal,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
