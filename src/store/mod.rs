//! Account ledger, holdings store and transaction recorder.
//!
//! Reads that feed a trade decision and the writes that follow it happen
//! on one [`LedgerTx`]. Implementations must lock the account row on
//! [`LedgerTx::get_balance`] and the holding row on
//! [`LedgerTx::get_holding`] until commit or rollback, so two trades for
//! the same user never interleave.

mod memory;
mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Account, Holding, NewTransaction, TransactionRecord};

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
pub const MAX_HISTORY_LIMIT: i64 = 200;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Account not found for user {0}")]
    AccountNotFound(Uuid),

    #[error("Refusing to write negative share count {0}")]
    NegativeShares(i64),

    /// The database aborted the unit of work; it may be retried.
    #[error("Write conflict")]
    Conflict,

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // serialization_failure, deadlock_detected
            if matches!(db_err.code().as_deref(), Some("40001") | Some("40P01")) {
                return StoreError::Conflict;
            }
        }
        StoreError::Database(err)
    }
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError>;

    /// Creates the account with `opening_balance` unless it already exists.
    async fn open_account(&self, user_id: Uuid, opening_balance: Decimal) -> Result<Account, StoreError>;

    async fn get_account(&self, user_id: Uuid) -> Result<Account, StoreError>;

    /// Positions with at least one share, ordered by symbol.
    async fn list_holdings(&self, user_id: Uuid) -> Result<Vec<Holding>, StoreError>;

    /// Newest first.
    async fn list_transactions(&self, user_id: Uuid, limit: i64) -> Result<Vec<TransactionRecord>, StoreError>;
}

/// One unit of work. Dropping it without [`commit`](LedgerTx::commit)
/// discards every write.
#[async_trait]
pub trait LedgerTx: Send {
    async fn get_balance(&mut self, user_id: Uuid) -> Result<Decimal, StoreError>;

    async fn set_balance(&mut self, user_id: Uuid, balance: Decimal) -> Result<(), StoreError>;

    async fn get_holding(&mut self, user_id: Uuid, symbol: &str) -> Result<Option<Holding>, StoreError>;

    async fn upsert_holding(
        &mut self,
        user_id: Uuid,
        symbol: &str,
        shares_owned: i64,
        avg_buy_price: Decimal,
        stock_name: &str,
    ) -> Result<Holding, StoreError>;

    async fn record(&mut self, trade: NewTransaction) -> Result<TransactionRecord, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

pub fn clamp_history_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}
