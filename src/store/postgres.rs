use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgRow, Postgres};
use sqlx::{PgPool, Row, Transaction};
use uuid::Uuid;

use super::{Ledger, LedgerTx, StoreError};
use crate::models::{Account, Holding, NewTransaction, TransactionRecord};

const HOLDING_COLUMNS: &str =
    "id, user_id, stock_symbol, stock_name, shares_owned, avg_buy_price, updated_at";

#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

fn transaction_from_row(row: &PgRow) -> Result<TransactionRecord, StoreError> {
    let kind: String = row.try_get("type")?;
    Ok(TransactionRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        stock_symbol: row.try_get("stock_symbol")?,
        kind: kind.parse().map_err(StoreError::Corrupt)?,
        shares: row.try_get("shares")?,
        price_at_exec: row.try_get("price_at_exec")?,
        stock_name: row.try_get("stock_name")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Ledger for PgLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn open_account(&self, user_id: Uuid, opening_balance: Decimal) -> Result<Account, StoreError> {
        sqlx::query(
            "INSERT INTO accounts (user_id, balance) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(opening_balance)
        .execute(&self.pool)
        .await?;

        self.get_account(user_id).await
    }

    async fn get_account(&self, user_id: Uuid) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(
            "SELECT user_id, balance, created_at, updated_at FROM accounts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::AccountNotFound(user_id))
    }

    async fn list_holdings(&self, user_id: Uuid) -> Result<Vec<Holding>, StoreError> {
        let holdings = sqlx::query_as::<_, Holding>(&format!(
            "SELECT {HOLDING_COLUMNS} FROM holdings \
             WHERE user_id = $1 AND shares_owned > 0 ORDER BY stock_symbol"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(holdings)
    }

    async fn list_transactions(&self, user_id: Uuid, limit: i64) -> Result<Vec<TransactionRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, stock_symbol, type, shares, price_at_exec, stock_name, created_at
            FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(transaction_from_row).collect()
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn get_balance(&mut self, user_id: Uuid) -> Result<Decimal, StoreError> {
        sqlx::query_scalar::<Postgres, Decimal>(
            "SELECT balance FROM accounts WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(StoreError::AccountNotFound(user_id))
    }

    async fn set_balance(&mut self, user_id: Uuid, balance: Decimal) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE accounts SET balance = $1, updated_at = NOW() WHERE user_id = $2",
        )
        .bind(balance)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AccountNotFound(user_id));
        }
        Ok(())
    }

    async fn get_holding(&mut self, user_id: Uuid, symbol: &str) -> Result<Option<Holding>, StoreError> {
        let holding = sqlx::query_as::<_, Holding>(&format!(
            "SELECT {HOLDING_COLUMNS} FROM holdings \
             WHERE user_id = $1 AND stock_symbol = $2 FOR UPDATE"
        ))
        .bind(user_id)
        .bind(symbol)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(holding)
    }

    async fn upsert_holding(
        &mut self,
        user_id: Uuid,
        symbol: &str,
        shares_owned: i64,
        avg_buy_price: Decimal,
        stock_name: &str,
    ) -> Result<Holding, StoreError> {
        if shares_owned < 0 {
            return Err(StoreError::NegativeShares(shares_owned));
        }

        let holding = sqlx::query_as::<_, Holding>(&format!(
            r#"
            INSERT INTO holdings (id, user_id, stock_symbol, stock_name, shares_owned, avg_buy_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, stock_symbol) DO UPDATE SET
                shares_owned = EXCLUDED.shares_owned,
                avg_buy_price = EXCLUDED.avg_buy_price,
                stock_name = EXCLUDED.stock_name,
                updated_at = NOW()
            RETURNING {HOLDING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(symbol)
        .bind(stock_name)
        .bind(shares_owned)
        .bind(avg_buy_price)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(holding)
    }

    async fn record(&mut self, trade: NewTransaction) -> Result<TransactionRecord, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (id, user_id, stock_symbol, type, shares, price_at_exec, stock_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, stock_symbol, type, shares, price_at_exec, stock_name, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(trade.user_id)
        .bind(&trade.stock_symbol)
        .bind(trade.kind.as_str())
        .bind(trade.shares)
        .bind(trade.price_at_exec)
        .bind(&trade.stock_name)
        .fetch_one(&mut *self.tx)
        .await?;

        transaction_from_row(&row)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgLedgerTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let PgLedgerTx { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}
