use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Ledger, LedgerTx, StoreError};
use crate::models::{Account, Holding, NewTransaction, TransactionRecord};

#[derive(Clone, Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    holdings: HashMap<(Uuid, String), Holding>,
    transactions: Vec<TransactionRecord>,
}

/// Process-local ledger. A unit of work holds the whole store lock until it
/// commits or is dropped, so trades are fully serialised.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryLedgerTx { guard, staged }))
    }

    async fn open_account(&self, user_id: Uuid, opening_balance: Decimal) -> Result<Account, StoreError> {
        let mut tables = self.tables.lock().await;
        let account = tables.accounts.entry(user_id).or_insert_with(|| {
            let now = Utc::now();
            Account {
                user_id,
                balance: opening_balance,
                created_at: now,
                updated_at: now,
            }
        });
        Ok(account.clone())
    }

    async fn get_account(&self, user_id: Uuid) -> Result<Account, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .accounts
            .get(&user_id)
            .cloned()
            .ok_or(StoreError::AccountNotFound(user_id))
    }

    async fn list_holdings(&self, user_id: Uuid) -> Result<Vec<Holding>, StoreError> {
        let tables = self.tables.lock().await;
        let mut holdings: Vec<Holding> = tables
            .holdings
            .values()
            .filter(|h| h.user_id == user_id && h.shares_owned > 0)
            .cloned()
            .collect();
        holdings.sort_by(|a, b| a.stock_symbol.cmp(&b.stock_symbol));
        Ok(holdings)
    }

    async fn list_transactions(&self, user_id: Uuid, limit: i64) -> Result<Vec<TransactionRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn get_balance(&mut self, user_id: Uuid) -> Result<Decimal, StoreError> {
        self.staged
            .accounts
            .get(&user_id)
            .map(|a| a.balance)
            .ok_or(StoreError::AccountNotFound(user_id))
    }

    async fn set_balance(&mut self, user_id: Uuid, balance: Decimal) -> Result<(), StoreError> {
        let account = self
            .staged
            .accounts
            .get_mut(&user_id)
            .ok_or(StoreError::AccountNotFound(user_id))?;
        account.balance = balance;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn get_holding(&mut self, user_id: Uuid, symbol: &str) -> Result<Option<Holding>, StoreError> {
        Ok(self
            .staged
            .holdings
            .get(&(user_id, symbol.to_string()))
            .cloned())
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
        if !self.staged.accounts.contains_key(&user_id) {
            return Err(StoreError::AccountNotFound(user_id));
        }

        let holding = self
            .staged
            .holdings
            .entry((user_id, symbol.to_string()))
            .or_insert_with(|| Holding {
                id: Uuid::new_v4(),
                user_id,
                stock_symbol: symbol.to_string(),
                stock_name: String::new(),
                shares_owned: 0,
                avg_buy_price: Decimal::ZERO,
                updated_at: Utc::now(),
            });
        holding.shares_owned = shares_owned;
        holding.avg_buy_price = avg_buy_price;
        holding.stock_name = stock_name.to_string();
        holding.updated_at = Utc::now();
        Ok(holding.clone())
    }

    async fn record(&mut self, trade: NewTransaction) -> Result<TransactionRecord, StoreError> {
        if !self.staged.accounts.contains_key(&trade.user_id) {
            return Err(StoreError::AccountNotFound(trade.user_id));
        }

        let record = TransactionRecord {
            id: Uuid::new_v4(),
            user_id: trade.user_id,
            stock_symbol: trade.stock_symbol,
            kind: trade.kind,
            shares: trade.shares,
            price_at_exec: trade.price_at_exec,
            stock_name: trade.stock_name,
            created_at: Utc::now(),
        };
        self.staged.transactions.push(record.clone());
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryLedgerTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
