//! Buy/sell execution.
//!
//! A trade prices the symbol first, then runs every read and write that
//! depends on that price inside one [`LedgerTx`]. Validation failures roll
//! the unit of work back; persistence is a single commit. Conflicts reported
//! by the store rerun the unit of work with the same price.

use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::market::{MarketDataError, PriceLookup};
use crate::models::{NewTransaction, StockQuote, TradeOutcome, TransactionType};
use crate::store::{Ledger, StoreError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TradeError {
    #[error("Quantity must be a whole number of at least 1 share, got {0}")]
    InvalidQuantity(i64),

    #[error("Market data unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Account not found")]
    AccountNotFound,

    #[error("Insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    #[error("Insufficient shares: you only own {owned} shares, tried to sell {requested}")]
    InsufficientShares { owned: i64, requested: i64 },

    #[error("Trade amount is out of range")]
    AmountOutOfRange,

    #[error("Failed to persist transaction: {0}")]
    PersistenceFailure(String),
}

impl TradeError {
    /// Maps a failed price lookup for `symbol`.
    pub fn from_lookup(symbol: &str, err: MarketDataError) -> Self {
        match err {
            MarketDataError::SymbolNotFound(symbol) => TradeError::SymbolNotFound(symbol),
            MarketDataError::UpstreamUnavailable(reason) => TradeError::UpstreamUnavailable(reason),
            MarketDataError::InvalidQuery => TradeError::SymbolNotFound(symbol.to_string()),
        }
    }
}

/// Share count and cost basis of a holding; an absent holding is `default()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub shares: i64,
    pub avg_buy_price: Decimal,
}

/// Cash after the trade. A buy that would overdraw the account fails.
pub fn settle_balance(
    kind: TransactionType,
    balance: Decimal,
    total_amount: Decimal,
) -> Result<Decimal, TradeError> {
    match kind {
        TransactionType::Buy => {
            let remaining = balance
                .checked_sub(total_amount)
                .ok_or(TradeError::AmountOutOfRange)?;
            if remaining < Decimal::ZERO {
                return Err(TradeError::InsufficientFunds {
                    needed: total_amount,
                    available: balance,
                });
            }
            Ok(remaining)
        }
        TransactionType::Sell => balance
            .checked_add(total_amount)
            .ok_or(TradeError::AmountOutOfRange),
    }
}

/// Position after the trade. Buys fold the fill into the average buy price;
/// sells leave it untouched.
pub fn next_position(
    kind: TransactionType,
    current: Position,
    quantity: i64,
    total_amount: Decimal,
) -> Result<Position, TradeError> {
    match kind {
        TransactionType::Buy => {
            let shares = current
                .shares
                .checked_add(quantity)
                .ok_or(TradeError::AmountOutOfRange)?;
            let avg_buy_price = Decimal::from(current.shares)
                .checked_mul(current.avg_buy_price)
                .and_then(|cost| cost.checked_add(total_amount))
                .and_then(|cost| cost.checked_div(Decimal::from(shares)))
                .ok_or(TradeError::AmountOutOfRange)?;
            Ok(Position {
                shares,
                avg_buy_price,
            })
        }
        TransactionType::Sell => {
            if current.shares < quantity {
                return Err(TradeError::InsufficientShares {
                    owned: current.shares,
                    requested: quantity,
                });
            }
            Ok(Position {
                shares: current.shares - quantity,
                avg_buy_price: current.avg_buy_price,
            })
        }
    }
}

pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim();
    (!symbol.is_empty()).then(|| symbol.to_ascii_uppercase())
}

enum AttemptError {
    Rejected(TradeError),
    Store(StoreError),
}

impl From<TradeError> for AttemptError {
    fn from(err: TradeError) -> Self {
        AttemptError::Rejected(err)
    }
}

impl From<StoreError> for AttemptError {
    fn from(err: StoreError) -> Self {
        AttemptError::Store(err)
    }
}

pub struct TradingService {
    prices: Arc<dyn PriceLookup>,
    ledger: Arc<dyn Ledger>,
    max_retries: u32,
}

impl TradingService {
    pub fn new(prices: Arc<dyn PriceLookup>, ledger: Arc<dyn Ledger>, max_retries: u32) -> Self {
        Self {
            prices,
            ledger,
            max_retries,
        }
    }

    pub async fn execute_transaction(
        &self,
        user_id: Uuid,
        symbol: &str,
        kind: TransactionType,
        quantity: i64,
    ) -> Result<TradeOutcome, TradeError> {
        if quantity < 1 {
            return Err(TradeError::InvalidQuantity(quantity));
        }
        let symbol =
            normalize_symbol(symbol).ok_or_else(|| TradeError::SymbolNotFound(symbol.to_string()))?;

        let quote = self.prices.quote(&symbol).await.map_err(|e| {
            warn!("Price lookup for {} failed: {}", symbol, e);
            TradeError::from_lookup(&symbol, e)
        })?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.apply(user_id, &symbol, &quote, kind, quantity).await {
                Ok(outcome) => {
                    info!(
                        %user_id,
                        symbol = %outcome.symbol,
                        side = %kind,
                        quantity,
                        price = %outcome.price,
                        "Trade executed"
                    );
                    return Ok(outcome);
                }
                Err(AttemptError::Rejected(err)) => {
                    warn!(%user_id, %symbol, side = %kind, quantity, "Trade rejected: {}", err);
                    return Err(err);
                }
                Err(AttemptError::Store(StoreError::Conflict)) if attempt <= self.max_retries => {
                    warn!(%user_id, %symbol, attempt, "Trade hit a write conflict, retrying");
                }
                Err(AttemptError::Store(StoreError::AccountNotFound(_))) => {
                    warn!(%user_id, "Trade rejected: no account");
                    return Err(TradeError::AccountNotFound);
                }
                Err(AttemptError::Store(err)) => {
                    error!(%user_id, %symbol, "Trade failed to persist: {}", err);
                    return Err(TradeError::PersistenceFailure(err.to_string()));
                }
            }
        }
    }

    async fn apply(
        &self,
        user_id: Uuid,
        symbol: &str,
        quote: &StockQuote,
        kind: TransactionType,
        quantity: i64,
    ) -> Result<TradeOutcome, AttemptError> {
        let mut tx = self.ledger.begin().await?;

        let balance = tx.get_balance(user_id).await?;
        let total_amount = match quote.price.checked_mul(Decimal::from(quantity)) {
            Some(total) => total,
            None => {
                tx.rollback().await?;
                return Err(TradeError::AmountOutOfRange.into());
            }
        };

        let balance = match settle_balance(kind, balance, total_amount) {
            Ok(balance) => balance,
            Err(err) => {
                tx.rollback().await?;
                return Err(err.into());
            }
        };

        let current = tx
            .get_holding(user_id, symbol)
            .await?
            .map(|h| Position {
                shares: h.shares_owned,
                avg_buy_price: h.avg_buy_price,
            })
            .unwrap_or_default();

        let position = match next_position(kind, current, quantity, total_amount) {
            Ok(position) => position,
            Err(err) => {
                tx.rollback().await?;
                return Err(err.into());
            }
        };

        let record = tx
            .record(NewTransaction {
                user_id,
                stock_symbol: symbol.to_string(),
                kind,
                shares: quantity,
                price_at_exec: quote.price,
                stock_name: quote.company_name.clone(),
            })
            .await?;
        let holding = tx
            .upsert_holding(
                user_id,
                symbol,
                position.shares,
                position.avg_buy_price,
                &quote.company_name,
            )
            .await?;
        tx.set_balance(user_id, balance).await?;
        tx.commit().await?;

        Ok(TradeOutcome {
            transaction_id: record.id,
            symbol: symbol.to_string(),
            stock_name: quote.company_name.clone(),
            kind,
            quantity,
            price: quote.price,
            total_amount,
            shares_owned: holding.shares_owned,
            avg_buy_price: holding.avg_buy_price,
            balance,
            executed_at: record.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLedger;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use crate::models::{Account, Holding, TransactionRecord};
    use crate::store::LedgerTx;

    #[derive(Default)]
    struct FixedPrices {
        prices: Mutex<HashMap<String, Result<Decimal, MarketDataError>>>,
    }

    impl FixedPrices {
        fn set(&self, symbol: &str, price: Result<Decimal, MarketDataError>) {
            self.prices.lock().unwrap().insert(symbol.to_string(), price);
        }
    }

    #[async_trait]
    impl PriceLookup for FixedPrices {
        async fn quote(&self, symbol: &str) -> Result<StockQuote, MarketDataError> {
            let price = self
                .prices
                .lock()
                .unwrap()
                .get(symbol)
                .cloned()
                .unwrap_or_else(|| Err(MarketDataError::SymbolNotFound(symbol.to_string())))?;
            Ok(StockQuote {
                symbol: symbol.to_string(),
                company_name: format!("{symbol} Corp"),
                price,
            })
        }
    }

    struct Fixture {
        prices: Arc<FixedPrices>,
        ledger: Arc<MemoryLedger>,
        service: TradingService,
        user: Uuid,
    }

    async fn fixture(balance: Decimal) -> Fixture {
        let prices = Arc::new(FixedPrices::default());
        let ledger = Arc::new(MemoryLedger::new());
        let user = Uuid::new_v4();
        ledger.open_account(user, balance).await.unwrap();
        let service = TradingService::new(prices.clone(), ledger.clone(), 3);
        Fixture {
            prices,
            ledger,
            service,
            user,
        }
    }

    impl Fixture {
        async fn trade(
            &self,
            symbol: &str,
            kind: TransactionType,
            quantity: i64,
            price: Decimal,
        ) -> Result<TradeOutcome, TradeError> {
            self.prices.set(symbol, Ok(price));
            self.service
                .execute_transaction(self.user, symbol, kind, quantity)
                .await
        }

        async fn balance(&self) -> Decimal {
            self.ledger.get_account(self.user).await.unwrap().balance
        }

        async fn shares(&self, symbol: &str) -> i64 {
            self.ledger
                .list_holdings(self.user)
                .await
                .unwrap()
                .into_iter()
                .find(|h| h.stock_symbol == symbol)
                .map(|h| h.shares_owned)
                .unwrap_or(0)
        }
    }

    /// In-memory ledger whose first `conflicting_commits` commits fail with a
    /// write conflict, and whose holding upserts fail when `fail_upsert` is set.
    /// A failed commit drops the inner unit of work.
    struct FlakyLedger {
        inner: MemoryLedger,
        conflicting_commits: AtomicU32,
        fail_upsert: bool,
        begins: AtomicU32,
    }

    impl FlakyLedger {
        fn new(conflicting_commits: u32, fail_upsert: bool) -> Self {
            Self {
                inner: MemoryLedger::new(),
                conflicting_commits: AtomicU32::new(conflicting_commits),
                fail_upsert,
                begins: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Ledger for FlakyLedger {
        async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            let inner = self.inner.begin().await?;
            Ok(Box::new(FlakyTx {
                inner,
                conflict: self
                    .conflicting_commits
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok(),
                fail_upsert: self.fail_upsert,
            }))
        }

        async fn open_account(&self, user_id: Uuid, opening_balance: Decimal) -> Result<Account, StoreError> {
            self.inner.open_account(user_id, opening_balance).await
        }

        async fn get_account(&self, user_id: Uuid) -> Result<Account, StoreError> {
            self.inner.get_account(user_id).await
        }

        async fn list_holdings(&self, user_id: Uuid) -> Result<Vec<Holding>, StoreError> {
            self.inner.list_holdings(user_id).await
        }

        async fn list_transactions(&self, user_id: Uuid, limit: i64) -> Result<Vec<TransactionRecord>, StoreError> {
            self.inner.list_transactions(user_id, limit).await
        }
    }

    struct FlakyTx {
        inner: Box<dyn LedgerTx>,
        conflict: bool,
        fail_upsert: bool,
    }

    #[async_trait]
    impl LedgerTx for FlakyTx {
        async fn get_balance(&mut self, user_id: Uuid) -> Result<Decimal, StoreError> {
            self.inner.get_balance(user_id).await
        }

        async fn set_balance(&mut self, user_id: Uuid, balance: Decimal) -> Result<(), StoreError> {
            self.inner.set_balance(user_id, balance).await
        }

        async fn get_holding(&mut self, user_id: Uuid, symbol: &str) -> Result<Option<Holding>, StoreError> {
            self.inner.get_holding(user_id, symbol).await
        }

        async fn upsert_holding(
            &mut self,
            user_id: Uuid,
            symbol: &str,
            shares_owned: i64,
            avg_buy_price: Decimal,
            stock_name: &str,
        ) -> Result<Holding, StoreError> {
            if self.fail_upsert {
                return Err(StoreError::Corrupt("holding write failed".into()));
            }
            self.inner
                .upsert_holding(user_id, symbol, shares_owned, avg_buy_price, stock_name)
                .await
        }

        async fn record(&mut self, trade: NewTransaction) -> Result<TransactionRecord, StoreError> {
            self.inner.record(trade).await
        }

        async fn commit(self: Box<Self>) -> Result<(), StoreError> {
            if self.conflict {
                return Err(StoreError::Conflict);
            }
            self.inner.commit().await
        }

        async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
            self.inner.rollback().await
        }
    }

    async fn flaky_service(ledger: FlakyLedger) -> (Arc<FlakyLedger>, TradingService, Uuid) {
        let prices = Arc::new(FixedPrices::default());
        prices.set("AAPL", Ok(dec!(10)));
        let ledger = Arc::new(ledger);
        let user = Uuid::new_v4();
        ledger.open_account(user, dec!(1000)).await.unwrap();
        let service = TradingService::new(prices, ledger.clone(), 3);
        (ledger, service, user)
    }

    #[tokio::test]
    async fn commit_conflicts_are_retried() {
        let (ledger, service, user) = flaky_service(FlakyLedger::new(3, false)).await;

        let outcome = service
            .execute_transaction(user, "AAPL", TransactionType::Buy, 2)
            .await
            .unwrap();

        assert_eq!(outcome.balance, dec!(980));
        assert_eq!(ledger.begins.load(Ordering::SeqCst), 4);
        assert_eq!(ledger.get_account(user).await.unwrap().balance, dec!(980));
        assert_eq!(ledger.list_transactions(user, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_leave_no_trace() {
        let (ledger, service, user) = flaky_service(FlakyLedger::new(4, false)).await;

        let err = service
            .execute_transaction(user, "AAPL", TransactionType::Buy, 2)
            .await
            .unwrap_err();

        assert_eq!(err, TradeError::PersistenceFailure("Write conflict".into()));
        assert_eq!(ledger.begins.load(Ordering::SeqCst), 4);
        assert_eq!(ledger.get_account(user).await.unwrap().balance, dec!(1000));
        assert!(ledger.list_transactions(user, 50).await.unwrap().is_empty());
        assert!(ledger.list_holdings(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_holding_write_discards_recorded_trade() {
        let (ledger, service, user) = flaky_service(FlakyLedger::new(0, true)).await;

        let err = service
            .execute_transaction(user, "AAPL", TransactionType::Buy, 2)
            .await
            .unwrap_err();

        assert!(matches!(err, TradeError::PersistenceFailure(_)));
        assert_eq!(ledger.begins.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.get_account(user).await.unwrap().balance, dec!(1000));
        assert!(ledger.list_transactions(user, 50).await.unwrap().is_empty());
    }

    #[test]
    fn arithmetic_overflow_is_out_of_range() {
        assert_eq!(
            settle_balance(TransactionType::Sell, Decimal::MAX, dec!(1)),
            Err(TradeError::AmountOutOfRange)
        );

        let current = Position {
            shares: 2,
            avg_buy_price: Decimal::MAX,
        };
        assert_eq!(
            next_position(TransactionType::Buy, current, 1, dec!(1)),
            Err(TradeError::AmountOutOfRange)
        );

        let current = Position {
            shares: i64::MAX,
            avg_buy_price: dec!(1),
        };
        assert_eq!(
            next_position(TransactionType::Buy, current, 1, dec!(1)),
            Err(TradeError::AmountOutOfRange)
        );
    }

    #[tokio::test]
    async fn overflowing_total_is_rejected_without_changes() {
        let f = fixture(dec!(1000)).await;
        let err = f
            .trade("AAPL", TransactionType::Buy, 2, Decimal::MAX)
            .await
            .unwrap_err();
        assert_eq!(err, TradeError::AmountOutOfRange);
        assert_eq!(f.balance().await, dec!(1000));
        assert!(f.ledger.list_transactions(f.user, 50).await.unwrap().is_empty());
    }

    #[test]
    fn invalid_lookup_query_names_the_symbol() {
        assert_eq!(
            TradeError::from_lookup("AAPL", MarketDataError::InvalidQuery),
            TradeError::SymbolNotFound("AAPL".into())
        );
    }

    #[test]
    fn buy_folds_fill_into_average() {
        let current = Position {
            shares: 5,
            avg_buy_price: dec!(100),
        };
        let next = next_position(TransactionType::Buy, current, 5, dec!(600)).unwrap();
        assert_eq!(next.shares, 10);
        assert_eq!(next.avg_buy_price, dec!(110));
    }

    #[test]
    fn sell_keeps_average() {
        let current = Position {
            shares: 10,
            avg_buy_price: dec!(110),
        };
        let next = next_position(TransactionType::Sell, current, 4, dec!(520)).unwrap();
        assert_eq!(next.shares, 6);
        assert_eq!(next.avg_buy_price, dec!(110));
    }

    #[test]
    fn buy_may_spend_entire_balance() {
        assert_eq!(
            settle_balance(TransactionType::Buy, dec!(500), dec!(500)).unwrap(),
            Decimal::ZERO
        );
        assert!(settle_balance(TransactionType::Buy, dec!(500), dec!(500.01)).is_err());
    }

    #[test]
    fn symbols_are_normalized() {
        assert_eq!(normalize_symbol(" aapl "), Some("AAPL".to_string()));
        assert_eq!(normalize_symbol("   "), None);
    }

    #[tokio::test]
    async fn first_buy_opens_position() {
        let f = fixture(dec!(1000)).await;
        let outcome = f
            .trade("AAPL", TransactionType::Buy, 5, dec!(100))
            .await
            .unwrap();

        assert_eq!(outcome.balance, dec!(500));
        assert_eq!(outcome.shares_owned, 5);
        assert_eq!(outcome.avg_buy_price, dec!(100));
        assert_eq!(outcome.total_amount, dec!(500));
        assert_eq!(f.balance().await, dec!(500));
        assert_eq!(f.shares("AAPL").await, 5);
    }

    #[tokio::test]
    async fn second_buy_reweights_average() {
        let f = fixture(dec!(2000)).await;
        f.trade("AAPL", TransactionType::Buy, 5, dec!(100)).await.unwrap();
        let outcome = f
            .trade("AAPL", TransactionType::Buy, 5, dec!(120))
            .await
            .unwrap();

        assert_eq!(outcome.shares_owned, 10);
        assert_eq!(outcome.avg_buy_price, dec!(110));
        assert_eq!(outcome.balance, dec!(2000) - dec!(500) - dec!(600));
    }

    #[tokio::test]
    async fn average_matches_weighted_mean_of_fills() {
        let f = fixture(dec!(100000)).await;
        let fills = [(3, dec!(10.50)), (7, dec!(12.25)), (1, dec!(99)), (4, dec!(11))];
        let mut last = None;
        for (qty, price) in fills {
            last = Some(f.trade("KO", TransactionType::Buy, qty, price).await.unwrap());
        }

        let cost: Decimal = fills.iter().map(|(q, p)| Decimal::from(*q) * *p).sum();
        let qty: i64 = fills.iter().map(|(q, _)| q).sum();
        let outcome = last.unwrap();
        assert_eq!(outcome.shares_owned, qty);
        assert_eq!(outcome.avg_buy_price.round_dp(10), (cost / Decimal::from(qty)).round_dp(10));
        assert_eq!(outcome.balance, dec!(100000) - cost);
    }

    #[tokio::test]
    async fn sell_credits_balance_and_keeps_average() {
        let f = fixture(dec!(1000)).await;
        f.trade("AAPL", TransactionType::Buy, 5, dec!(100)).await.unwrap();
        let outcome = f
            .trade("AAPL", TransactionType::Sell, 2, dec!(130))
            .await
            .unwrap();

        assert_eq!(outcome.shares_owned, 3);
        assert_eq!(outcome.avg_buy_price, dec!(100));
        assert_eq!(outcome.balance, dec!(500) + dec!(260));
    }

    #[tokio::test]
    async fn oversell_is_rejected_without_changes() {
        let f = fixture(dec!(5000)).await;
        f.trade("AAPL", TransactionType::Buy, 10, dec!(100)).await.unwrap();
        let history_before = f.ledger.list_transactions(f.user, 50).await.unwrap().len();

        let err = f
            .trade("AAPL", TransactionType::Sell, 15, dec!(100))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TradeError::InsufficientShares {
                owned: 10,
                requested: 15
            }
        );
        assert_eq!(f.shares("AAPL").await, 10);
        assert_eq!(f.balance().await, dec!(4000));
        assert_eq!(f.ledger.list_transactions(f.user, 50).await.unwrap().len(), history_before);
    }

    #[tokio::test]
    async fn selling_unowned_symbol_is_rejected() {
        let f = fixture(dec!(100)).await;
        let err = f
            .trade("TSLA", TransactionType::Sell, 1, dec!(200))
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::InsufficientShares { owned: 0, .. }));
        assert!(f.ledger.list_holdings(f.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overdraw_is_rejected_without_changes() {
        let f = fixture(dec!(50)).await;
        let err = f
            .trade("AAPL", TransactionType::Buy, 1, dec!(100))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TradeError::InsufficientFunds {
                needed: dec!(100),
                available: dec!(50)
            }
        );
        assert_eq!(f.balance().await, dec!(50));
        assert!(f.ledger.list_transactions(f.user, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected_before_pricing() {
        let f = fixture(dec!(50)).await;
        let err = f
            .service
            .execute_transaction(f.user, "AAPL", TransactionType::Buy, 0)
            .await
            .unwrap_err();
        assert_eq!(err, TradeError::InvalidQuantity(0));
    }

    #[tokio::test]
    async fn price_failures_propagate() {
        let f = fixture(dec!(50)).await;
        f.prices.set(
            "AAPL",
            Err(MarketDataError::UpstreamUnavailable("HTTP 503".into())),
        );
        let err = f
            .service
            .execute_transaction(f.user, "aapl", TransactionType::Buy, 1)
            .await
            .unwrap_err();
        assert_eq!(err, TradeError::UpstreamUnavailable("HTTP 503".into()));

        let err = f
            .service
            .execute_transaction(f.user, "NOPE", TransactionType::Buy, 1)
            .await
            .unwrap_err();
        assert_eq!(err, TradeError::SymbolNotFound("NOPE".into()));
    }

    #[tokio::test]
    async fn missing_account_is_reported() {
        let f = fixture(dec!(50)).await;
        f.prices.set("AAPL", Ok(dec!(1)));
        let err = f
            .service
            .execute_transaction(Uuid::new_v4(), "AAPL", TransactionType::Buy, 1)
            .await
            .unwrap_err();
        assert_eq!(err, TradeError::AccountNotFound);
    }

    #[tokio::test]
    async fn recorded_deltas_sum_to_position() {
        let f = fixture(dec!(10000)).await;
        let steps = [
            (TransactionType::Buy, 8),
            (TransactionType::Sell, 3),
            (TransactionType::Buy, 2),
            (TransactionType::Sell, 7),
            (TransactionType::Buy, 4),
        ];
        for (kind, qty) in steps {
            f.trade("NVDA", kind, qty, dec!(25)).await.unwrap();
        }

        let history = f.ledger.list_transactions(f.user, 50).await.unwrap();
        let net: i64 = history
            .iter()
            .map(|t| match t.kind {
                TransactionType::Buy => t.shares,
                TransactionType::Sell => -t.shares,
            })
            .sum();
        assert_eq!(history.len(), steps.len());
        assert_eq!(net, f.shares("NVDA").await);
        assert_eq!(net, 4);
    }

    #[tokio::test]
    async fn concurrent_sells_cannot_oversell() {
        let f = fixture(dec!(1000)).await;
        f.trade("AAPL", TransactionType::Buy, 5, dec!(100)).await.unwrap();

        let service = Arc::new(f.service);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            let user = f.user;
            handles.push(tokio::spawn(async move {
                service
                    .execute_transaction(user, "AAPL", TransactionType::Sell, 5)
                    .await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(err) => assert!(matches!(err, TradeError::InsufficientShares { owned: 0, .. })),
            }
        }

        assert_eq!(succeeded, 1);
        assert_eq!(f.ledger.get_account(f.user).await.unwrap().balance, dec!(1000));
    }
}
