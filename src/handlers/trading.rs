use std::collections::HashMap;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::{ExecuteTradeRequest, PortfolioValuation, TradeOutcome, TransactionRecord},
    services::value_portfolio,
    state::AppState,
    store::clamp_history_limit,
};

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/portfolio",
    responses(
        (status = 200, description = "Holdings valued at live prices", body = PortfolioValuation),
        (status = 404, description = "No account", body = crate::error::ErrorBody),
    )
)]
pub async fn get_portfolio(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PortfolioValuation>, AppError> {
    let account = state.ledger.get_account(auth.0).await?;
    let holdings = state.ledger.list_holdings(auth.0).await?;

    let quotes = join_all(
        holdings
            .iter()
            .map(|h| state.market.quote(&h.stock_symbol)),
    )
    .await;

    let prices: HashMap<String, Decimal> = holdings
        .iter()
        .zip(quotes)
        .filter_map(|(holding, quote)| match quote {
            Ok(quote) => Some((holding.stock_symbol.clone(), quote.price)),
            Err(e) => {
                warn!("No live price for {}: {}", holding.stock_symbol, e);
                None
            }
        })
        .collect();

    Ok(Json(value_portfolio(&holdings, &prices, account.balance)))
}

#[utoipa::path(
    get,
    path = "/api/transactions",
    params(("limit" = Option<i64>, Query, description = "Maximum rows, 1 to 200, default 50")),
    responses((status = 200, description = "Executed trades, newest first", body = [TransactionRecord]))
)]
pub async fn get_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<Vec<TransactionRecord>>, AppError> {
    let Query(params) = params?;
    let limit = clamp_history_limit(params.limit);
    let transactions = state.ledger.list_transactions(auth.0, limit).await?;
    Ok(Json(transactions))
}

#[utoipa::path(
    post,
    path = "/api/transactions",
    request_body = ExecuteTradeRequest,
    responses(
        (status = 200, description = "Trade executed", body = TradeOutcome),
        (status = 400, description = "Invalid quantity, insufficient funds or shares", body = crate::error::ErrorBody),
        (status = 403, description = "user_id does not match the token", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown symbol or no account", body = crate::error::ErrorBody),
        (status = 502, description = "Market data unavailable", body = crate::error::ErrorBody),
    )
)]
pub async fn execute_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<ExecuteTradeRequest>, JsonRejection>,
) -> Result<Json<TradeOutcome>, AppError> {
    let Json(req) = payload?;
    if req.user_id.is_some_and(|id| id != auth.0) {
        return Err(AppError::Forbidden);
    }

    let outcome = state
        .trading
        .execute_transaction(auth.0, &req.symbol, req.kind, req.quantity)
        .await?;

    Ok(Json(outcome))
}
