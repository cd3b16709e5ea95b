use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    error::AppError,
    market::{MarketDataError, MAX_BATCH_SYMBOLS},
    middleware::auth::AuthUser,
    models::{PriceBar, PriceTick, ScreenerFilters, ScreenerRow, StockProfile, SymbolMatch},
    services::trading::normalize_symbol,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct QuotesParams {
    #[serde(default)]
    pub symbols: String,
}

/// Splits a comma separated symbol list, normalising and dropping
/// duplicates while keeping the caller's order.
fn symbol_list(raw: &str) -> Result<Vec<String>, AppError> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in raw.split(',').filter_map(normalize_symbol) {
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    if symbols.is_empty() || symbols.len() > MAX_BATCH_SYMBOLS {
        return Err(MarketDataError::InvalidQuery.into());
    }
    Ok(symbols)
}

fn symbol_param(raw: &str) -> Result<String, AppError> {
    normalize_symbol(raw).ok_or_else(|| MarketDataError::SymbolNotFound(raw.to_string()).into())
}

#[utoipa::path(
    get,
    path = "/api/stocks/search",
    params(("query" = String, Query, description = "Ticker or company name fragment")),
    responses(
        (status = 200, description = "Matching symbols", body = [SymbolMatch]),
        (status = 400, description = "Empty query", body = crate::error::ErrorBody),
    )
)]
pub async fn search_stocks(
    State(state): State<AppState>,
    _auth: AuthUser,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<SymbolMatch>>, AppError> {
    let Query(params) = params?;
    let matches = state.market.search(&params.query).await?;
    Ok(Json(matches))
}

#[utoipa::path(
    get,
    path = "/api/stocks/{symbol}",
    params(("symbol" = String, Path, description = "Ticker symbol")),
    responses(
        (status = 200, description = "Company profile", body = StockProfile),
        (status = 404, description = "Unknown symbol", body = crate::error::ErrorBody),
        (status = 502, description = "Market data unavailable", body = crate::error::ErrorBody),
    )
)]
pub async fn get_stock_profile(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(symbol): Path<String>,
) -> Result<Json<StockProfile>, AppError> {
    let symbol = symbol_param(&symbol)?;
    let profile = state.market.profile(&symbol).await?;
    Ok(Json(profile))
}

#[utoipa::path(
    get,
    path = "/api/stocks/{symbol}/history",
    params(("symbol" = String, Path, description = "Ticker symbol")),
    responses(
        (status = 200, description = "Daily bars, oldest first", body = [PriceBar]),
        (status = 502, description = "Market data unavailable", body = crate::error::ErrorBody),
    )
)]
pub async fn get_price_history(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(symbol): Path<String>,
) -> Result<Json<Vec<PriceBar>>, AppError> {
    let symbol = symbol_param(&symbol)?;
    let bars = state.market.history(&symbol).await?;
    Ok(Json(bars))
}

#[utoipa::path(
    get,
    path = "/api/quotes",
    params(("symbols" = String, Query, description = "Comma separated tickers, at most 50")),
    responses(
        (status = 200, description = "Latest prices; unknown symbols are omitted", body = [PriceTick]),
        (status = 400, description = "Empty or oversized symbol list", body = crate::error::ErrorBody),
        (status = 502, description = "Market data unavailable", body = crate::error::ErrorBody),
    )
)]
pub async fn get_quotes(
    State(state): State<AppState>,
    _auth: AuthUser,
    params: Result<Query<QuotesParams>, QueryRejection>,
) -> Result<Json<Vec<PriceTick>>, AppError> {
    let Query(params) = params?;
    let symbols = symbol_list(&params.symbols)?;
    let ticks = state.market.quotes(&symbols).await?;
    Ok(Json(ticks))
}

#[utoipa::path(
    get,
    path = "/api/stocks/screener",
    params(ScreenerFilters),
    responses(
        (status = 200, description = "Symbols passing the filters", body = [ScreenerRow]),
        (status = 400, description = "Malformed filter", body = crate::error::ErrorBody),
        (status = 502, description = "Market data unavailable", body = crate::error::ErrorBody),
    )
)]
pub async fn screen_stocks(
    State(state): State<AppState>,
    _auth: AuthUser,
    filters: Result<Query<ScreenerFilters>, QueryRejection>,
) -> Result<Json<Vec<ScreenerRow>>, AppError> {
    let Query(filters) = filters?;
    let rows = state.market.screener(&filters).await?;
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_list_normalises_and_dedupes() {
        let symbols = symbol_list(" aapl,MSFT,,AAPL , tsla").unwrap();
        assert_eq!(symbols, vec!["AAPL", "MSFT", "TSLA"]);
    }

    #[test]
    fn symbol_list_rejects_empty_and_oversized() {
        assert!(matches!(
            symbol_list(" , ,"),
            Err(AppError::MarketData(MarketDataError::InvalidQuery))
        ));

        let many: Vec<String> = (0..=MAX_BATCH_SYMBOLS).map(|i| format!("S{i}")).collect();
        assert!(matches!(
            symbol_list(&many.join(",")),
            Err(AppError::MarketData(MarketDataError::InvalidQuery))
        ));
    }
}
