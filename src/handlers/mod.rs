mod account;
mod market;
mod trading;

pub use account::*;
pub use market::*;
pub use trading::*;

use axum::{
    routing::get,
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::{
    error::ErrorBody,
    models::{
        Account, ExecuteTradeRequest, Holding, PortfolioValuation, PositionValuation, PriceBar,
        PriceTick, ScreenerRow, StockProfile, SymbolMatch, TradeOutcome, TransactionRecord,
        TransactionType,
    },
    state::AppState,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        account::open_account,
        account::get_account,
        trading::get_portfolio,
        trading::get_transactions,
        trading::execute_transaction,
        market::search_stocks,
        market::get_stock_profile,
        market::get_price_history,
        market::get_quotes,
        market::screen_stocks,
    ),
    components(schemas(
        Account,
        ErrorBody,
        ExecuteTradeRequest,
        Holding,
        PortfolioValuation,
        PositionValuation,
        PriceBar,
        PriceTick,
        ScreenerRow,
        StockProfile,
        SymbolMatch,
        TradeOutcome,
        TransactionRecord,
        TransactionType,
    )),
    tags((name = "freytrade", description = "Simulated brokerage API"))
)]
pub struct ApiDoc;

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/openapi.json", get(openapi))
        .route("/api/account", get(get_account).post(open_account))
        .route("/api/portfolio", get(get_portfolio))
        .route(
            "/api/transactions",
            get(get_transactions).post(execute_transaction),
        )
        .route("/api/quotes", get(get_quotes))
        .route("/api/stocks/search", get(search_stocks))
        .route("/api/stocks/screener", get(screen_stocks))
        .route("/api/stocks/:symbol", get(get_stock_profile))
        .route("/api/stocks/:symbol/history", get(get_price_history))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
