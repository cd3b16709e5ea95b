use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use crate::{market::MarketDataError, services::TradeError, store::StoreError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Authenticated user does not match request")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Trade(#[from] TradeError),

    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Trade(err) => match err {
                TradeError::InvalidQuantity(_) => (StatusCode::BAD_REQUEST, "INVALID_QUANTITY"),
                TradeError::InsufficientFunds { .. } => (StatusCode::BAD_REQUEST, "INSUFFICIENT_FUNDS"),
                TradeError::InsufficientShares { .. } => {
                    (StatusCode::BAD_REQUEST, "INSUFFICIENT_SHARES")
                }
                TradeError::SymbolNotFound(_) => (StatusCode::NOT_FOUND, "SYMBOL_NOT_FOUND"),
                TradeError::AccountNotFound => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
                TradeError::AmountOutOfRange => (StatusCode::BAD_REQUEST, "AMOUNT_OUT_OF_RANGE"),
                TradeError::UpstreamUnavailable(_) => {
                    (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE")
                }
                TradeError::PersistenceFailure(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_FAILURE")
                }
            },
            AppError::MarketData(err) => match err {
                MarketDataError::InvalidQuery => (StatusCode::BAD_REQUEST, "INVALID_QUERY"),
                MarketDataError::SymbolNotFound(_) => (StatusCode::NOT_FOUND, "SYMBOL_NOT_FOUND"),
                MarketDataError::UpstreamUnavailable(_) => {
                    (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE")
                }
            },
            AppError::Store(StoreError::AccountNotFound(_)) => {
                (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND")
            }
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            match &self {
                AppError::Store(StoreError::AccountNotFound(_)) => "Account not found".to_string(),
                other => other.to_string(),
            }
        };

        let body = Json(ErrorBody {
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
