use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::Account,
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/api/account",
    responses((status = 201, description = "Account exists with its current balance", body = Account))
)]
pub async fn open_account(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let account = state
        .ledger
        .open_account(auth.0, state.config.opening_balance)
        .await?;
    info!(user_id = %auth.0, "Account opened");
    Ok((StatusCode::CREATED, Json(account)))
}

#[utoipa::path(
    get,
    path = "/api/account",
    responses(
        (status = 200, description = "Cash balance", body = Account),
        (status = 404, description = "No account", body = crate::error::ErrorBody),
    )
)]
pub async fn get_account(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Account>, AppError> {
    let account = state.ledger.get_account(auth.0).await?;
    Ok(Json(account))
}
