//! HTTP routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::debug;

use mockva_common::AccountId;
use mockva_ledger::{
    Account, AccountDetails, AccountEdit, AccountRegistration, AccountTransaction,
    MetricsSnapshot, TransferContext, TransferRequest,
};

use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/accounts", post(register_account))
        .route("/accounts/:accountId", get(find_account).put(edit_account))
        .route("/accountTransactions/transfer", post(transfer))
        .route("/version", get(version))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn register_account(
    State(state): State<AppState>,
    payload: Result<Json<AccountRegistration>, JsonRejection>,
) -> ApiResult<Account> {
    let Json(registration) = payload?;
    let account = state.accounts.register(registration).await?;
    Ok(Json(account))
}

async fn find_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> ApiResult<AccountDetails> {
    let details = state.accounts.find_details(&AccountId::new(account_id)).await?;
    Ok(Json(details))
}

async fn edit_account(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    payload: Result<Json<AccountEdit>, JsonRejection>,
) -> ApiResult<Account> {
    let Json(edit) = payload?;
    let account = state.accounts.edit(&AccountId::new(account_id), edit).await?;
    Ok(Json(account))
}

async fn transfer(
    State(state): State<AppState>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult<AccountTransaction> {
    let Json(request) = payload?;
    debug!(src = %request.account_src_id, dst = %request.account_dst_id, "Transfer requested");

    let ctx = TransferContext::new().with_timeout(state.transfer_timeout);
    let transaction = state.transfers.transfer(request, &ctx).await?;
    Ok(Json(transaction))
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.transfers.metrics_snapshot())
}
