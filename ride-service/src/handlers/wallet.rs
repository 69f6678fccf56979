//! Wallet endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;

use crate::middleware::ActorContext;
use crate::models::{Role, Transaction, Wallet};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TransactionListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct TopupRequest {
    pub user_id: Uuid,
    pub amount: Decimal,
}

pub async fn get_balance(
    State(state): State<AppState>,
    actor: ActorContext,
) -> Result<Json<Wallet>, AppError> {
    let wallet = state.wallets.balance(actor.user_id).await?;
    Ok(Json(wallet))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    actor: ActorContext,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let transactions = state
        .wallets
        .transactions(
            actor.user_id,
            query.limit.clamp(1, 100),
            query.offset.max(0),
        )
        .await?;
    Ok(Json(transactions))
}

/// Create the caller's wallet (idempotent) and attach a virtual account when
/// the payment gateway is configured.
pub async fn provision_wallet(
    State(state): State<AppState>,
    actor: ActorContext,
) -> Result<(StatusCode, Json<Wallet>), AppError> {
    let wallet = state.wallets.provision(actor.user_id).await?;
    Ok((StatusCode::CREATED, Json(wallet)))
}

/// Admin credit to any user's wallet.
pub async fn admin_topup(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(payload): Json<TopupRequest>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    actor.require(Role::Admin)?;
    let transaction = state
        .wallets
        .admin_topup(payload.user_id, payload.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}
