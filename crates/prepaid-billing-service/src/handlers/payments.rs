//! Revenue handlers (admin only).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use prepaid_billing_core::ChargeReceipt;

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::handlers::parse_account;
use crate::state::AppState;

/// Batch charge request.
#[derive(Debug, Deserialize)]
pub struct ChargeBatchRequest {
    /// Accounts to charge at the full rate.
    pub accounts: Vec<String>,
}

/// Batch charge response.
#[derive(Debug, Serialize)]
pub struct ChargeBatchResponse {
    /// One receipt per account that owed something.
    pub receipts: Vec<ChargeReceipt>,
    /// Total amount collected.
    pub total: u64,
}

/// Charge many accounts at once.
pub async fn charge_batch(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<ChargeBatchRequest>,
) -> Result<Json<ChargeBatchResponse>, ApiError> {
    let accounts = body
        .accounts
        .iter()
        .map(|raw| parse_account(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let receipts = state
        .execute(|engine| engine.charge_many(&accounts))
        .await?;
    let total = receipts
        .iter()
        .fold(0u64, |sum, receipt| sum.saturating_add(receipt.quote.amount));

    tracing::info!(
        admin_id = %admin.admin_id,
        requested = accounts.len(),
        charged = receipts.len(),
        total,
        "Batch charge processed"
    );

    Ok(Json(ChargeBatchResponse { receipts, total }))
}

/// Revenue response.
#[derive(Debug, Serialize)]
pub struct PaymentsResponse {
    /// Revenue charged but not yet withdrawn.
    pub paid_amount: u64,
}

/// Get collected revenue.
pub async fn get_payments(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
) -> Json<PaymentsResponse> {
    let paid_amount = state.read(|engine| engine.paid_amount()).await;
    Json(PaymentsResponse { paid_amount })
}

/// Withdraw payments request.
#[derive(Debug, Deserialize)]
pub struct WithdrawPaymentsRequest {
    /// Destination account.
    pub receiver: String,
}

/// Withdraw payments response.
#[derive(Debug, Serialize)]
pub struct WithdrawPaymentsResponse {
    /// Destination account.
    pub receiver: String,
    /// Amount swept.
    pub amount: u64,
}

/// Sweep all collected revenue to a receiver.
pub async fn withdraw_payments(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<WithdrawPaymentsRequest>,
) -> Result<Json<WithdrawPaymentsResponse>, ApiError> {
    let receiver = parse_account(&body.receiver)?;
    let amount = state
        .execute(|engine| engine.withdraw_payments(receiver))
        .await?;

    tracing::info!(admin_id = %admin.admin_id, receiver = %receiver, amount, "Payments withdrawn");

    Ok(Json(WithdrawPaymentsResponse {
        receiver: receiver.to_string(),
        amount,
    }))
}
