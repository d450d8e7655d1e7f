//! Deposit and withdrawal handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AccountAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Amount request body.
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    /// Amount in base units.
    pub amount: u64,
}

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Account ID.
    pub account: String,
    /// Custodial balance after the operation.
    pub balance: u64,
    /// Balance that may be withdrawn.
    pub available: u64,
}

/// Deposit into the caller's balance.
///
/// Owed periods are charged first; a lapsed subscription restarts once the
/// deposit covers a period.
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    auth: AccountAuth,
    Json(body): Json<AmountRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account = auth.account;
    let (balance, available) = state
        .execute(|engine| {
            let balance = engine.deposit(account, body.amount)?;
            Ok((balance, engine.available_balance_of(&account)))
        })
        .await?;

    tracing::info!(account = %account, amount = body.amount, balance, "Deposit accepted");

    Ok(Json(BalanceResponse {
        account: account.to_string(),
        balance,
        available,
    }))
}

/// Withdraw from the caller's available balance.
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    auth: AccountAuth,
    Json(body): Json<AmountRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account = auth.account;
    let (balance, available) = state
        .execute(|engine| {
            let balance = engine.withdraw(account, body.amount)?;
            Ok((balance, engine.available_balance_of(&account)))
        })
        .await?;

    Ok(Json(BalanceResponse {
        account: account.to_string(),
        balance,
        available,
    }))
}
