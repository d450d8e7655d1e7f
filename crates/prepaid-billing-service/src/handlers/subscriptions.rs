//! Subscription lifecycle handlers for the authenticated account.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use prepaid_billing_core::{AccountSummary, PlanIdx};

use crate::auth::AccountAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Subscribe request.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    /// Plan to subscribe to.
    pub plan_idx: PlanIdx,
    /// Amount to deposit in the same step (default: none).
    #[serde(default)]
    pub deposit: u64,
}

/// Subscribe the caller to a plan.
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    auth: AccountAuth,
    Json(body): Json<SubscribeRequest>,
) -> Result<Json<AccountSummary>, ApiError> {
    let account = auth.account;
    let summary = state
        .execute(|engine| {
            engine.subscribe_with_deposit(account, body.plan_idx, body.deposit)?;
            Ok(engine.account_summary(&account))
        })
        .await?;

    tracing::info!(account = %account, plan_idx = body.plan_idx, "Account subscribed");

    Ok(Json(summary))
}

/// Cancel the caller's subscription.
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    auth: AccountAuth,
) -> Result<Json<AccountSummary>, ApiError> {
    let account = auth.account;
    let summary = state
        .execute(|engine| {
            engine.cancel(account)?;
            Ok(engine.account_summary(&account))
        })
        .await?;

    Ok(Json(summary))
}

/// Restore the caller's cancelled subscription.
pub async fn restore(
    State(state): State<Arc<AppState>>,
    auth: AccountAuth,
) -> Result<Json<AccountSummary>, ApiError> {
    let account = auth.account;
    let summary = state
        .execute(|engine| {
            engine.restore(account)?;
            Ok(engine.account_summary(&account))
        })
        .await?;

    Ok(Json(summary))
}
