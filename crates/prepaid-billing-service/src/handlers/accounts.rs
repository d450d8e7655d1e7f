//! Per-account queries, charging and grants.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use prepaid_billing_core::{AccountSummary, ChargeQuote, ChargeReceipt, EventRecord};

use crate::auth::{AccountAuth, AdminAuth};
use crate::error::ApiError;
use crate::handlers::parse_account;
use crate::state::AppState;

/// Get balance, reservation and subscription timeline of an account.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
) -> Result<Json<AccountSummary>, ApiError> {
    let account = parse_account(&account)?;
    let summary = state.read(|engine| engine.account_summary(&account)).await;

    Ok(Json(summary))
}

/// Preview query parameters.
#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    /// Price as the subscriber (with discount) rather than a third party.
    #[serde(default)]
    pub as_self: bool,
}

/// Preview what charging an account would cost right now.
pub async fn preview_charge(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<ChargeQuote>, ApiError> {
    let account = parse_account(&account)?;
    let quote = state
        .read(|engine| engine.preview_charge(&account, query.as_self))
        .await;

    Ok(Json(quote))
}

/// Event list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    /// Maximum number of events to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// List events response.
#[derive(Debug, Serialize)]
pub struct ListEventsResponse {
    /// Events (newest first).
    pub events: Vec<EventRecord>,
    /// Whether there are more events.
    pub has_more: bool,
}

/// List the audit events of an account.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<ListEventsResponse>, ApiError> {
    let account = parse_account(&account)?;

    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(100);
    let mut events = state
        .store
        .list_events_by_account(&account, limit + 1, query.offset)?;

    let has_more = events.len() > limit;
    events.truncate(limit);

    Ok(Json(ListEventsResponse { events, has_more }))
}

/// Charge response.
#[derive(Debug, Serialize)]
pub struct ChargeResponse {
    /// What was charged.
    #[serde(flatten)]
    pub receipt: ChargeReceipt,
    /// Subscriber balance after the charge.
    pub balance: u64,
}

/// Charge an account's owed periods.
///
/// The plan discount applies when the caller charges their own subscription.
pub async fn charge(
    State(state): State<Arc<AppState>>,
    auth: AccountAuth,
    Path(account): Path<String>,
) -> Result<Json<ChargeResponse>, ApiError> {
    let account = parse_account(&account)?;
    let caller = auth.account;
    let response = state
        .execute(|engine| {
            let receipt = engine.charge(caller, account)?;
            Ok(ChargeResponse {
                receipt,
                balance: engine.balance_of(&account),
            })
        })
        .await?;

    Ok(Json(response))
}

/// Grant request.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    /// Periods to mark as paid.
    pub periods: u64,
}

/// Mark periods as paid without moving funds (admin only).
pub async fn grant_periods(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Path(account): Path<String>,
    Json(body): Json<GrantRequest>,
) -> Result<Json<ChargeReceipt>, ApiError> {
    let account = parse_account(&account)?;
    let receipt = state
        .execute(|engine| engine.grant_periods(account, body.periods))
        .await?;

    tracing::info!(
        admin_id = %admin.admin_id,
        account = %account,
        periods = body.periods,
        "Periods granted"
    );

    Ok(Json(receipt))
}
