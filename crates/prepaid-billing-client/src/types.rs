//! Request and response types for the prepaid-billing client.
//!
//! Engine projections (`AccountSummary`, `ChargeQuote`, `ChargeReceipt`,
//! `EventRecord`) are re-exported from the core crate unchanged.

use serde::{Deserialize, Serialize};

pub use prepaid_billing_core::{
    AccountId, AccountSummary, BillingEvent, ChargeQuote, ChargeReceipt, EventRecord, PlanIdx,
    SubscriptionStatus, SubscriptionView,
};

// ============================================================================
// Plans
// ============================================================================

/// A plan as served by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlanResponse {
    /// Registry index.
    pub plan_idx: PlanIdx,
    /// Period length in seconds.
    pub period: u64,
    /// Trial length in seconds.
    pub trial: u64,
    /// Price per period.
    pub rate: u64,
    /// Self-charge discount in percent.
    pub charge_discount: u8,
    /// Closed to new subscribers.
    pub closed: bool,
    /// When the plan was disabled.
    pub disabled_at: Option<u64>,
    /// Open and not disabled.
    pub available: bool,
}

/// List plans response.
#[derive(Debug, Clone, Deserialize)]
pub struct ListPlansResponse {
    /// Plans in index order.
    pub plans: Vec<PlanResponse>,
}

/// Create plan request.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePlanRequest {
    /// Period length in seconds.
    pub period: u64,
    /// Trial length in seconds.
    pub trial: u64,
    /// Price per period.
    pub rate: u64,
    /// Self-charge discount in percent (0..=100).
    pub charge_discount: u8,
}

// ============================================================================
// Funds and subscriptions
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AmountRequest {
    pub amount: u64,
}

/// Balance after a deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BalanceResponse {
    /// Account.
    pub account: String,
    /// Custodial balance.
    pub balance: u64,
    /// Withdrawable balance.
    pub available: u64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SubscribeRequest {
    pub plan_idx: PlanIdx,
    pub deposit: u64,
}

// ============================================================================
// Charges and events
// ============================================================================

/// Result of charging one account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChargeResponse {
    /// What was charged.
    #[serde(flatten)]
    pub receipt: ChargeReceipt,
    /// Subscriber balance after the charge.
    pub balance: u64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GrantRequest {
    pub periods: u64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChargeBatchRequest {
    pub accounts: Vec<String>,
}

/// Result of a batch charge.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeBatchResponse {
    /// One receipt per charged account.
    pub receipts: Vec<ChargeReceipt>,
    /// Sum of all charged amounts.
    pub total: u64,
}

/// A page of account events.
#[derive(Debug, Clone, Deserialize)]
pub struct ListEventsResponse {
    /// Events, newest first.
    pub events: Vec<EventRecord>,
    /// Whether older events remain.
    pub has_more: bool,
}

// ============================================================================
// Revenue
// ============================================================================

/// Collected, unswept revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PaymentsResponse {
    /// Amount.
    pub paid_amount: u64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct WithdrawPaymentsRequest {
    pub receiver: String,
}

/// Result of sweeping revenue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WithdrawPaymentsResponse {
    /// Destination account.
    pub receiver: String,
    /// Amount swept.
    pub amount: u64,
}

/// Health check response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` when serving.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
}

// ============================================================================
// Errors
// ============================================================================

/// API error response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// API error details.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Structured details, if any.
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}
