//! Plan registry handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use prepaid_billing_core::{Plan, PlanIdx};

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Plan response.
#[derive(Debug, Serialize)]
pub struct PlanResponse {
    /// Plan index.
    pub plan_idx: PlanIdx,
    /// Period length in seconds.
    pub period: u64,
    /// Trial length in seconds.
    pub trial: u64,
    /// Price per period.
    pub rate: u64,
    /// Self-service discount in percent.
    pub charge_discount: u8,
    /// Whether new subscriptions are refused.
    pub closed: bool,
    /// When the plan was disabled, if it was.
    pub disabled_at: Option<u64>,
    /// Whether new subscriptions and restores are accepted.
    pub available: bool,
}

impl PlanResponse {
    fn new(plan_idx: PlanIdx, plan: &Plan) -> Self {
        Self {
            plan_idx,
            period: plan.period,
            trial: plan.trial,
            rate: plan.rate,
            charge_discount: plan.charge_discount,
            closed: plan.closed,
            disabled_at: plan.disabled_at,
            available: plan.is_available(),
        }
    }
}

/// List plans response.
#[derive(Debug, Serialize)]
pub struct ListPlansResponse {
    /// Plans in index order.
    pub plans: Vec<PlanResponse>,
}

/// List all plans.
pub async fn list_plans(State(state): State<Arc<AppState>>) -> Json<ListPlansResponse> {
    let plans = state
        .read(|engine| {
            engine
                .plans()
                .iter()
                .zip(0..)
                .map(|(plan, plan_idx)| PlanResponse::new(plan_idx, plan))
                .collect()
        })
        .await;

    Json(ListPlansResponse { plans })
}

/// Get a single plan.
pub async fn get_plan(
    State(state): State<Arc<AppState>>,
    Path(plan_idx): Path<PlanIdx>,
) -> Result<Json<PlanResponse>, ApiError> {
    let plan = state
        .read(|engine| engine.plan(plan_idx).map(|plan| PlanResponse::new(plan_idx, plan)))
        .await?;

    Ok(Json(plan))
}

/// Create plan request.
#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    /// Period length in seconds.
    pub period: u64,
    /// Trial length in seconds (default: 0).
    #[serde(default)]
    pub trial: u64,
    /// Price per period.
    pub rate: u64,
    /// Self-service discount in percent (default: 0).
    #[serde(default)]
    pub charge_discount: u8,
}

/// Append a plan (admin only).
pub async fn create_plan(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<CreatePlanRequest>,
) -> Result<Json<PlanResponse>, ApiError> {
    let plan = state
        .execute(|engine| {
            let plan_idx =
                engine.add_plan(body.period, body.trial, body.rate, body.charge_discount)?;
            Ok(PlanResponse::new(plan_idx, engine.plan(plan_idx)?))
        })
        .await?;

    tracing::info!(admin_id = %admin.admin_id, plan_idx = plan.plan_idx, "Plan created");

    Ok(Json(plan))
}

/// Close a plan to new subscribers (admin only).
pub async fn close_plan(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(plan_idx): Path<PlanIdx>,
) -> Result<Json<PlanResponse>, ApiError> {
    update_plan(&state, plan_idx, |engine| engine.close_plan(plan_idx)).await
}

/// Reopen a closed plan (admin only).
pub async fn open_plan(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(plan_idx): Path<PlanIdx>,
) -> Result<Json<PlanResponse>, ApiError> {
    update_plan(&state, plan_idx, |engine| engine.open_plan(plan_idx)).await
}

/// Disable a plan, freezing billing for its subscribers (admin only).
pub async fn disable_plan(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(plan_idx): Path<PlanIdx>,
) -> Result<Json<PlanResponse>, ApiError> {
    update_plan(&state, plan_idx, |engine| engine.disable_plan(plan_idx)).await
}

async fn update_plan(
    state: &AppState,
    plan_idx: PlanIdx,
    op: impl FnOnce(&mut prepaid_billing_core::BillingEngine) -> prepaid_billing_core::Result<()> + Send,
) -> Result<Json<PlanResponse>, ApiError> {
    let plan = state
        .execute(|engine| {
            op(engine)?;
            Ok(PlanResponse::new(plan_idx, engine.plan(plan_idx)?))
        })
        .await?;

    Ok(Json(plan))
}
