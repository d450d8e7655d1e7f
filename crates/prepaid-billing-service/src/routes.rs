//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, funds, health, payments, plans, subscriptions};
use crate::state::AppState;

/// Maximum concurrent requests for API endpoints.
///
/// Engine calls are serialised anyway; this bounds the queue in front of it.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /v1/plans` - List plans
/// - `GET /v1/plans/:plan_idx` - Get a plan
/// - `GET /v1/accounts/:account` - Balance, reservation and subscription timeline
/// - `GET /v1/accounts/:account/preview` - Preview a charge
/// - `GET /v1/accounts/:account/events` - Audit events (newest first)
///
/// ## Account (Bearer JWT)
/// - `POST /v1/deposit` - Deposit
/// - `POST /v1/withdraw` - Withdraw available balance
/// - `POST /v1/subscription` - Subscribe, optionally depositing first
/// - `POST /v1/subscription/cancel` - Cancel
/// - `POST /v1/subscription/restore` - Restore
/// - `POST /v1/accounts/:account/charge` - Charge owed periods
///
/// ## Admin (`X-API-Key`)
/// - `POST /v1/plans` - Add a plan
/// - `POST /v1/plans/:plan_idx/close` - Close a plan
/// - `POST /v1/plans/:plan_idx/open` - Reopen a plan
/// - `POST /v1/plans/:plan_idx/disable` - Disable a plan
/// - `POST /v1/accounts/:account/grant` - Mark periods paid without funds
/// - `POST /v1/charges/batch` - Charge many accounts
/// - `GET /v1/payments` - Collected revenue
/// - `POST /v1/payments/withdraw` - Sweep collected revenue
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let api_routes = Router::new()
        // Plans
        .route("/plans", get(plans::list_plans).post(plans::create_plan))
        .route("/plans/:plan_idx", get(plans::get_plan))
        .route("/plans/:plan_idx/close", post(plans::close_plan))
        .route("/plans/:plan_idx/open", post(plans::open_plan))
        .route("/plans/:plan_idx/disable", post(plans::disable_plan))
        // Funds
        .route("/deposit", post(funds::deposit))
        .route("/withdraw", post(funds::withdraw))
        // Subscription of the caller
        .route("/subscription", post(subscriptions::subscribe))
        .route("/subscription/cancel", post(subscriptions::cancel))
        .route("/subscription/restore", post(subscriptions::restore))
        // Accounts
        .route("/accounts/:account", get(accounts::get_account))
        .route("/accounts/:account/preview", get(accounts::preview_charge))
        .route("/accounts/:account/events", get(accounts::list_events))
        .route("/accounts/:account/charge", post(accounts::charge))
        .route("/accounts/:account/grant", post(accounts::grant_periods))
        // Revenue
        .route("/charges/batch", post(payments::charge_batch))
        .route("/payments", get(payments::get_payments))
        .route("/payments/withdraw", post(payments::withdraw_payments))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
