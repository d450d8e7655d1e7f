//! Common test utilities for prepaid-billing integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

use prepaid_billing_core::{AccountId, ManualClock};
use prepaid_billing_service::auth::AccountClaims;
use prepaid_billing_service::{create_router, AppState, ServiceConfig};
use prepaid_billing_store::{MemoryStore, Store};

pub const ADMIN_KEY: &str = "test-admin-key";
pub const JWT_SECRET: &str = "test-jwt-secret";
pub const AUDIENCE: &str = "prepaid-billing";
pub const START: u64 = 1_700_000_000;
pub const DAY: u64 = 24 * 60 * 60;
pub const WEEK: u64 = 7 * DAY;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Engine time, shared with the service.
    pub clock: Arc<ManualClock>,
    /// The backing store.
    pub store: Arc<dyn Store>,
    /// A test account for authenticated requests.
    pub test_account: AccountId,
}

impl TestHarness {
    /// Create a new test harness with an empty in-memory store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// Create a harness on top of an existing store.
    pub fn with_store(store: Arc<dyn Store>) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let state = AppState::new(store.clone(), test_config(), clock.clone())
            .expect("Failed to load state");
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            clock,
            store,
            test_account: AccountId::generate(),
        }
    }

    /// Authorization header for the test account.
    pub fn user_auth_header(&self) -> String {
        Self::auth_header_for(&self.test_account)
    }

    /// Authorization header for any account.
    pub fn auth_header_for(account: &AccountId) -> String {
        format!("Bearer {}", mint_token(&account.to_string(), AUDIENCE, JWT_SECRET))
    }

    /// Admin key header value.
    pub fn admin_key_header(&self) -> String {
        ADMIN_KEY.to_string()
    }

    /// Add a plan through the admin API and return its index.
    pub async fn create_plan(&self, period: u64, trial: u64, rate: u64, discount: u8) -> u64 {
        let response = self
            .server
            .post("/v1/plans")
            .add_header("x-api-key", self.admin_key_header())
            .json(&json!({
                "period": period,
                "trial": trial,
                "rate": rate,
                "charge_discount": discount
            }))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body["plan_idx"].as_u64().unwrap()
    }

    /// Deposit into an account through the account API.
    pub async fn deposit(&self, account: &AccountId, amount: u64) {
        self.server
            .post("/v1/deposit")
            .add_header("authorization", Self::auth_header_for(account))
            .json(&json!({ "amount": amount }))
            .await
            .assert_status_ok();
    }

    /// Subscribe the test account, depositing `deposit` first.
    pub async fn subscribe_test_account(&self, plan_idx: u64, deposit: u64) {
        self.server
            .post("/v1/subscription")
            .add_header("authorization", self.user_auth_header())
            .json(&json!({ "plan_idx": plan_idx, "deposit": deposit }))
            .await
            .assert_status_ok();
    }

    /// Account summary JSON.
    pub async fn summary(&self, account: &AccountId) -> serde_json::Value {
        let response = self.server.get(&format!("/v1/accounts/{account}")).await;
        response.assert_status_ok();
        response.json()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Service configuration used by every harness.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        listen_addr: "127.0.0.1:0".into(),
        admin_api_key: Some(ADMIN_KEY.into()),
        jwt_secret: Some(JWT_SECRET.into()),
        jwt_audience: AUDIENCE.into(),
        ..ServiceConfig::default()
    }
}

/// Sign an account token.
pub fn mint_token(sub: &str, audience: &str, secret: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = AccountClaims {
        sub: sub.to_string(),
        aud: audience.to_string(),
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to sign token")
}
