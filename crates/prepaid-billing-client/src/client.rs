//! Prepaid-billing HTTP client implementation.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ClientError;
use crate::types::{
    AccountId, AccountSummary, AmountRequest, ApiErrorResponse, BalanceResponse,
    ChargeBatchRequest, ChargeBatchResponse, ChargeQuote, ChargeReceipt, ChargeResponse,
    CreatePlanRequest, GrantRequest, HealthResponse, ListEventsResponse, ListPlansResponse,
    PaymentsResponse, PlanIdx, PlanResponse, SubscribeRequest, WithdrawPaymentsRequest,
    WithdrawPaymentsResponse,
};

/// Prepaid-billing API client.
///
/// Account operations need an account token (`with_account_token`); operator
/// operations need the service API key (`with_admin_key`). Public reads need
/// neither.
#[derive(Debug, Clone)]
pub struct PrepaidBillingClient {
    client: Client,
    base_url: String,
    account_token: Option<String>,
    admin_key: Option<String>,
    admin_id: String,
}

impl PrepaidBillingClient {
    /// Create a client with default options.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, ClientOptions::default())
    }

    /// Create a client with custom options.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account_token: None,
            admin_key: None,
            admin_id: options.admin_id,
        })
    }

    /// Act as the account holding this JWT.
    #[must_use]
    pub fn with_account_token(mut self, token: impl Into<String>) -> Self {
        self.account_token = Some(token.into());
        self
    }

    /// Act as an operator holding this API key.
    #[must_use]
    pub fn with_admin_key(mut self, key: impl Into<String>) -> Self {
        self.admin_key = Some(key.into());
        self
    }

    // =========================================================================
    // Public reads
    // =========================================================================

    /// Check service health.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.send(self.client.get(self.url("/health"))).await
    }

    /// List all plans.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_plans(&self) -> Result<Vec<PlanResponse>, ClientError> {
        let response: ListPlansResponse = self.send(self.client.get(self.v1("/plans"))).await?;
        Ok(response.plans)
    }

    /// Get one plan.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] for an unknown index.
    pub async fn get_plan(&self, plan_idx: PlanIdx) -> Result<PlanResponse, ClientError> {
        self.send(self.client.get(self.v1(&format!("/plans/{plan_idx}"))))
            .await
    }

    /// Balance, reservation and subscription timeline of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn account(&self, account: &AccountId) -> Result<AccountSummary, ClientError> {
        self.send(self.client.get(self.v1(&format!("/accounts/{account}"))))
            .await
    }

    /// Price of charging an account right now.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn preview_charge(
        &self,
        account: &AccountId,
        as_self: bool,
    ) -> Result<ChargeQuote, ClientError> {
        let request = self
            .client
            .get(self.v1(&format!("/accounts/{account}/preview")))
            .query(&[("as_self", as_self)]);
        self.send(request).await
    }

    /// A page of an account's events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_events(
        &self,
        account: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<ListEventsResponse, ClientError> {
        let request = self
            .client
            .get(self.v1(&format!("/accounts/{account}/events")))
            .query(&[("limit", limit), ("offset", offset)]);
        self.send(request).await
    }

    // =========================================================================
    // Account operations
    // =========================================================================

    /// Deposit into the caller's balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn deposit(&self, amount: u64) -> Result<BalanceResponse, ClientError> {
        self.post_as_account("/deposit", &AmountRequest { amount })
            .await
    }

    /// Withdraw from the caller's available balance.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InsufficientBalance`] above the available balance.
    pub async fn withdraw(&self, amount: u64) -> Result<BalanceResponse, ClientError> {
        self.post_as_account("/withdraw", &AmountRequest { amount })
            .await
    }

    /// Subscribe the caller to a plan, depositing `deposit` first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InsufficientBalance`] if one period is unaffordable.
    pub async fn subscribe(
        &self,
        plan_idx: PlanIdx,
        deposit: u64,
    ) -> Result<AccountSummary, ClientError> {
        self.post_as_account("/subscription", &SubscribeRequest { plan_idx, deposit })
            .await
    }

    /// Cancel the caller's subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn cancel(&self) -> Result<AccountSummary, ClientError> {
        let request = self.account_auth(self.client.post(self.v1("/subscription/cancel")))?;
        self.send(request).await
    }

    /// Restart the caller's cancelled or lapsed subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn restore(&self) -> Result<AccountSummary, ClientError> {
        let request = self.account_auth(self.client.post(self.v1("/subscription/restore")))?;
        self.send(request).await
    }

    /// Charge an account's owed periods; discounted when it is the caller's own.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NothingToCharge`] when nothing is owed.
    pub async fn charge(&self, account: &AccountId) -> Result<ChargeResponse, ClientError> {
        let request = self.account_auth(
            self.client
                .post(self.v1(&format!("/accounts/{account}/charge"))),
        )?;
        self.send(request).await
    }

    // =========================================================================
    // Operator operations
    // =========================================================================

    /// Register a new plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn create_plan(
        &self,
        request: &CreatePlanRequest,
    ) -> Result<PlanResponse, ClientError> {
        self.post_as_admin("/plans", request).await
    }

    /// Stop a plan from accepting new subscribers.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn close_plan(&self, plan_idx: PlanIdx) -> Result<PlanResponse, ClientError> {
        self.plan_action(plan_idx, "close").await
    }

    /// Reopen a closed plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn open_plan(&self, plan_idx: PlanIdx) -> Result<PlanResponse, ClientError> {
        self.plan_action(plan_idx, "open").await
    }

    /// Permanently disable a plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn disable_plan(&self, plan_idx: PlanIdx) -> Result<PlanResponse, ClientError> {
        self.plan_action(plan_idx, "disable").await
    }

    /// Mark periods as paid without moving funds.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn grant_periods(
        &self,
        account: &AccountId,
        periods: u64,
    ) -> Result<ChargeReceipt, ClientError> {
        self.post_as_admin(&format!("/accounts/{account}/grant"), &GrantRequest { periods })
            .await
    }

    /// Charge many accounts at the full rate.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NothingToCharge`] if no account owed anything.
    pub async fn charge_batch(
        &self,
        accounts: &[AccountId],
    ) -> Result<ChargeBatchResponse, ClientError> {
        let request = ChargeBatchRequest {
            accounts: accounts.iter().map(ToString::to_string).collect(),
        };
        self.post_as_admin("/charges/batch", &request).await
    }

    /// Revenue collected and not yet swept.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn payments(&self) -> Result<u64, ClientError> {
        let request = self.admin_auth(self.client.get(self.v1("/payments")))?;
        let response: PaymentsResponse = self.send(request).await?;
        Ok(response.paid_amount)
    }

    /// Sweep all collected revenue to `receiver`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NothingToWithdraw`] if nothing was collected.
    pub async fn withdraw_payments(
        &self,
        receiver: &AccountId,
    ) -> Result<WithdrawPaymentsResponse, ClientError> {
        let request = WithdrawPaymentsRequest {
            receiver: receiver.to_string(),
        };
        self.post_as_admin("/payments/withdraw", &request).await
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn v1(&self, path: &str) -> String {
        format!("{}/v1{path}", self.base_url)
    }

    fn account_auth(&self, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self
            .account_token
            .as_deref()
            .ok_or_else(|| ClientError::Configuration("account token not set".into()))?;
        Ok(request.bearer_auth(token))
    }

    fn admin_auth(&self, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let key = self
            .admin_key
            .as_deref()
            .ok_or_else(|| ClientError::Configuration("admin key not set".into()))?;
        Ok(request
            .header("x-api-key", key)
            .header("x-admin-id", &self.admin_id))
    }

    async fn post_as_account<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let request = self.account_auth(self.client.post(self.v1(path)).json(body))?;
        self.send(request).await
    }

    async fn post_as_admin<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let request = self.admin_auth(self.client.post(self.v1(path)).json(body))?;
        self.send(request).await
    }

    async fn plan_action(&self, plan_idx: PlanIdx, action: &str) -> Result<PlanResponse, ClientError> {
        let request = self.admin_auth(
            self.client
                .post(self.v1(&format!("/plans/{plan_idx}/{action}"))),
        )?;
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let code = api_error.error.code.as_str();
                let message = api_error.error.message;
                tracing::debug!(status = status.as_u16(), code, %message, "API error");

                match code {
                    "insufficient_balance" => {
                        let detail = |name: &str| {
                            api_error
                                .error
                                .details
                                .as_ref()
                                .and_then(|d| d.get(name))
                                .and_then(serde_json::Value::as_u64)
                                .unwrap_or(0)
                        };
                        Err(ClientError::InsufficientBalance {
                            balance: detail("balance"),
                            required: detail("required"),
                        })
                    }
                    "nothing_to_charge" => Err(ClientError::NothingToCharge),
                    "nothing_to_withdraw" => Err(ClientError::NothingToWithdraw),
                    "not_found" => Err(ClientError::NotFound(message)),
                    _ => Err(ClientError::Api {
                        code: code.to_string(),
                        message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Operator identity sent with admin calls, for the service's logs.
    pub admin_id: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            admin_id: "sdk".to_string(),
        }
    }
}
