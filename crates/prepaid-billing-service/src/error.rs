//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use prepaid_billing_core::{BillingError, ErrorKind};
use prepaid_billing_store::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - the current state does not allow the operation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Not enough balance.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Balance the check was made against.
        balance: u64,
        /// Amount that was needed.
        required: u64,
    },

    /// No period was owed or affordable.
    #[error("nothing to charge")]
    NothingToCharge,

    /// No collected revenue to withdraw.
    #[error("nothing to withdraw")]
    NothingToWithdraw,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// The value-transfer rail failed.
    #[error("external service error: {0}")]
    ExternalService(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientBalance { balance, required } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_balance",
                self.to_string(),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::NothingToCharge => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "nothing_to_charge",
                self.to_string(),
                None,
            ),
            Self::NothingToWithdraw => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "nothing_to_withdraw",
                self.to_string(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            Self::ExternalService(msg) => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                msg.clone(),
                None,
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::InsufficientBalance { balance, required } => {
                Self::InsufficientBalance { balance, required }
            }
            BillingError::NothingToCharge => Self::NothingToCharge,
            BillingError::NothingToWithdraw => Self::NothingToWithdraw,
            other => {
                let message = other.to_string();
                match other.kind() {
                    ErrorKind::Validation => Self::BadRequest(message),
                    ErrorKind::NotFound => Self::NotFound(message),
                    ErrorKind::Precondition | ErrorKind::Resource | ErrorKind::NoOp => {
                        Self::Conflict(message)
                    }
                    ErrorKind::Transfer => Self::ExternalService(message),
                }
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound("record not found".into()),
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prepaid_billing_core::AccountId;

    #[test]
    fn billing_errors_map_to_statuses() {
        let account = AccountId::generate();
        let cases = [
            (BillingError::InvalidPlan("rate cannot be zero"), StatusCode::BAD_REQUEST),
            (BillingError::PlanNotFound { plan_idx: 4 }, StatusCode::NOT_FOUND),
            (BillingError::NotSubscribed { account }, StatusCode::NOT_FOUND),
            (BillingError::AlreadySubscribed { account }, StatusCode::CONFLICT),
            (BillingError::PlanUnavailable { plan_idx: 0 }, StatusCode::CONFLICT),
            (
                BillingError::InsufficientBalance {
                    balance: 1,
                    required: 2,
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (BillingError::NothingToCharge, StatusCode::UNPROCESSABLE_ENTITY),
            (BillingError::NothingToWithdraw, StatusCode::UNPROCESSABLE_ENTITY),
            (BillingError::ZeroReceiver, StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            let label = err.to_string();
            assert_eq!(ApiError::from(err).into_response().status(), status, "{label}");
        }
    }

    #[test]
    fn store_errors_are_internal() {
        let response = ApiError::from(StoreError::Database("disk full".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
