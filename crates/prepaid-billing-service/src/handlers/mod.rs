//! API handlers.

pub mod accounts;
pub mod funds;
pub mod health;
pub mod payments;
pub mod plans;
pub mod subscriptions;

use prepaid_billing_core::AccountId;

use crate::error::ApiError;

/// Parse an account from a path segment or body field.
pub(crate) fn parse_account(raw: &str) -> Result<AccountId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid account id: {raw}")))
}
