//! Authentication extractors.
//!
//! This module provides extractors for:
//! - `AccountAuth` - Account holders, via HS256 JWT bearer tokens
//! - `AdminAuth` - The billing owner, via the `X-API-Key` header

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use prepaid_billing_core::AccountId;

use crate::error::ApiError;
use crate::state::AppState;

/// An account holder authenticated by a bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AccountAuth {
    /// The account the token was issued for.
    pub account: AccountId,
}

/// JWT claims carried by account tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountClaims {
    /// Subject (account UUID).
    pub sub: String,
    /// Audience.
    pub aud: String,
    /// Expiration time.
    pub exp: i64,
    /// Issued at.
    pub iat: i64,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AccountAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Extract the Bearer token
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let secret = state
            .config
            .jwt_secret
            .as_ref()
            .ok_or(ApiError::Unauthorized)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&state.config.jwt_audience]);

        let claims = decode::<AccountClaims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            ApiError::Unauthorized
        })?
        .claims;

        let account = claims
            .sub
            .parse::<AccountId>()
            .map_err(|_| ApiError::Unauthorized)?;
        if account.is_nil() {
            return Err(ApiError::Unauthorized);
        }

        Ok(AccountAuth { account })
    }
}

/// Admin authentication via API key.
///
/// Admin routes stand in for the billing owner: plan management, batch
/// charges and revenue withdrawal.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Admin identifier (for audit logging).
    pub admin_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Check for X-API-Key header
        let api_key = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        // Validate against configured admin API key
        let expected_key = state
            .config
            .admin_api_key
            .as_ref()
            .ok_or(ApiError::Unauthorized)?;

        if api_key != expected_key {
            return Err(ApiError::Unauthorized);
        }

        let admin_id = parts
            .headers
            .get("x-admin-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("admin")
            .to_string();

        tracing::debug!(admin_id = %admin_id, "Admin authenticated");

        Ok(AdminAuth { admin_id })
    }
}
