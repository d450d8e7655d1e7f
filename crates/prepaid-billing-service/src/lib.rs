//! Prepaid-billing HTTP API service.
//!
//! This crate exposes the billing engine over HTTP:
//!
//! - Plan registry (public reads, admin writes)
//! - Deposits, withdrawals and the subscription lifecycle
//! - Charging, batch charging and revenue withdrawal
//! - Read-only account projections and audit events
//!
//! # Authentication
//!
//! The service supports two authentication methods:
//!
//! 1. **Account JWT tokens** - HS256 bearer tokens whose `sub` is the account UUID
//! 2. **Admin API key** - The `X-API-Key` header, for the billing owner
//!
//! # Consistency
//!
//! The engine sits behind one async mutex. A mutating request runs its
//! operation and writes the resulting changeset before the lock is released.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers are async for axum

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
