//! Prepaid-billing client SDK.
//!
//! Typed access to the prepaid-billing HTTP API for account holders (JWT
//! bearer token) and operators (service API key).
//!
//! # Example
//!
//! ```no_run
//! use prepaid_billing_client::PrepaidBillingClient;
//!
//! # async fn example() -> Result<(), prepaid_billing_client::ClientError> {
//! let client = PrepaidBillingClient::new("http://prepaid-billing:8080")?
//!     .with_account_token("user-jwt");
//!
//! client.deposit(1_000).await?;
//! let summary = client.subscribe(0, 0).await?;
//! if let Some(subscription) = summary.subscription {
//!     println!("valid until {}", subscription.valid_until);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, PrepaidBillingClient};
pub use error::ClientError;
pub use types::*;
