//! Core engine for prepaid-billing.
//!
//! Accounts deposit value into custody and subscribe to a plan. Plans bill in
//! advance: each period is owed in full the moment it begins and is paid from
//! the custodial balance, either when someone charges it or implicitly when
//! the holder deposits, cancels or restores.
//!
//! - **Plans**: `Plan`, `PlanRegistry` (append-only, indexed from 0)
//! - **Ledger**: `Ledger` (balances plus collected revenue)
//! - **Subscriptions**: `Subscription`, `SubscriptionStatus`
//! - **Engine**: `BillingEngine` with lifecycle operations and read queries
//! - **Persistence**: `EngineState` snapshots and `Changeset` deltas
//!
//! # Units
//!
//! Amounts are unsigned base units of the settlement asset. Timestamps and
//! durations are seconds. Nothing is ever negative; shortfalls are errors.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod engine;
pub mod error;
pub mod events;
pub mod ids;
pub mod ledger;
pub mod lifecycle;
pub mod math;
pub mod plan;
pub mod query;
pub mod state;
pub mod subscription;
pub mod transfer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{BillingEngine, Collect};
pub use error::{BillingError, ErrorKind, Result};
pub use events::{BillingEvent, EventRecord};
pub use ids::{AccountId, EventId, IdError, PlanIdx};
pub use ledger::Ledger;
pub use lifecycle::ChargeReceipt;
pub use math::ChargeQuote;
pub use plan::{Plan, PlanRegistry};
pub use query::{AccountSummary, SubscriptionView};
pub use state::{Changeset, EngineState};
pub use subscription::{Subscription, SubscriptionStatus};
pub use transfer::{AcceptAllTransfer, TransferDirection, TransferError, ValueTransfer};
