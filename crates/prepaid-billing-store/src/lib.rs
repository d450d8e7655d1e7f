//! Storage layer for prepaid-billing.
//!
//! The engine works on an in-memory model; a store persists it. On startup the
//! service loads an [`EngineState`] snapshot, and after each successful
//! operation it writes the [`Changeset`] the engine produced.
//!
//! # Architecture
//!
//! The `RocksDB` backend uses the following column families:
//!
//! - `plans`: Plan records, keyed by big-endian plan index
//! - `subscriptions`: Subscription records, keyed by account
//! - `balances`: Custodial balances, keyed by account
//! - `meta`: Engine-wide values (collected revenue)
//! - `events`: Event records, keyed by event id (ULID)
//! - `events_by_account`: Index for listing events by account
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use prepaid_billing_core::{AcceptAllTransfer, AccountId, BillingEngine, SystemClock};
//! use prepaid_billing_store::{RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/prepaid-billing-db").unwrap();
//! let mut engine = BillingEngine::from_state(
//!     store.load_state().unwrap(),
//!     AcceptAllTransfer,
//!     Arc::new(SystemClock),
//! );
//!
//! engine.deposit(AccountId::generate(), 500).unwrap();
//! store.apply(&engine.take_changes()).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use prepaid_billing_core::{AccountId, Changeset, EngineState, EventId, EventRecord};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Engine State
    // =========================================================================

    /// Load the full engine snapshot. An empty store yields the default state.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or a record is corrupt.
    fn load_state(&self) -> Result<EngineState>;

    /// Persist everything in `changes` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing is written then.
    fn apply(&self, changes: &Changeset) -> Result<()>;

    // =========================================================================
    // Event Operations
    // =========================================================================

    /// Get an event by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_event(&self, event_id: &EventId) -> Result<Option<EventRecord>>;

    /// List events concerning an account, ordered by time (newest first).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_events_by_account(
        &self,
        account: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EventRecord>>;
}
