//! Key encoding utilities for `RocksDB`.

use prepaid_billing_core::{AccountId, EventId, PlanIdx};

use crate::error::{Result, StoreError};

/// Create a plan key from its index.
#[must_use]
pub fn plan_key(plan_idx: PlanIdx) -> [u8; 4] {
    plan_idx.to_be_bytes()
}

/// Decode a plan key.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the key is not 4 bytes.
pub fn plan_idx_from_key(key: &[u8]) -> Result<PlanIdx> {
    let bytes: [u8; 4] = key
        .try_into()
        .map_err(|_| StoreError::Serialization(format!("bad plan key length {}", key.len())))?;
    Ok(PlanIdx::from_be_bytes(bytes))
}

/// Create an account key (balances and subscriptions).
#[must_use]
pub fn account_key(account: &AccountId) -> Vec<u8> {
    account.as_bytes().to_vec()
}

/// Create an event key from an event ID.
#[must_use]
pub fn event_key(event_id: &EventId) -> Vec<u8> {
    event_id.to_bytes().to_vec()
}

/// Create an account-event index key.
///
/// Format: `account (16 bytes) || event_id (16 bytes)`
///
/// Since ULIDs are time-ordered, events for an account sort by time.
#[must_use]
pub fn account_event_key(account: &AccountId, event_id: &EventId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(account.as_bytes());
    key.extend_from_slice(&event_id.to_bytes());
    key
}

/// Create a prefix for iterating all events of an account.
#[must_use]
pub fn account_events_prefix(account: &AccountId) -> Vec<u8> {
    account.as_bytes().to_vec()
}

/// Extract the event ID from an account-event index key.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the key is not 32 bytes.
pub fn event_id_from_account_key(key: &[u8]) -> Result<EventId> {
    let bytes: [u8; 16] = key
        .get(16..32)
        .and_then(|tail| tail.try_into().ok())
        .ok_or_else(|| StoreError::Serialization(format!("bad index key length {}", key.len())))?;
    Ok(EventId::from_bytes(bytes))
}
