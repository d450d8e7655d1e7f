//! Value-transfer collaborator.
//!
//! The engine never moves real value itself. Deposits are accepted through
//! [`ValueTransfer::receive`] and withdrawals leave custody through
//! [`ValueTransfer::send`]. A failure from either aborts the enclosing
//! engine operation.

use crate::ids::AccountId;

/// Failure reported by a value-transfer rail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{direction} of {amount} for {account} rejected: {reason}")]
pub struct TransferError {
    /// Whether value was coming in or going out.
    pub direction: TransferDirection,
    /// The counterparty.
    pub account: AccountId,
    /// The amount that failed to move.
    pub amount: u64,
    /// Rail-specific reason.
    pub reason: String,
}

/// Direction of a value movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Into custody.
    Incoming,
    /// Out of custody.
    Outgoing,
}

impl std::fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incoming => f.write_str("incoming transfer"),
            Self::Outgoing => f.write_str("outgoing transfer"),
        }
    }
}

/// Moves value into and out of the engine's custody.
pub trait ValueTransfer: Send {
    /// Accept `amount` from `from` into custody.
    ///
    /// # Errors
    ///
    /// Returns an error if the value could not be collected.
    fn receive(&mut self, from: AccountId, amount: u64) -> Result<(), TransferError>;

    /// Send `amount` out of custody to `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value could not be delivered.
    fn send(&mut self, to: AccountId, amount: u64) -> Result<(), TransferError>;
}

/// Rail that accepts every movement and only logs it.
///
/// Settlement happens outside the engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllTransfer;

impl ValueTransfer for AcceptAllTransfer {
    fn receive(&mut self, from: AccountId, amount: u64) -> Result<(), TransferError> {
        tracing::debug!(account = %from, amount, "Accepted incoming value");
        Ok(())
    }

    fn send(&mut self, to: AccountId, amount: u64) -> Result<(), TransferError> {
        tracing::debug!(account = %to, amount, "Released outgoing value");
        Ok(())
    }
}
