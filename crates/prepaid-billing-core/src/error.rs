//! Error types for the billing engine.

use crate::ids::{AccountId, IdError, PlanIdx};
use crate::transfer::TransferError;

/// Result type for billing operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors that can occur in billing operations.
///
/// Every error aborts the whole call; no operation leaves partial state
/// behind when it returns one of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    /// Plan parameters violate a registry constraint.
    #[error("{0}")]
    InvalidPlan(&'static str),

    /// An amount is zero where a positive value is required, or overflows.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The plan index does not exist in the registry.
    #[error("plan not found: {plan_idx}")]
    PlanNotFound {
        /// The requested plan index.
        plan_idx: PlanIdx,
    },

    /// The plan is closed or disabled.
    #[error("plan unavailable: {plan_idx}")]
    PlanUnavailable {
        /// The plan index.
        plan_idx: PlanIdx,
    },

    /// The plan is already closed.
    #[error("plan already closed")]
    PlanAlreadyClosed {
        /// The plan index.
        plan_idx: PlanIdx,
    },

    /// The plan is open, so it cannot be reopened.
    #[error("plan not closed")]
    PlanNotClosed {
        /// The plan index.
        plan_idx: PlanIdx,
    },

    /// The plan has already been disabled.
    #[error("plan already disabled")]
    PlanAlreadyDisabled {
        /// The plan index.
        plan_idx: PlanIdx,
    },

    /// The account has no subscription record.
    #[error("not subscribed: {account}")]
    NotSubscribed {
        /// The account.
        account: AccountId,
    },

    /// The account already has a subscription record, cancelled or not.
    #[error("already subscribed: {account}")]
    AlreadySubscribed {
        /// The account.
        account: AccountId,
    },

    /// The subscription is already cancelled.
    #[error("subscription already cancelled: {account}")]
    AlreadyCancelled {
        /// The account.
        account: AccountId,
    },

    /// The subscription is not cancelled, so it cannot be restored.
    #[error("subscription not cancelled: {account}")]
    NotCancelled {
        /// The account.
        account: AccountId,
    },

    /// The balance cannot cover the requested amount.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// The balance that was available.
        balance: u64,
        /// The amount that was required.
        required: u64,
    },

    /// The call was valid but no period was owed.
    #[error("nothing to charge")]
    NothingToCharge,

    /// No collected revenue is waiting to be withdrawn.
    #[error("nothing to withdraw")]
    NothingToWithdraw,

    /// Revenue cannot be sent to the null address.
    #[error("receiver is zero address")]
    ZeroReceiver,

    /// The value-transfer rail rejected a movement.
    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

/// Coarse classification of a [`BillingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, rejected before any state is read.
    Validation,
    /// The referenced plan or subscription is missing.
    NotFound,
    /// The current state does not allow the operation.
    Precondition,
    /// Not enough balance.
    Resource,
    /// Valid call with nothing to do.
    NoOp,
    /// The value-transfer collaborator failed.
    Transfer,
}

impl BillingError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPlan(_) | Self::InvalidAmount(_) | Self::InvalidId(_) | Self::ZeroReceiver => {
                ErrorKind::Validation
            }
            Self::PlanNotFound { .. } | Self::NotSubscribed { .. } => ErrorKind::NotFound,
            Self::PlanUnavailable { .. }
            | Self::PlanAlreadyClosed { .. }
            | Self::PlanNotClosed { .. }
            | Self::PlanAlreadyDisabled { .. }
            | Self::AlreadySubscribed { .. }
            | Self::AlreadyCancelled { .. }
            | Self::NotCancelled { .. } => ErrorKind::Precondition,
            Self::InsufficientBalance { .. } => ErrorKind::Resource,
            Self::NothingToCharge | Self::NothingToWithdraw => ErrorKind::NoOp,
            Self::Transfer(_) => ErrorKind::Transfer,
        }
    }
}
