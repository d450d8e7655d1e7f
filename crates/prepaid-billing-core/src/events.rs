//! Audit events.
//!
//! Every state change yields exactly one [`BillingEvent`]. Events of a failed
//! operation are dropped together with the operation.

use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, EventId, PlanIdx};

/// A state change in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum BillingEvent {
    /// A plan was appended to the registry.
    PlanAdded {
        /// New plan index.
        plan_idx: PlanIdx,
    },
    /// A plan was disabled.
    PlanDisabled {
        /// Plan index.
        plan_idx: PlanIdx,
    },
    /// A plan was closed to new subscribers.
    PlanClosed {
        /// Plan index.
        plan_idx: PlanIdx,
    },
    /// A closed plan was reopened.
    PlanOpened {
        /// Plan index.
        plan_idx: PlanIdx,
    },
    /// An account subscribed.
    Subscribed {
        /// Subscriber.
        account: AccountId,
        /// Plan index.
        plan_idx: PlanIdx,
    },
    /// A subscription was cancelled by its holder.
    Cancelled {
        /// Subscriber.
        account: AccountId,
        /// Plan index.
        plan_idx: PlanIdx,
    },
    /// A subscription restarted counting from the current time.
    Restored {
        /// Subscriber.
        account: AccountId,
        /// Plan index.
        plan_idx: PlanIdx,
    },
    /// Periods were charged.
    Charged {
        /// Subscriber whose periods were charged.
        account: AccountId,
        /// Account whose balance funded the charge.
        payer: AccountId,
        /// Plan index.
        plan_idx: PlanIdx,
        /// Number of periods.
        periods: u64,
        /// Amount debited.
        amount: u64,
    },
    /// Value was deposited into custody.
    Deposited {
        /// Account credited.
        account: AccountId,
        /// Amount.
        amount: u64,
    },
    /// Value left custody to its owner.
    Withdrawn {
        /// Account debited.
        account: AccountId,
        /// Amount.
        amount: u64,
    },
    /// Collected revenue was swept out.
    PaymentsWithdrawn {
        /// Destination.
        receiver: AccountId,
        /// Amount.
        amount: u64,
    },
}

impl BillingEvent {
    /// The account this event concerns, if any.
    #[must_use]
    pub const fn account(&self) -> Option<AccountId> {
        match self {
            Self::Subscribed { account, .. }
            | Self::Cancelled { account, .. }
            | Self::Restored { account, .. }
            | Self::Charged { account, .. }
            | Self::Deposited { account, .. }
            | Self::Withdrawn { account, .. } => Some(*account),
            Self::PaymentsWithdrawn { receiver, .. } => Some(*receiver),
            Self::PlanAdded { .. }
            | Self::PlanDisabled { .. }
            | Self::PlanClosed { .. }
            | Self::PlanOpened { .. } => None,
        }
    }

    /// Short machine-readable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PlanAdded { .. } => "plan_added",
            Self::PlanDisabled { .. } => "plan_disabled",
            Self::PlanClosed { .. } => "plan_closed",
            Self::PlanOpened { .. } => "plan_opened",
            Self::Subscribed { .. } => "subscribed",
            Self::Cancelled { .. } => "cancelled",
            Self::Restored { .. } => "restored",
            Self::Charged { .. } => "charged",
            Self::Deposited { .. } => "deposited",
            Self::Withdrawn { .. } => "withdrawn",
            Self::PaymentsWithdrawn { .. } => "payments_withdrawn",
        }
    }
}

/// A recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Time-ordered identifier.
    pub id: EventId,
    /// Engine time when the event happened.
    pub timestamp: u64,
    /// What happened.
    pub event: BillingEvent,
}
