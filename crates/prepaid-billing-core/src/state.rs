//! Snapshots and change tracking.
//!
//! [`EngineState`] is everything needed to rebuild an engine. A
//! [`Changeset`] is what one or more successful operations modified, in a
//! form a storage backend can write in a single batch.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use ulid::{Generator, Ulid};

use crate::events::{BillingEvent, EventRecord};
use crate::ids::{AccountId, EventId, PlanIdx};
use crate::plan::Plan;
use crate::subscription::Subscription;

/// Full persisted state of an engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    /// Plans in index order.
    pub plans: Vec<Plan>,
    /// All subscription records.
    pub subscriptions: Vec<Subscription>,
    /// Non-default balances.
    pub balances: Vec<(AccountId, u64)>,
    /// Revenue waiting to be withdrawn.
    pub paid_amount: u64,
}

/// Rows touched since the last [`crate::BillingEngine::take_changes`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    /// Updated or new plans.
    pub plans: Vec<(PlanIdx, Plan)>,
    /// Updated balances.
    pub balances: Vec<(AccountId, u64)>,
    /// Updated or new subscriptions.
    pub subscriptions: Vec<Subscription>,
    /// New revenue accumulator value, if it changed.
    pub paid_amount: Option<u64>,
    /// Events in emission order.
    pub events: Vec<EventRecord>,
}

impl Changeset {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
            && self.balances.is_empty()
            && self.subscriptions.is_empty()
            && self.paid_amount.is_none()
            && self.events.is_empty()
    }
}

/// Keys touched by committed operations, plus their events.
pub(crate) struct Journal {
    pub(crate) plans: BTreeSet<PlanIdx>,
    pub(crate) balances: BTreeSet<AccountId>,
    pub(crate) subscriptions: BTreeSet<AccountId>,
    pub(crate) paid_amount: bool,
    pub(crate) events: Vec<EventRecord>,
    ids: Generator,
}

/// Touched keys and event count at the start of an operation.
pub(crate) struct JournalMark {
    plans: BTreeSet<PlanIdx>,
    balances: BTreeSet<AccountId>,
    subscriptions: BTreeSet<AccountId>,
    paid_amount: bool,
    events: usize,
}

impl Default for Journal {
    fn default() -> Self {
        Self {
            plans: BTreeSet::new(),
            balances: BTreeSet::new(),
            subscriptions: BTreeSet::new(),
            paid_amount: false,
            events: Vec::new(),
            ids: Generator::new(),
        }
    }
}

impl Journal {
    pub(crate) fn record(&mut self, timestamp: u64, event: BillingEvent) {
        // monotonic within the same millisecond; overflow falls back to a fresh id
        let id = self.ids.generate().unwrap_or_else(|_| Ulid::new());
        self.events.push(EventRecord {
            id: EventId::from_ulid(id),
            timestamp,
            event,
        });
    }

    /// Everything needed to undo the journal side of a failed operation.
    pub(crate) fn mark(&self) -> JournalMark {
        JournalMark {
            plans: self.plans.clone(),
            balances: self.balances.clone(),
            subscriptions: self.subscriptions.clone(),
            paid_amount: self.paid_amount,
            events: self.events.len(),
        }
    }

    pub(crate) fn rollback(&mut self, mark: JournalMark) {
        self.plans = mark.plans;
        self.balances = mark.balances;
        self.subscriptions = mark.subscriptions;
        self.paid_amount = mark.paid_amount;
        self.events.truncate(mark.events);
    }

    pub(crate) fn clear(&mut self) {
        self.plans.clear();
        self.balances.clear();
        self.subscriptions.clear();
        self.paid_amount = false;
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_rollback_drops_events_after_mark() {
        let mut journal = Journal::default();
        journal.record(1, BillingEvent::PlanAdded { plan_idx: 0 });
        let mark = journal.mark();
        journal.record(2, BillingEvent::PlanClosed { plan_idx: 0 });
        journal.balances.insert(AccountId::generate());
        journal.paid_amount = true;
        journal.rollback(mark);
        assert_eq!(journal.events.len(), 1);
        assert!(journal.balances.is_empty());
        assert!(!journal.paid_amount);
        assert_eq!(journal.events[0].event, BillingEvent::PlanAdded { plan_idx: 0 });
    }

    #[test]
    fn journal_ids_are_increasing() {
        let mut journal = Journal::default();
        for plan_idx in 0..50 {
            journal.record(0, BillingEvent::PlanAdded { plan_idx });
        }
        assert!(journal.events.windows(2).all(|pair| pair[0].id < pair[1].id));
    }

    #[test]
    fn default_changeset_is_empty() {
        assert!(Changeset::default().is_empty());
    }
}
