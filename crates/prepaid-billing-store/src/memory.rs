//! In-memory storage, used by tests and ephemeral deployments.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use prepaid_billing_core::{
    AccountId, Changeset, EngineState, EventId, EventRecord, Plan, PlanIdx, Subscription,
};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Default)]
struct Tables {
    plans: BTreeMap<PlanIdx, Plan>,
    subscriptions: BTreeMap<AccountId, Subscription>,
    balances: BTreeMap<AccountId, u64>,
    paid_amount: u64,
    events: BTreeMap<EventId, EventRecord>,
    events_by_account: BTreeMap<AccountId, Vec<EventId>>,
}

/// Mutex-guarded maps implementing [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

impl Store for MemoryStore {
    fn load_state(&self) -> Result<EngineState> {
        let tables = self.lock()?;
        Ok(EngineState {
            plans: tables.plans.values().cloned().collect(),
            subscriptions: tables.subscriptions.values().cloned().collect(),
            balances: tables
                .balances
                .iter()
                .map(|(account, balance)| (*account, *balance))
                .collect(),
            paid_amount: tables.paid_amount,
        })
    }

    fn apply(&self, changes: &Changeset) -> Result<()> {
        let mut tables = self.lock()?;
        for (plan_idx, plan) in &changes.plans {
            tables.plans.insert(*plan_idx, plan.clone());
        }
        for sub in &changes.subscriptions {
            tables.subscriptions.insert(sub.account, sub.clone());
        }
        for (account, balance) in &changes.balances {
            tables.balances.insert(*account, *balance);
        }
        if let Some(paid_amount) = changes.paid_amount {
            tables.paid_amount = paid_amount;
        }
        for record in &changes.events {
            if let Some(account) = record.event.account() {
                tables
                    .events_by_account
                    .entry(account)
                    .or_default()
                    .push(record.id);
            }
            tables.events.insert(record.id, record.clone());
        }
        Ok(())
    }

    fn get_event(&self, event_id: &EventId) -> Result<Option<EventRecord>> {
        Ok(self.lock()?.events.get(event_id).cloned())
    }

    fn list_events_by_account(
        &self,
        account: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EventRecord>> {
        let tables = self.lock()?;
        let Some(ids) = tables.events_by_account.get(account) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .filter_map(|id| tables.events.get(id).cloned())
            .collect())
    }
}
