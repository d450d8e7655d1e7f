//! The billing engine.
//!
//! [`BillingEngine`] owns the plan registry, the ledger and the subscription
//! map. Each public operation validates everything it can before touching
//! state, so an error leaves the engine exactly as it was. The only failure
//! that can occur after a mutation is an outgoing transfer, and that path
//! rolls its debit back explicitly.
//!
//! Subscription lifecycle operations live in [`crate::lifecycle`], read-only
//! projections in [`crate::query`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{BillingError, Result};
use crate::events::BillingEvent;
use crate::ids::{AccountId, PlanIdx};
use crate::ledger::Ledger;
use crate::math::ChargeQuote;
use crate::plan::{Plan, PlanRegistry};
use crate::state::{Changeset, EngineState, Journal};
use crate::subscription::Subscription;
use crate::transfer::ValueTransfer;

/// Whether a charge moves funds or only advances the period counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collect {
    /// Debit the payer and credit collected revenue.
    Payment,
    /// Count the periods as charged without moving funds.
    Nothing,
}

/// Prepaid subscription billing engine.
pub struct BillingEngine {
    pub(crate) plans: PlanRegistry,
    pub(crate) ledger: Ledger,
    pub(crate) subscriptions: HashMap<AccountId, Subscription>,
    transfer: Box<dyn ValueTransfer>,
    clock: Arc<dyn Clock>,
    journal: Journal,
}

impl BillingEngine {
    /// Create an empty engine.
    pub fn new(transfer: impl ValueTransfer + 'static, clock: Arc<dyn Clock>) -> Self {
        Self::from_state(EngineState::default(), transfer, clock)
    }

    /// Rebuild an engine from a persisted snapshot.
    pub fn from_state(
        state: EngineState,
        transfer: impl ValueTransfer + 'static,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let subscriptions = state
            .subscriptions
            .into_iter()
            .map(|sub| (sub.account, sub))
            .collect();
        Self {
            plans: PlanRegistry::from_plans(state.plans),
            ledger: Ledger::from_parts(state.balances.into_iter().collect(), state.paid_amount),
            subscriptions,
            transfer: Box::new(transfer),
            clock,
            journal: Journal::default(),
        }
    }

    /// Full snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        let mut subscriptions: Vec<_> = self.subscriptions.values().cloned().collect();
        subscriptions.sort_by_key(|sub| sub.account);
        let mut balances: Vec<_> = self
            .ledger
            .balances()
            .iter()
            .map(|(account, balance)| (*account, *balance))
            .collect();
        balances.sort_unstable();
        EngineState {
            plans: self.plans.plans().to_vec(),
            subscriptions,
            balances,
            paid_amount: self.ledger.paid_amount(),
        }
    }

    /// Current engine time.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Drain the rows and events touched since the previous call.
    pub fn take_changes(&mut self) -> Changeset {
        let plans = self
            .journal
            .plans
            .iter()
            .filter_map(|idx| self.plans.get(*idx).ok().map(|plan| (*idx, plan.clone())))
            .collect();
        let balances = self
            .journal
            .balances
            .iter()
            .map(|account| (*account, self.ledger.balance_of(account)))
            .collect();
        let subscriptions = self
            .journal
            .subscriptions
            .iter()
            .filter_map(|account| self.subscriptions.get(account).cloned())
            .collect();
        let paid_amount = self.journal.paid_amount.then(|| self.ledger.paid_amount());
        let events = std::mem::take(&mut self.journal.events);
        self.journal.clear();

        Changeset {
            plans,
            balances,
            subscriptions,
            paid_amount,
            events,
        }
    }

    /// Run `op`; if it fails, every row, counter and event it touched is
    /// put back as it was.
    pub(crate) fn atomically<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let mark = self.journal.mark();
        let plans = self.plans.clone();
        let ledger = self.ledger.clone();
        let subscriptions = self.subscriptions.clone();
        let result = op(self);
        if result.is_err() {
            self.plans = plans;
            self.ledger = ledger;
            self.subscriptions = subscriptions;
            self.journal.rollback(mark);
        }
        result
    }

    pub(crate) fn emit(&mut self, event: BillingEvent) {
        tracing::info!(event = event.name(), detail = ?event, "Billing event");
        let now = self.now();
        self.journal.record(now, event);
    }

    pub(crate) fn touch_subscription(&mut self, account: AccountId) {
        self.journal.subscriptions.insert(account);
    }

    // =========================================================================
    // Plan Registry
    // =========================================================================

    /// Append a plan and return its index.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::InvalidPlan`] if `period` or `rate` is zero, or
    /// `charge_discount` exceeds 100.
    pub fn add_plan(
        &mut self,
        period: u64,
        trial: u64,
        rate: u64,
        charge_discount: u8,
    ) -> Result<PlanIdx> {
        self.atomically(|engine| {
            let plan_idx = engine.plans.add(period, trial, rate, charge_discount)?;
            engine.journal.plans.insert(plan_idx);
            tracing::info!(plan_idx, period, trial, rate, charge_discount, "Plan added");
            engine.emit(BillingEvent::PlanAdded { plan_idx });
            Ok(plan_idx)
        })
    }

    /// Close a plan to new subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::PlanNotFound`] or [`BillingError::PlanAlreadyClosed`].
    pub fn close_plan(&mut self, plan_idx: PlanIdx) -> Result<()> {
        self.atomically(|engine| {
            engine.plans.close(plan_idx)?;
            engine.journal.plans.insert(plan_idx);
            engine.emit(BillingEvent::PlanClosed { plan_idx });
            Ok(())
        })
    }

    /// Reopen a closed plan.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::PlanNotFound`] or [`BillingError::PlanNotClosed`].
    pub fn open_plan(&mut self, plan_idx: PlanIdx) -> Result<()> {
        self.atomically(|engine| {
            engine.plans.open(plan_idx)?;
            engine.journal.plans.insert(plan_idx);
            engine.emit(BillingEvent::PlanOpened { plan_idx });
            Ok(())
        })
    }

    /// Disable a plan now, freezing billing for its subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::PlanNotFound`] or [`BillingError::PlanAlreadyDisabled`].
    pub fn disable_plan(&mut self, plan_idx: PlanIdx) -> Result<()> {
        let now = self.now();
        self.atomically(|engine| {
            engine.plans.disable(plan_idx, now)?;
            engine.journal.plans.insert(plan_idx);
            engine.emit(BillingEvent::PlanDisabled { plan_idx });
            Ok(())
        })
    }

    /// Look up a plan.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::PlanNotFound`] for an unknown index.
    pub fn plan(&self, plan_idx: PlanIdx) -> Result<&Plan> {
        self.plans.get(plan_idx)
    }

    /// All plans in index order.
    #[must_use]
    pub fn plans(&self) -> &[Plan] {
        self.plans.plans()
    }

    /// Number of plans ever added.
    #[must_use]
    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    /// Custodial balance of `account`.
    #[must_use]
    pub fn balance_of(&self, account: &AccountId) -> u64 {
        self.ledger.balance_of(account)
    }

    /// Revenue charged but not yet withdrawn.
    #[must_use]
    pub fn paid_amount(&self) -> u64 {
        self.ledger.paid_amount()
    }

    pub(crate) fn increase_balance(&mut self, account: AccountId, amount: u64) -> Result<u64> {
        let balance = self.ledger.increase_balance(account, amount)?;
        self.journal.balances.insert(account);
        Ok(balance)
    }

    pub(crate) fn decrease_balance(&mut self, account: AccountId, amount: u64) -> Result<u64> {
        let balance = self.ledger.decrease_balance(account, amount)?;
        self.journal.balances.insert(account);
        Ok(balance)
    }

    pub(crate) fn pay(&mut self, amount: u64) {
        self.ledger.pay(amount);
        self.journal.paid_amount = true;
    }

    /// Receive value into custody and credit it, without subscription side effects.
    pub(crate) fn receive_deposit(&mut self, account: AccountId, amount: u64) -> Result<u64> {
        self.collect_incoming(account, amount)?;
        self.credit_deposit(account, amount)
    }

    /// Validate a deposit and pull the value in over the rail. Nothing is
    /// credited yet.
    pub(crate) fn collect_incoming(&mut self, account: AccountId, amount: u64) -> Result<()> {
        if amount == 0 {
            return Err(BillingError::InvalidAmount("deposit must be positive".into()));
        }
        self.ledger
            .balance_of(&account)
            .checked_add(amount)
            .ok_or_else(|| BillingError::InvalidAmount(format!("balance overflow for {account}")))?;
        self.transfer.receive(account, amount)?;
        Ok(())
    }

    /// Credit value already collected by [`Self::collect_incoming`].
    pub(crate) fn credit_deposit(&mut self, account: AccountId, amount: u64) -> Result<u64> {
        let balance = self.increase_balance(account, amount)?;
        tracing::info!(account = %account, amount, balance, "Deposit received");
        self.emit(BillingEvent::Deposited { account, amount });
        Ok(balance)
    }

    /// Debit `account` and send the value out; the debit is undone if the
    /// transfer fails.
    fn transfer_out(&mut self, account: AccountId, amount: u64) -> Result<u64> {
        let balance = self.decrease_balance(account, amount)?;
        if let Err(err) = self.transfer.send(account, amount) {
            tracing::warn!(account = %account, amount, error = %err, "Withdrawal transfer failed");
            self.increase_balance(account, amount)?;
            return Err(err.into());
        }
        Ok(balance)
    }

    /// Withdraw up to the available (unreserved) balance.
    ///
    /// # Errors
    ///
    /// - [`BillingError::InvalidAmount`] for a zero amount.
    /// - [`BillingError::InsufficientBalance`] carrying the available balance
    ///   and `amount` when `amount` exceeds it.
    /// - [`BillingError::Transfer`] if the value could not be sent.
    pub fn withdraw(&mut self, account: AccountId, amount: u64) -> Result<u64> {
        self.atomically(|engine| {
            if amount == 0 {
                return Err(BillingError::InvalidAmount("withdrawal must be positive".into()));
            }
            let available = engine.available_balance_of(&account);
            if amount > available {
                return Err(BillingError::InsufficientBalance {
                    balance: available,
                    required: amount,
                });
            }
            let balance = engine.transfer_out(account, amount)?;
            tracing::info!(account = %account, amount, balance, "Withdrawal sent");
            engine.emit(BillingEvent::Withdrawn { account, amount });
            Ok(balance)
        })
    }

    /// Sweep all collected revenue to `receiver`.
    ///
    /// # Errors
    ///
    /// - [`BillingError::NothingToWithdraw`] when no revenue is waiting.
    /// - [`BillingError::ZeroReceiver`] for the null address.
    /// - [`BillingError::Transfer`] if the value could not be sent; the
    ///   revenue stays collected.
    pub fn withdraw_payments(&mut self, receiver: AccountId) -> Result<u64> {
        self.atomically(|engine| {
            if engine.ledger.paid_amount() == 0 {
                return Err(BillingError::NothingToWithdraw);
            }
            if receiver.is_nil() {
                return Err(BillingError::ZeroReceiver);
            }
            let amount = engine.ledger.take_paid();
            if let Err(err) = engine.transfer.send(receiver, amount) {
                tracing::warn!(receiver = %receiver, amount, error = %err, "Revenue sweep failed");
                engine.ledger.restore_paid(amount);
                return Err(err.into());
            }
            engine.journal.paid_amount = true;
            tracing::info!(receiver = %receiver, amount, "Revenue withdrawn");
            engine.emit(BillingEvent::PaymentsWithdrawn { receiver, amount });
            Ok(amount)
        })
    }

    // =========================================================================
    // Charge primitive
    // =========================================================================

    /// Count `quote.periods` as charged on `account`'s subscription and, when
    /// collecting, move `quote.amount` from `payer` to collected revenue.
    pub(crate) fn charge_periods(
        &mut self,
        account: AccountId,
        payer: AccountId,
        quote: ChargeQuote,
        collect: Collect,
    ) -> Result<()> {
        let plan_idx = self
            .subscriptions
            .get(&account)
            .map(|sub| sub.plan_idx)
            .ok_or(BillingError::NotSubscribed { account })?;

        if collect == Collect::Payment {
            self.decrease_balance(payer, quote.amount)?;
            self.pay(quote.amount);
        }
        if let Some(sub) = self.subscriptions.get_mut(&account) {
            sub.charged_periods = sub.charged_periods.saturating_add(quote.periods);
        }
        self.touch_subscription(account);

        if quote.periods > 0 {
            let amount = if collect == Collect::Payment { quote.amount } else { 0 };
            tracing::info!(
                account = %account,
                payer = %payer,
                plan_idx,
                periods = quote.periods,
                amount,
                "Periods charged"
            );
            self.emit(BillingEvent::Charged {
                account,
                payer,
                plan_idx,
                periods: quote.periods,
                amount,
            });
        }
        Ok(())
    }
}
