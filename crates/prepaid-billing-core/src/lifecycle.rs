//! Subscription lifecycle: subscribe, charge, cancel, restore, deposit.
//!
//! ```text
//! NotSubscribed ──subscribe──▶ Active ──cancel──▶ Cancelled ──restore──▶ Active
//!                                 │
//!                                 └─plan disabled─▶ InterruptedByPlan
//! ```
//!
//! `NotSubscribed` is never re-entered: records are not deleted.

use serde::{Deserialize, Serialize};

use crate::engine::{BillingEngine, Collect};
use crate::error::{BillingError, Result};
use crate::events::BillingEvent;
use crate::ids::{AccountId, PlanIdx};
use crate::math::{self, ChargeQuote};
use crate::subscription::Subscription;

/// Which per-period rate a charge uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pricing {
    /// The plan rate.
    Full,
    /// The plan rate less the self-service discount.
    SelfService,
}

/// Outcome of charging one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeReceipt {
    /// Charged subscriber.
    pub account: AccountId,
    /// Plan index.
    pub plan_idx: PlanIdx,
    /// Amount, periods and effective rate.
    pub quote: ChargeQuote,
}

impl BillingEngine {
    /// Subscribe `account` to a plan, paying from its existing balance.
    ///
    /// # Errors
    ///
    /// - [`BillingError::PlanNotFound`] / [`BillingError::PlanUnavailable`].
    /// - [`BillingError::AlreadySubscribed`] if any record exists for the account.
    /// - [`BillingError::InsufficientBalance`] if the available balance cannot
    ///   cover one period, trial or not.
    pub fn subscribe(&mut self, account: AccountId, plan_idx: PlanIdx) -> Result<()> {
        self.subscribe_with_deposit(account, plan_idx, 0)
    }

    /// Deposit `deposit` and subscribe in one step.
    ///
    /// Preconditions are checked against the balance plus the deposit before
    /// any value is received, so a rejected call moves nothing.
    ///
    /// # Errors
    ///
    /// As [`BillingEngine::subscribe`], plus [`BillingError::Transfer`] if the
    /// deposit could not be collected.
    pub fn subscribe_with_deposit(
        &mut self,
        account: AccountId,
        plan_idx: PlanIdx,
        deposit: u64,
    ) -> Result<()> {
        let now = self.now();
        self.atomically(|engine| {
            let plan = engine.plans.available(plan_idx)?.clone();
            if engine.subscriptions.contains_key(&account) {
                return Err(BillingError::AlreadySubscribed { account });
            }
            let funds = engine
                .available_balance_of(&account)
                .checked_add(deposit)
                .ok_or_else(|| BillingError::InvalidAmount("deposit overflows balance".into()))?;
            if funds < plan.rate {
                return Err(BillingError::InsufficientBalance {
                    balance: funds,
                    required: plan.rate,
                });
            }

            if deposit > 0 {
                engine.receive_deposit(account, deposit)?;
            }

            let sub = Subscription::new(account, plan_idx, &plan, now);
            tracing::info!(
                account = %account,
                plan_idx,
                started_at = sub.started_at,
                "Subscription created"
            );
            engine.subscriptions.insert(account, sub);
            engine.touch_subscription(account);
            engine.emit(BillingEvent::Subscribed { account, plan_idx });

            if plan.trial == 0 {
                engine.settle_debt(account, Pricing::Full)?;
            }
            Ok(())
        })
    }

    /// Charge every owed, affordable period of `account`'s subscription.
    ///
    /// The plan's discount applies only when `caller` is the subscriber.
    ///
    /// # Errors
    ///
    /// [`BillingError::NotSubscribed`], or [`BillingError::NothingToCharge`]
    /// when no period is owed or affordable.
    pub fn charge(&mut self, caller: AccountId, account: AccountId) -> Result<ChargeReceipt> {
        let pricing = if caller == account {
            Pricing::SelfService
        } else {
            Pricing::Full
        };
        self.atomically(|engine| {
            let receipt = engine.settle_debt(account, pricing)?;
            if receipt.quote.periods == 0 {
                return Err(BillingError::NothingToCharge);
            }
            Ok(receipt)
        })
    }

    /// Administrative charge of many accounts at the full rate.
    ///
    /// Accounts without a subscription or without debt are skipped.
    ///
    /// # Errors
    ///
    /// [`BillingError::NothingToCharge`] if no account owed anything.
    pub fn charge_many(&mut self, accounts: &[AccountId]) -> Result<Vec<ChargeReceipt>> {
        self.atomically(|engine| {
            let mut receipts = Vec::new();
            for account in accounts {
                if !engine.subscriptions.contains_key(account) {
                    continue;
                }
                let receipt = engine.settle_debt(*account, Pricing::Full)?;
                if receipt.quote.periods > 0 {
                    receipts.push(receipt);
                }
            }
            if receipts.is_empty() {
                return Err(BillingError::NothingToCharge);
            }
            tracing::info!(requested = accounts.len(), charged = receipts.len(), "Batch charge done");
            Ok(receipts)
        })
    }

    /// Cancel `account`'s subscription after charging what it owes.
    ///
    /// # Errors
    ///
    /// [`BillingError::NotSubscribed`] or [`BillingError::AlreadyCancelled`].
    pub fn cancel(&mut self, account: AccountId) -> Result<()> {
        let now = self.now();
        self.atomically(|engine| {
            let sub = engine.subscription(account)?;
            if sub.is_cancelled() {
                return Err(BillingError::AlreadyCancelled { account });
            }
            let plan_idx = sub.plan_idx;

            engine.settle_debt(account, Pricing::SelfService)?;
            if let Some(sub) = engine.subscriptions.get_mut(&account) {
                sub.cancelled_at = Some(now);
            }
            engine.touch_subscription(account);
            tracing::info!(account = %account, plan_idx, "Subscription cancelled");
            engine.emit(BillingEvent::Cancelled { account, plan_idx });
            Ok(())
        })
    }

    /// Restart a cancelled subscription from now and charge its first period.
    ///
    /// # Errors
    ///
    /// - [`BillingError::NotSubscribed`] / [`BillingError::NotCancelled`].
    /// - [`BillingError::PlanUnavailable`] if the plan was closed or disabled.
    /// - [`BillingError::InsufficientBalance`] if the available balance cannot
    ///   cover one period.
    pub fn restore(&mut self, account: AccountId) -> Result<()> {
        let now = self.now();
        self.atomically(|engine| {
            let sub = engine.subscription(account)?;
            if !sub.is_cancelled() {
                return Err(BillingError::NotCancelled { account });
            }
            let plan_idx = sub.plan_idx;
            let rate = engine.plans.available(plan_idx)?.rate;
            let available = engine.available_balance_of(&account);
            if available < rate {
                return Err(BillingError::InsufficientBalance {
                    balance: available,
                    required: rate,
                });
            }
            engine.restart(account, plan_idx, now)
        })
    }

    /// Deposit into custody.
    ///
    /// Outstanding debt is charged first at the self-service rate (skipped for
    /// cancelled subscriptions). A subscription that lapsed for lack of funds
    /// on an enabled plan restarts from now once the deposit covers a period.
    ///
    /// # Errors
    ///
    /// [`BillingError::InvalidAmount`] for zero or overflowing amounts,
    /// [`BillingError::Transfer`] if the value could not be collected.
    pub fn deposit(&mut self, account: AccountId, amount: u64) -> Result<u64> {
        let now = self.now();
        self.atomically(|engine| {
            // value must be in hand before any debt is drained
            engine.collect_incoming(account, amount)?;

            let live = engine
                .subscriptions
                .get(&account)
                .filter(|sub| !sub.is_cancelled())
                .map(|sub| sub.plan_idx);
            if live.is_some() {
                engine.settle_debt(account, Pricing::SelfService)?;
            }
            let lapsed = live.is_some_and(|_| engine.has_lapsed(account, now));

            let balance = engine.credit_deposit(account, amount)?;

            if let Some(plan_idx) = live {
                let rate = engine.plans.get(plan_idx)?.rate;
                if lapsed && balance >= rate {
                    tracing::info!(account = %account, plan_idx, "Lapsed subscription funded again");
                    engine.restart(account, plan_idx, now)?;
                }
            }
            Ok(engine.balance_of(&account))
        })
    }

    /// Mark `periods` as charged without moving funds.
    ///
    /// # Errors
    ///
    /// [`BillingError::InvalidAmount`] for zero periods,
    /// [`BillingError::NotSubscribed`] without a subscription.
    pub fn grant_periods(&mut self, account: AccountId, periods: u64) -> Result<ChargeReceipt> {
        self.atomically(|engine| {
            if periods == 0 {
                return Err(BillingError::InvalidAmount("periods must be positive".into()));
            }
            let plan_idx = engine.subscription(account)?.plan_idx;
            let rate = engine.plans.get(plan_idx)?.rate;
            let quote = ChargeQuote {
                amount: 0,
                periods,
                adjusted_rate: rate,
            };
            engine.charge_periods(account, account, quote, Collect::Nothing)?;
            Ok(ChargeReceipt {
                account,
                plan_idx,
                quote,
            })
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    pub(crate) fn subscription(&self, account: AccountId) -> Result<&Subscription> {
        self.subscriptions
            .get(&account)
            .ok_or(BillingError::NotSubscribed { account })
    }

    /// Charge every owed, affordable period; a zero quote means nothing was due.
    pub(crate) fn settle_debt(&mut self, account: AccountId, pricing: Pricing) -> Result<ChargeReceipt> {
        let now = self.now();
        let sub = self.subscription(account)?;
        let plan_idx = sub.plan_idx;
        let plan = self.plans.get(plan_idx)?;
        let debt = sub.debt_periods(plan, now, self.ledger.balance_of(&account));
        let discount = match pricing {
            Pricing::Full => 0,
            Pricing::SelfService => plan.charge_discount,
        };
        let quote = math::charge_amount(debt, discount, plan.rate);
        if debt > 0 {
            self.charge_periods(account, account, quote, Collect::Payment)?;
        }
        Ok(ChargeReceipt {
            account,
            plan_idx,
            quote,
        })
    }

    /// Whether a live subscription has run out of paid time at `now`.
    fn has_lapsed(&self, account: AccountId, now: u64) -> bool {
        let Some(sub) = self.subscriptions.get(&account) else {
            return false;
        };
        let Ok(plan) = self.plans.get(sub.plan_idx) else {
            return false;
        };
        !sub.is_cancelled()
            && !plan.is_disabled()
            && sub.funded_until(plan, self.ledger.balance_of(&account)) <= now
    }

    /// Reset counting to `now` and charge the period that begins there.
    fn restart(&mut self, account: AccountId, plan_idx: PlanIdx, now: u64) -> Result<()> {
        if let Some(sub) = self.subscriptions.get_mut(&account) {
            sub.reset(now);
        }
        self.touch_subscription(account);
        tracing::info!(account = %account, plan_idx, "Subscription restored");
        self.emit(BillingEvent::Restored { account, plan_idx });
        self.settle_debt(account, Pricing::Full)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::subscription::SubscriptionStatus;
    use crate::transfer::{AcceptAllTransfer, TransferDirection, TransferError, ValueTransfer};

    const PERIOD: u64 = 10;

    fn setup(trial: u64, rate: u64, discount: u8) -> (BillingEngine, Arc<ManualClock>, PlanIdx) {
        let clock = Arc::new(ManualClock::new(0));
        let mut engine = BillingEngine::new(AcceptAllTransfer, clock.clone());
        let plan_idx = engine.add_plan(PERIOD, trial, rate, discount).unwrap();
        (engine, clock, plan_idx)
    }

    fn funded_subscriber(engine: &mut BillingEngine, plan_idx: PlanIdx, amount: u64) -> AccountId {
        let account = AccountId::generate();
        engine.deposit(account, amount).unwrap();
        engine.subscribe(account, plan_idx).unwrap();
        account
    }

    #[test]
    fn subscribe_charges_first_period_at_full_rate() {
        let (mut engine, _clock, plan_idx) = setup(0, 100, 5);
        let account = funded_subscriber(&mut engine, plan_idx, 1_000);

        assert_eq!(engine.balance_of(&account), 900);
        assert_eq!(engine.paid_amount(), 100);
        let sub = engine.subscription_of(&account).unwrap();
        assert_eq!(sub.charged_periods, 1);
        assert_eq!(sub.started_at, 0);
    }

    #[test]
    fn subscribe_preconditions() {
        let (mut engine, _clock, plan_idx) = setup(0, 100, 0);
        let poor = AccountId::generate();
        engine.deposit(poor, 99).unwrap();
        assert_eq!(
            engine.subscribe(poor, plan_idx),
            Err(BillingError::InsufficientBalance {
                balance: 99,
                required: 100
            })
        );
        assert_eq!(engine.subscribe(poor, 7), Err(BillingError::PlanNotFound { plan_idx: 7 }));

        let account = funded_subscriber(&mut engine, plan_idx, 500);
        assert_eq!(
            engine.subscribe(account, plan_idx),
            Err(BillingError::AlreadySubscribed { account })
        );

        engine.close_plan(plan_idx).unwrap();
        engine.deposit(poor, 1).unwrap();
        assert_eq!(
            engine.subscribe(poor, plan_idx),
            Err(BillingError::PlanUnavailable { plan_idx })
        );
    }

    #[test]
    fn rejected_subscribe_leaves_no_trace() {
        let (mut engine, _clock, plan_idx) = setup(0, 100, 0);
        let account = AccountId::generate();
        engine.take_changes();

        assert!(engine.subscribe_with_deposit(account, plan_idx, 50).is_err());
        assert_eq!(engine.balance_of(&account), 0);
        assert!(engine.subscription_of(&account).is_none());
        assert!(engine.take_changes().is_empty());
    }

    #[test]
    fn subscribe_with_deposit_counts_the_deposit() {
        let (mut engine, _clock, plan_idx) = setup(0, 100, 0);
        let account = AccountId::generate();
        engine.subscribe_with_deposit(account, plan_idx, 100).unwrap();

        assert_eq!(engine.balance_of(&account), 0);
        assert_eq!(engine.paid_amount(), 100);
        let names: Vec<_> = engine
            .take_changes()
            .events
            .iter()
            .map(|record| record.event.name())
            .collect();
        assert_eq!(names, ["plan_added", "deposited", "subscribed", "charged"]);
    }

    #[test]
    fn trial_defers_counting() {
        let (mut engine, clock, plan_idx) = setup(PERIOD / 2, 100, 0);
        let account = funded_subscriber(&mut engine, plan_idx, 100);

        let sub = engine.subscription_of(&account).unwrap();
        assert_eq!(sub.started_at, PERIOD / 2);
        assert_eq!(sub.charged_periods, 0);
        assert_eq!(engine.balance_of(&account), 100);

        engine.withdraw(account, 100).unwrap();
        for now in 0..PERIOD / 2 {
            clock.set(now);
            assert!(engine.is_valid(&account), "valid during trial at {now}");
        }
        clock.set(PERIOD / 2);
        assert!(!engine.is_valid(&account));
    }

    #[test]
    fn self_charge_gets_discount() {
        let (mut engine, clock, plan_idx) = setup(0, 100, 5);
        let account = funded_subscriber(&mut engine, plan_idx, 1_000);
        clock.advance(2 * PERIOD);

        let preview = engine.preview_charge(&account, true);
        let receipt = engine.charge(account, account).unwrap();
        assert_eq!(receipt.quote, preview);
        assert_eq!(receipt.quote.amount, 190);
        assert_eq!(engine.balance_of(&account), 710);
        assert_eq!(engine.subscription_of(&account).unwrap().charged_periods, 3);
        assert_eq!(engine.charge(account, account), Err(BillingError::NothingToCharge));
    }

    #[test]
    fn third_party_charge_pays_full_rate() {
        let (mut engine, clock, plan_idx) = setup(0, 100, 50);
        let account = funded_subscriber(&mut engine, plan_idx, 1_000);
        clock.advance(PERIOD);

        let receipt = engine.charge(AccountId::generate(), account).unwrap();
        assert_eq!(receipt.quote.amount, 100);
        assert_eq!(receipt.quote.adjusted_rate, 100);

        let stranger = AccountId::generate();
        assert_eq!(
            engine.charge(stranger, stranger),
            Err(BillingError::NotSubscribed { account: stranger })
        );
    }

    #[test]
    fn charge_stops_at_balance() {
        let (mut engine, clock, plan_idx) = setup(0, 100, 0);
        let account = funded_subscriber(&mut engine, plan_idx, 350);
        clock.advance(10 * PERIOD);

        let receipt = engine.charge(account, account).unwrap();
        assert_eq!(receipt.quote.periods, 2);
        assert_eq!(engine.balance_of(&account), 50);
        assert!(!engine.is_valid(&account));
    }

    #[test]
    fn charge_many_skips_accounts_without_debt() {
        let (mut engine, clock, plan_idx) = setup(0, 100, 0);
        let owing = funded_subscriber(&mut engine, plan_idx, 500);
        let broke = funded_subscriber(&mut engine, plan_idx, 100);
        let outsider = AccountId::generate();
        clock.advance(PERIOD);

        let receipts = engine.charge_many(&[owing, broke, outsider]).unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].account, owing);
        assert_eq!(engine.balance_of(&owing), 300);

        assert_eq!(
            engine.charge_many(&[owing, broke, outsider]),
            Err(BillingError::NothingToCharge)
        );
    }

    #[test]
    fn cancel_settles_and_freezes() {
        let (mut engine, clock, plan_idx) = setup(0, 100, 10);
        let account = funded_subscriber(&mut engine, plan_idx, 1_000);
        clock.set(2 * PERIOD + 5);

        engine.cancel(account).unwrap();
        assert_eq!(engine.balance_of(&account), 720);
        let sub = engine.subscription_of(&account).unwrap();
        assert_eq!(sub.cancelled_at, Some(2 * PERIOD + 5));
        assert_eq!(sub.charged_periods, 3);
        assert_eq!(engine.valid_until(&account), Ok(3 * PERIOD));
        assert!(engine.is_valid(&account));

        clock.set(100 * PERIOD);
        assert!(!engine.is_valid(&account));
        assert_eq!(engine.reserved_of(&account), 0);
        assert_eq!(engine.charge(account, account), Err(BillingError::NothingToCharge));
        assert_eq!(engine.cancel(account), Err(BillingError::AlreadyCancelled { account }));
        assert_eq!(
            engine.subscribe(account, plan_idx),
            Err(BillingError::AlreadySubscribed { account })
        );
    }

    #[test]
    fn restore_restarts_from_now() {
        let (mut engine, clock, plan_idx) = setup(PERIOD, 100, 10);
        let account = funded_subscriber(&mut engine, plan_idx, 500);
        assert_eq!(engine.restore(account), Err(BillingError::NotCancelled { account }));

        engine.cancel(account).unwrap();
        clock.set(40);
        engine.restore(account).unwrap();

        let sub = engine.subscription_of(&account).unwrap();
        assert_eq!(sub.started_at, 40);
        assert_eq!(sub.charged_periods, 1);
        assert_eq!(sub.cancelled_at, None);
        assert_eq!(engine.balance_of(&account), 400);
        assert_eq!(
            sub.status(engine.plan(plan_idx).unwrap()),
            SubscriptionStatus::Active
        );
    }

    #[test]
    fn restore_preconditions() {
        let (mut engine, _clock, plan_idx) = setup(0, 100, 0);
        let stranger = AccountId::generate();
        assert_eq!(
            engine.restore(stranger),
            Err(BillingError::NotSubscribed { account: stranger })
        );

        let account = funded_subscriber(&mut engine, plan_idx, 150);
        engine.cancel(account).unwrap();
        assert_eq!(
            engine.restore(account),
            Err(BillingError::InsufficientBalance {
                balance: 50,
                required: 100
            })
        );

        engine.deposit(account, 50).unwrap();
        engine.disable_plan(plan_idx).unwrap();
        assert_eq!(engine.restore(account), Err(BillingError::PlanUnavailable { plan_idx }));
    }

    #[test]
    fn deposit_settles_debt_at_self_service_rate() {
        let (mut engine, clock, plan_idx) = setup(0, 100, 10);
        let account = funded_subscriber(&mut engine, plan_idx, 1_000);
        clock.set(PERIOD);

        assert_eq!(engine.deposit(account, 50), Ok(860));
        assert_eq!(engine.subscription_of(&account).unwrap().charged_periods, 2);
    }

    #[test]
    fn deposit_revives_lapsed_subscription() {
        let (mut engine, clock, plan_idx) = setup(0, 100, 0);
        let account = funded_subscriber(&mut engine, plan_idx, 100);
        clock.set(3 * PERIOD + 5);
        assert!(!engine.is_valid(&account));
        engine.take_changes();

        assert_eq!(engine.deposit(account, 150), Ok(50));
        let sub = engine.subscription_of(&account).unwrap();
        assert_eq!(sub.started_at, 3 * PERIOD + 5);
        assert_eq!(sub.charged_periods, 1);
        assert!(engine.is_valid(&account));

        let names: Vec<_> = engine
            .take_changes()
            .events
            .iter()
            .map(|record| record.event.name())
            .collect();
        assert_eq!(names, ["deposited", "restored", "charged"]);
    }

    #[test]
    fn deposit_below_rate_does_not_revive() {
        let (mut engine, clock, plan_idx) = setup(0, 100, 0);
        let account = funded_subscriber(&mut engine, plan_idx, 100);
        clock.set(3 * PERIOD);

        assert_eq!(engine.deposit(account, 99), Ok(99));
        assert_eq!(engine.subscription_of(&account).unwrap().started_at, 0);
    }

    #[test]
    fn deposit_never_revives_cancelled_or_disabled() {
        let (mut engine, clock, plan_idx) = setup(0, 100, 0);
        let cancelled = funded_subscriber(&mut engine, plan_idx, 100);
        let frozen = funded_subscriber(&mut engine, plan_idx, 100);
        engine.cancel(cancelled).unwrap();
        clock.set(PERIOD / 2);
        engine.disable_plan(plan_idx).unwrap();
        clock.set(5 * PERIOD);

        engine.deposit(cancelled, 500).unwrap();
        engine.deposit(frozen, 500).unwrap();
        for account in [cancelled, frozen] {
            let sub = engine.subscription_of(&account).unwrap();
            assert_eq!(sub.started_at, 0);
            assert_eq!(sub.charged_periods, 1);
            assert_eq!(engine.balance_of(&account), 500);
        }
    }

    #[test]
    fn deposit_rejects_zero() {
        let (mut engine, _clock, _plan_idx) = setup(0, 100, 0);
        assert!(matches!(
            engine.deposit(AccountId::generate(), 0),
            Err(BillingError::InvalidAmount(_))
        ));
    }

    #[test]
    fn grant_advances_counter_without_funds() {
        let (mut engine, clock, plan_idx) = setup(0, 100, 0);
        let account = funded_subscriber(&mut engine, plan_idx, 100);
        engine.take_changes();

        let receipt = engine.grant_periods(account, 3).unwrap();
        assert_eq!(receipt.quote.periods, 3);
        assert_eq!(engine.balance_of(&account), 0);
        assert_eq!(engine.paid_amount(), 100);
        assert_eq!(engine.valid_until(&account), Ok(4 * PERIOD));

        clock.set(3 * PERIOD);
        assert!(engine.is_valid(&account));
        let events = engine.take_changes().events;
        assert_eq!(
            events[0].event,
            BillingEvent::Charged {
                account,
                payer: account,
                plan_idx,
                periods: 3,
                amount: 0
            }
        );
    }

    #[test]
    fn value_is_conserved() {
        let (mut engine, clock, plan_idx) = setup(PERIOD, 70, 15);
        let accounts: Vec<_> = (0..4).map(|_| AccountId::generate()).collect();
        let mut deposited = 0;
        let mut withdrawn = 0;

        for (account, amount) in accounts.iter().zip([100, 200, 300, 400]) {
            engine.subscribe_with_deposit(*account, plan_idx, amount).unwrap();
            deposited += amount;
        }
        for step in 1..30u64 {
            clock.set(step * 7);
            let account = accounts[usize::try_from(step % 4).unwrap()];
            match step % 5 {
                0 => {
                    engine.deposit(account, 33).unwrap();
                    deposited += 33;
                }
                1 => {
                    let _ = engine.charge(account, account);
                }
                2 => {
                    let _ = engine.charge_many(&accounts);
                }
                3 => {
                    let available = engine.available_balance_of(&account);
                    if available > 0 {
                        engine.withdraw(account, available).unwrap();
                        withdrawn += available;
                    }
                }
                _ => {
                    if let Ok(amount) = engine.withdraw_payments(AccountId::generate()) {
                        withdrawn += amount;
                    }
                }
            }
            let held: u64 = accounts.iter().map(|a| engine.balance_of(a)).sum();
            assert_eq!(held + engine.paid_amount() + withdrawn, deposited);
        }
    }

    /// Rail that refuses incoming transfers.
    struct RefuseIncoming;

    impl ValueTransfer for RefuseIncoming {
        fn receive(&mut self, from: AccountId, amount: u64) -> std::result::Result<(), TransferError> {
            Err(TransferError {
                direction: TransferDirection::Incoming,
                account: from,
                amount,
                reason: "rail offline".into(),
            })
        }

        fn send(&mut self, _to: AccountId, _amount: u64) -> std::result::Result<(), TransferError> {
            Ok(())
        }
    }

    fn refusing_deposits(engine: &BillingEngine, clock: Arc<ManualClock>) -> BillingEngine {
        BillingEngine::from_state(engine.state(), RefuseIncoming, clock)
    }

    #[test]
    fn refused_deposit_leaves_debt_unpaid() {
        let (mut engine, clock, plan_idx) = setup(0, 100, 0);
        let account = funded_subscriber(&mut engine, plan_idx, 1_000);
        clock.set(2 * PERIOD + PERIOD / 2);
        let mut engine = refusing_deposits(&engine, clock);
        let before = engine.state();

        let err = engine.deposit(account, 50).unwrap_err();

        assert!(matches!(err, BillingError::Transfer(_)));
        assert_eq!(engine.balance_of(&account), 900);
        assert_eq!(engine.paid_amount(), 100);
        assert_eq!(engine.subscription_of(&account).unwrap().charged_periods, 1);
        assert_eq!(engine.state(), before);
        assert!(engine.take_changes().is_empty());

        // the debt is still there to be charged normally
        assert_eq!(engine.charge(account, account).unwrap().quote.periods, 2);
    }

    #[test]
    fn refused_subscribe_deposit_creates_nothing() {
        let (engine, clock, plan_idx) = setup(0, 100, 0);
        let mut engine = refusing_deposits(&engine, clock);
        let account = AccountId::generate();

        let err = engine
            .subscribe_with_deposit(account, plan_idx, 500)
            .unwrap_err();

        assert!(matches!(err, BillingError::Transfer(_)));
        assert!(engine.subscription_of(&account).is_none());
        assert_eq!(engine.balance_of(&account), 0);
        assert_eq!(engine.paid_amount(), 0);
        assert!(engine.take_changes().is_empty());
    }
}
