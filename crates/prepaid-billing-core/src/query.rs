//! Read-only projections used to plan deposits and withdrawals.

use serde::{Deserialize, Serialize};

use crate::engine::BillingEngine;
use crate::error::Result;
use crate::ids::AccountId;
use crate::math::{self, ChargeQuote};
use crate::subscription::{Subscription, SubscriptionStatus};

/// Everything callers usually want to know about one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    /// The account.
    pub account: AccountId,
    /// Custodial balance.
    pub balance: u64,
    /// Balance earmarked for owed periods.
    pub reserved: u64,
    /// Balance that may be withdrawn.
    pub available: u64,
    /// Subscription projection, if subscribed.
    pub subscription: Option<SubscriptionView>,
}

/// A subscription record together with its derived timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionView {
    /// Stored record.
    #[serde(flatten)]
    pub record: Subscription,
    /// Derived lifecycle state.
    pub status: SubscriptionStatus,
    /// End of paid (or, if interrupted, owed) time.
    pub valid_until: u64,
    /// Whether `now < valid_until`.
    pub is_valid: bool,
    /// When the next charge becomes possible; `0` means now.
    pub next_charge_at: u64,
}

impl BillingEngine {
    /// The subscription record of `account`, if any.
    #[must_use]
    pub fn subscription_of(&self, account: &AccountId) -> Option<&Subscription> {
        self.subscriptions.get(account)
    }

    /// Periods owed and affordable right now.
    fn current_debt(&self, account: &AccountId) -> u64 {
        let Some(sub) = self.subscriptions.get(account) else {
            return 0;
        };
        let Ok(plan) = self.plans.get(sub.plan_idx) else {
            return 0;
        };
        sub.debt_periods(plan, self.now(), self.ledger.balance_of(account))
    }

    /// Balance that must stay put to cover already-owed periods, at the full
    /// rate.
    #[must_use]
    pub fn reserved_of(&self, account: &AccountId) -> u64 {
        let Some(rate) = self
            .subscriptions
            .get(account)
            .and_then(|sub| self.plans.get(sub.plan_idx).ok())
            .map(|plan| plan.rate)
        else {
            return 0;
        };
        self.current_debt(account).saturating_mul(rate)
    }

    /// Balance minus reserved, floored at zero.
    #[must_use]
    pub fn available_balance_of(&self, account: &AccountId) -> u64 {
        self.balance_of(account).saturating_sub(self.reserved_of(account))
    }

    /// End of the subscription's paid time.
    ///
    /// When interrupted, this is the end of the last period that began before
    /// the interruption; otherwise the horizon the balance funds.
    ///
    /// # Errors
    ///
    /// [`crate::BillingError::NotSubscribed`] without a subscription.
    pub fn valid_until(&self, account: &AccountId) -> Result<u64> {
        let sub = self.subscription(*account)?;
        let plan = self.plans.get(sub.plan_idx)?;
        Ok(match sub.interrupted_at(plan) {
            Some(interrupted_at) => {
                let periods = sub.counted_periods(plan, interrupted_at);
                sub.started_at
                    .saturating_add(periods.saturating_mul(plan.period))
            }
            None => sub.funded_until(plan, self.ledger.balance_of(account)),
        })
    }

    /// Whether the subscription currently grants access.
    #[must_use]
    pub fn is_valid(&self, account: &AccountId) -> bool {
        self.valid_until(account)
            .is_ok_and(|valid_until| self.now() < valid_until)
    }

    /// `0` if a charge is possible now, else the next period boundary after
    /// the charged ones.
    ///
    /// # Errors
    ///
    /// [`crate::BillingError::NotSubscribed`] without a subscription.
    pub fn next_available_charge_at(&self, account: &AccountId) -> Result<u64> {
        let sub = self.subscription(*account)?;
        let plan = self.plans.get(sub.plan_idx)?;
        if self.current_debt(account) > 0 {
            return Ok(0);
        }
        let periods = sub.charged_periods.saturating_add(1);
        Ok(sub
            .started_at
            .saturating_add(periods.saturating_mul(plan.period)))
    }

    /// What a charge would cost right now, as the subscriber (`as_self`) or
    /// as anyone else. Nothing is mutated.
    ///
    /// Unsubscribed accounts yield all zeros; a subscriber with nothing owed
    /// yields zero amount and periods with the applicable rate.
    #[must_use]
    pub fn preview_charge(&self, account: &AccountId, as_self: bool) -> ChargeQuote {
        let Some(plan) = self
            .subscriptions
            .get(account)
            .and_then(|sub| self.plans.get(sub.plan_idx).ok())
        else {
            return ChargeQuote::default();
        };
        let discount = if as_self { plan.charge_discount } else { 0 };
        math::charge_amount(self.current_debt(account), discount, plan.rate)
    }

    /// Balance, reservation and subscription timeline of `account`.
    #[must_use]
    pub fn account_summary(&self, account: &AccountId) -> AccountSummary {
        let balance = self.balance_of(account);
        let reserved = self.reserved_of(account);
        let subscription = self.subscriptions.get(account).and_then(|sub| {
            let plan = self.plans.get(sub.plan_idx).ok()?;
            let valid_until = self.valid_until(account).ok()?;
            Some(SubscriptionView {
                record: sub.clone(),
                status: sub.status(plan),
                valid_until,
                is_valid: self.now() < valid_until,
                next_charge_at: self.next_available_charge_at(account).ok()?,
            })
        });
        AccountSummary {
            account: *account,
            balance,
            reserved,
            available: balance.saturating_sub(reserved),
            subscription,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::error::BillingError;
    use crate::ids::PlanIdx;
    use crate::transfer::AcceptAllTransfer;

    const DAY: u64 = 24 * 60 * 60;
    const WEEK: u64 = 7 * DAY;

    fn weekly(trial: u64, rate: u64, discount: u8) -> (BillingEngine, Arc<ManualClock>, PlanIdx) {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let mut engine = BillingEngine::new(AcceptAllTransfer, clock.clone());
        let plan_idx = engine.add_plan(WEEK, trial, rate, discount).unwrap();
        (engine, clock, plan_idx)
    }

    fn subscribed(engine: &mut BillingEngine, plan_idx: PlanIdx, deposit: u64) -> AccountId {
        let account = AccountId::generate();
        engine.subscribe_with_deposit(account, plan_idx, deposit).unwrap();
        account
    }

    #[test]
    fn preview_prices_owed_periods() {
        let (mut engine, clock, plan_idx) = weekly(0, 100, 5);
        let account = subscribed(&mut engine, plan_idx, 1_000);
        assert_eq!(engine.balance_of(&account), 900);
        clock.advance(2 * WEEK);

        assert_eq!(
            engine.preview_charge(&account, false),
            ChargeQuote {
                amount: 200,
                periods: 2,
                adjusted_rate: 100
            }
        );
        assert_eq!(
            engine.preview_charge(&account, true),
            ChargeQuote {
                amount: 190,
                periods: 2,
                adjusted_rate: 95
            }
        );
        // previews never mutate
        assert_eq!(engine.balance_of(&account), 900);
    }

    #[test]
    fn preview_without_debt_or_subscription() {
        let (mut engine, _clock, plan_idx) = weekly(0, 100, 20);
        let account = subscribed(&mut engine, plan_idx, 1_000);

        assert_eq!(
            engine.preview_charge(&account, false),
            ChargeQuote {
                amount: 0,
                periods: 0,
                adjusted_rate: 100
            }
        );
        assert_eq!(
            engine.preview_charge(&account, true),
            ChargeQuote {
                amount: 0,
                periods: 0,
                adjusted_rate: 80
            }
        );
        assert_eq!(
            engine.preview_charge(&AccountId::generate(), true),
            ChargeQuote::default()
        );
    }

    #[test]
    fn disabled_plan_validity_ends_with_its_period() {
        let (mut engine, clock, plan_idx) = weekly(0, 100, 0);
        let start = engine.now();
        let account = subscribed(&mut engine, plan_idx, 1_000);

        clock.advance(WEEK + 3 * DAY);
        engine.disable_plan(plan_idx).unwrap();
        assert_eq!(engine.valid_until(&account), Ok(start + 2 * WEEK));

        clock.advance(30 * WEEK);
        assert_eq!(engine.valid_until(&account), Ok(start + 2 * WEEK));
        let receipt = engine.charge(account, account).unwrap();
        assert_eq!(receipt.quote.periods, 1);
        assert_eq!(engine.reserved_of(&account), 0);
        assert_eq!(
            engine.subscription_of(&account).unwrap().status(engine.plan(plan_idx).unwrap()),
            SubscriptionStatus::InterruptedByPlan
        );
    }

    #[test]
    fn withdrawal_limited_to_available_balance() {
        let (mut engine, clock, plan_idx) = weekly(0, 100, 0);
        let account = subscribed(&mut engine, plan_idx, 1_000);
        clock.advance(2 * WEEK);

        assert_eq!(engine.reserved_of(&account), 200);
        assert_eq!(engine.available_balance_of(&account), 700);
        assert_eq!(
            engine.withdraw(account, 701),
            Err(BillingError::InsufficientBalance {
                balance: 700,
                required: 701
            })
        );
        assert_eq!(engine.withdraw(account, 700), Ok(200));
        assert_eq!(engine.reserved_of(&account), 200);
        assert_eq!(engine.available_balance_of(&account), 0);
    }

    #[test]
    fn reserved_never_exceeds_balance() {
        let (mut engine, clock, plan_idx) = weekly(0, 100, 0);
        let account = subscribed(&mut engine, plan_idx, 350);
        clock.advance(20 * WEEK);

        assert_eq!(engine.reserved_of(&account), 200);
        assert_eq!(engine.available_balance_of(&account), 50);
    }

    #[test]
    fn next_charge_time() {
        let (mut engine, clock, plan_idx) = weekly(DAY, 100, 0);
        let start = engine.now();
        let account = subscribed(&mut engine, plan_idx, 1_000);
        assert_eq!(engine.next_available_charge_at(&account), Ok(start + DAY + WEEK));

        clock.advance(DAY);
        assert_eq!(engine.next_available_charge_at(&account), Ok(0));
        engine.charge(account, account).unwrap();
        assert_eq!(engine.next_available_charge_at(&account), Ok(start + DAY + 2 * WEEK));

        let stranger = AccountId::generate();
        assert_eq!(
            engine.next_available_charge_at(&stranger),
            Err(BillingError::NotSubscribed { account: stranger })
        );
        assert!(!engine.is_valid(&stranger));
    }

    #[test]
    fn summary_combines_balance_and_timeline() {
        let (mut engine, clock, plan_idx) = weekly(0, 100, 0);
        let start = engine.now();
        let account = subscribed(&mut engine, plan_idx, 300);
        clock.advance(WEEK);

        let summary = engine.account_summary(&account);
        assert_eq!(summary.balance, 200);
        assert_eq!(summary.reserved, 100);
        assert_eq!(summary.available, 100);
        let view = summary.subscription.unwrap();
        assert_eq!(view.status, SubscriptionStatus::Active);
        assert_eq!(view.valid_until, start + 3 * WEEK);
        assert!(view.is_valid);
        assert_eq!(view.next_charge_at, 0);

        let json = serde_json::to_value(engine.account_summary(&account)).unwrap();
        assert_eq!(json["subscription"]["charged_periods"], 1);
        assert_eq!(json["subscription"]["status"], "active");

        let empty = engine.account_summary(&AccountId::generate());
        assert_eq!(empty.balance, 0);
        assert!(empty.subscription.is_none());
    }
}
