//! Subscription records.

use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, PlanIdx};
use crate::math;
use crate::plan::Plan;

/// One account's subscription. Existence means "subscribed".
///
/// A record is never deleted; an account subscribes at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscribed account.
    pub account: AccountId,
    /// Plan index, fixed for the life of the record.
    pub plan_idx: PlanIdx,
    /// When the account first subscribed.
    pub created_at: u64,
    /// When period counting begins. Reset on restore.
    pub started_at: u64,
    /// Periods already paid since `started_at`.
    pub charged_periods: u64,
    /// When the holder cancelled, if they did.
    pub cancelled_at: Option<u64>,
}

impl Subscription {
    /// A fresh record that starts counting after the plan's trial.
    #[must_use]
    pub fn new(account: AccountId, plan_idx: PlanIdx, plan: &Plan, now: u64) -> Self {
        Self {
            account,
            plan_idx,
            created_at: now,
            started_at: now.saturating_add(plan.trial),
            charged_periods: 0,
            cancelled_at: None,
        }
    }

    /// Whether the holder cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }

    /// The timestamp that bounds billing, if any.
    #[must_use]
    pub fn interrupted_at(&self, plan: &Plan) -> Option<u64> {
        math::earliest_interruption(self.cancelled_at, plan.disabled_at)
    }

    /// Lifecycle state under `plan`.
    #[must_use]
    pub fn status(&self, plan: &Plan) -> SubscriptionStatus {
        if self.is_cancelled() {
            SubscriptionStatus::Cancelled
        } else if plan.is_disabled() {
            SubscriptionStatus::InterruptedByPlan
        } else {
            SubscriptionStatus::Active
        }
    }

    /// Periods begun by `until`, honoring interruptions.
    #[must_use]
    pub fn counted_periods(&self, plan: &Plan, until: u64) -> u64 {
        math::counted_periods(
            self.started_at,
            until,
            self.cancelled_at,
            plan.disabled_at,
            plan.period,
        )
    }

    /// Affordable unpaid periods at `now` given `balance`.
    #[must_use]
    pub fn debt_periods(&self, plan: &Plan, now: u64, balance: u64) -> u64 {
        math::debt_periods(
            self.started_at,
            now,
            self.cancelled_at,
            self.charged_periods,
            plan.disabled_at,
            plan.period,
            plan.rate,
            balance,
        )
    }

    /// Paid-through horizon assuming no interruption.
    #[must_use]
    pub fn funded_until(&self, plan: &Plan, balance: u64) -> u64 {
        math::funded_until(
            self.started_at,
            self.charged_periods,
            balance,
            plan.rate,
            plan.period,
        )
    }

    /// Restart counting at `now`, as if freshly subscribed without trial.
    pub fn reset(&mut self, now: u64) {
        self.started_at = now;
        self.charged_periods = 0;
        self.cancelled_at = None;
    }
}

/// Derived lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Billing runs.
    Active,
    /// The holder cancelled.
    Cancelled,
    /// The plan was disabled.
    InterruptedByPlan,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: u64 = 24 * 60 * 60;

    #[test]
    fn new_subscription_defers_by_trial() {
        let plan = Plan::new(7 * DAY, DAY, 100, 0).unwrap();
        let sub = Subscription::new(AccountId::generate(), 0, &plan, 1_000);
        assert_eq!(sub.created_at, 1_000);
        assert_eq!(sub.started_at, 1_000 + DAY);
        assert_eq!(sub.charged_periods, 0);
        assert_eq!(sub.status(&plan), SubscriptionStatus::Active);
    }

    #[test]
    fn cancellation_wins_over_plan_state() {
        let mut plan = Plan::new(DAY, 0, 1, 0).unwrap();
        let mut sub = Subscription::new(AccountId::generate(), 0, &plan, 0);
        plan.disabled_at = Some(50);
        assert_eq!(sub.status(&plan), SubscriptionStatus::InterruptedByPlan);
        sub.cancelled_at = Some(20);
        assert_eq!(sub.status(&plan), SubscriptionStatus::Cancelled);
        assert_eq!(sub.interrupted_at(&plan), Some(20));
    }

    #[test]
    fn reset_clears_progress() {
        let plan = Plan::new(DAY, DAY, 1, 0).unwrap();
        let mut sub = Subscription::new(AccountId::generate(), 0, &plan, 0);
        sub.charged_periods = 4;
        sub.cancelled_at = Some(3 * DAY);
        sub.reset(9 * DAY);
        assert_eq!(sub.started_at, 9 * DAY);
        assert_eq!(sub.charged_periods, 0);
        assert_eq!(sub.cancelled_at, None);
        assert_eq!(sub.created_at, 0);
    }
}
