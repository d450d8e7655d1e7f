//! Plan registry.
//!
//! Plans are append-only. Once created only two things can change: the
//! `closed` flag, which may be toggled, and `disabled_at`, which is set once
//! and never cleared.

use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};
use crate::ids::PlanIdx;
use crate::math::MAX_DISCOUNT_PERCENT;

/// A billing plan definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Length of one billing period in seconds.
    pub period: u64,
    /// Delay before the first period starts, in seconds.
    pub trial: u64,
    /// Cost per period in base units.
    pub rate: u64,
    /// Discount in percent applied when a subscriber charges itself.
    pub charge_discount: u8,
    /// Closed plans accept no new subscribers.
    pub closed: bool,
    /// When the plan was disabled. Freezes billing for existing subscribers.
    pub disabled_at: Option<u64>,
}

impl Plan {
    /// Validate parameters and build an open, enabled plan.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::InvalidPlan`] if `period` or `rate` is zero or
    /// `charge_discount` exceeds 100.
    pub fn new(period: u64, trial: u64, rate: u64, charge_discount: u8) -> Result<Self> {
        if period == 0 {
            return Err(BillingError::InvalidPlan("period cannot be zero"));
        }
        if rate == 0 {
            return Err(BillingError::InvalidPlan("rate cannot be zero"));
        }
        if charge_discount > MAX_DISCOUNT_PERCENT {
            return Err(BillingError::InvalidPlan(
                "charge discount must be in range [0;100]",
            ));
        }
        Ok(Self {
            period,
            trial,
            rate,
            charge_discount,
            closed: false,
            disabled_at: None,
        })
    }

    /// Whether the plan has been disabled.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.disabled_at.is_some()
    }

    /// Whether new subscriptions (and restores) are accepted.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        !self.closed && !self.is_disabled()
    }
}

/// Append-only list of plans, addressed by index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRegistry {
    plans: Vec<Plan>,
}

impl PlanRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted plans, in index order.
    #[must_use]
    pub fn from_plans(plans: Vec<Plan>) -> Self {
        Self { plans }
    }

    /// Number of plans ever added.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// Whether no plan was ever added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// All plans in index order.
    #[must_use]
    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    /// Look up a plan.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::PlanNotFound`] for an unknown index.
    pub fn get(&self, plan_idx: PlanIdx) -> Result<&Plan> {
        usize::try_from(plan_idx)
            .ok()
            .and_then(|idx| self.plans.get(idx))
            .ok_or(BillingError::PlanNotFound { plan_idx })
    }

    fn get_mut(&mut self, plan_idx: PlanIdx) -> Result<&mut Plan> {
        usize::try_from(plan_idx)
            .ok()
            .and_then(|idx| self.plans.get_mut(idx))
            .ok_or(BillingError::PlanNotFound { plan_idx })
    }

    /// Look up a plan that accepts new subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::PlanNotFound`] or [`BillingError::PlanUnavailable`].
    pub fn available(&self, plan_idx: PlanIdx) -> Result<&Plan> {
        let plan = self.get(plan_idx)?;
        if !plan.is_available() {
            return Err(BillingError::PlanUnavailable { plan_idx });
        }
        Ok(plan)
    }

    /// Validate and append a plan, returning its index.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::InvalidPlan`] for bad parameters.
    pub fn add(&mut self, period: u64, trial: u64, rate: u64, charge_discount: u8) -> Result<PlanIdx> {
        let plan = Plan::new(period, trial, rate, charge_discount)?;
        let plan_idx = PlanIdx::try_from(self.plans.len())
            .map_err(|_| BillingError::InvalidPlan("plan registry is full"))?;
        self.plans.push(plan);
        Ok(plan_idx)
    }

    /// Stop accepting new subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::PlanAlreadyClosed`] if already closed.
    pub fn close(&mut self, plan_idx: PlanIdx) -> Result<()> {
        let plan = self.get_mut(plan_idx)?;
        if plan.closed {
            return Err(BillingError::PlanAlreadyClosed { plan_idx });
        }
        plan.closed = true;
        Ok(())
    }

    /// Accept new subscribers again.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::PlanNotClosed`] if the plan is open.
    pub fn open(&mut self, plan_idx: PlanIdx) -> Result<()> {
        let plan = self.get_mut(plan_idx)?;
        if !plan.closed {
            return Err(BillingError::PlanNotClosed { plan_idx });
        }
        plan.closed = false;
        Ok(())
    }

    /// Disable the plan at `now`. Irreversible.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::PlanAlreadyDisabled`] on a second call.
    pub fn disable(&mut self, plan_idx: PlanIdx, now: u64) -> Result<()> {
        let plan = self.get_mut(plan_idx)?;
        if plan.is_disabled() {
            return Err(BillingError::PlanAlreadyDisabled { plan_idx });
        }
        plan.disabled_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: u64 = 24 * 60 * 60;

    #[test]
    fn add_plan_starts_open_and_enabled() {
        let mut registry = PlanRegistry::new();
        let idx = registry.add(30 * DAY, DAY, 100, 5).unwrap();
        assert_eq!(idx, 0);

        let plan = registry.get(0).unwrap();
        assert_eq!(plan.period, 30 * DAY);
        assert_eq!(plan.trial, DAY);
        assert_eq!(plan.rate, 100);
        assert_eq!(plan.charge_discount, 5);
        assert!(!plan.closed);
        assert_eq!(plan.disabled_at, None);
        assert_eq!(registry.add(DAY, 0, 1, 0).unwrap(), 1);
    }

    #[test]
    fn add_plan_rejects_bad_parameters() {
        let mut registry = PlanRegistry::new();
        assert_eq!(
            registry.add(0, 100, 100, 5).unwrap_err().to_string(),
            "period cannot be zero"
        );
        assert_eq!(
            registry.add(30 * DAY, 100, 0, 5).unwrap_err().to_string(),
            "rate cannot be zero"
        );
        assert_eq!(
            registry.add(30 * DAY, 100, 100, 101).unwrap_err().to_string(),
            "charge discount must be in range [0;100]"
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn close_and_open_toggle() {
        let mut registry = PlanRegistry::new();
        registry.add(DAY, 0, 10, 0).unwrap();

        assert!(matches!(registry.open(0), Err(BillingError::PlanNotClosed { plan_idx: 0 })));
        registry.close(0).unwrap();
        assert!(matches!(registry.close(0), Err(BillingError::PlanAlreadyClosed { .. })));
        assert!(matches!(registry.available(0), Err(BillingError::PlanUnavailable { .. })));
        registry.open(0).unwrap();
        assert!(registry.available(0).is_ok());
    }

    #[test]
    fn disable_is_one_way() {
        let mut registry = PlanRegistry::new();
        registry.add(DAY, 0, 10, 0).unwrap();
        registry.disable(0, 500).unwrap();
        assert_eq!(registry.get(0).unwrap().disabled_at, Some(500));
        assert!(matches!(
            registry.disable(0, 900),
            Err(BillingError::PlanAlreadyDisabled { plan_idx: 0 })
        ));
        assert_eq!(registry.get(0).unwrap().disabled_at, Some(500));
        assert!(matches!(registry.available(0), Err(BillingError::PlanUnavailable { .. })));
    }

    #[test]
    fn unknown_plan_is_not_found() {
        let registry = PlanRegistry::new();
        assert!(matches!(registry.get(3), Err(BillingError::PlanNotFound { plan_idx: 3 })));
    }
}
