//! Time-and-balance arithmetic.
//!
//! Pure functions over timestamps (seconds) and amounts (base units). Billing
//! is in advance: a period is owed in full the moment it begins. Cancellation
//! and plan disablement are both *interruptions* that clamp the billing
//! horizon; the earliest one wins.
//!
//! All divisions truncate. Multiplications saturate instead of wrapping, so an
//! absurd balance yields a far-future horizon rather than a past one.

use serde::{Deserialize, Serialize};

/// Upper bound of a charge discount, in percent.
pub const MAX_DISCOUNT_PERCENT: u8 = 100;

/// The earliest of the two interruption causes, if any.
#[must_use]
pub fn earliest_interruption(cancelled_at: Option<u64>, disabled_at: Option<u64>) -> Option<u64> {
    match (cancelled_at, disabled_at) {
        (Some(cancelled), Some(disabled)) => Some(cancelled.min(disabled)),
        (cancelled, disabled) => cancelled.or(disabled),
    }
}

/// Clamp `until` by an optional interruption timestamp.
#[must_use]
pub fn billing_horizon(until: u64, interrupted_at: Option<u64>) -> u64 {
    interrupted_at.map_or(until, |at| until.min(at))
}

/// Number of periods that have begun at `horizon`.
///
/// Zero when the horizon is before `started_at`.
#[must_use]
pub fn periods_begun(started_at: u64, horizon: u64, period: u64) -> u64 {
    if horizon < started_at || period == 0 {
        return 0;
    }
    (horizon - started_at) / period + 1
}

/// Periods begun by `max_until_at`, bounded by cancellation and disablement.
#[must_use]
pub fn counted_periods(
    started_at: u64,
    max_until_at: u64,
    cancelled_at: Option<u64>,
    disabled_at: Option<u64>,
    period: u64,
) -> u64 {
    let horizon = billing_horizon(max_until_at, earliest_interruption(cancelled_at, disabled_at));
    periods_begun(started_at, horizon, period)
}

/// Owed-but-unpaid periods the balance can afford right now.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn debt_periods(
    started_at: u64,
    now: u64,
    cancelled_at: Option<u64>,
    charged_periods: u64,
    disabled_at: Option<u64>,
    period: u64,
    rate: u64,
    balance: u64,
) -> u64 {
    let owed = counted_periods(started_at, now, cancelled_at, disabled_at, period)
        .saturating_sub(charged_periods);
    owed.min(affordable_periods(balance, rate))
}

/// Whole periods `balance` can pay for at `rate`.
#[must_use]
pub fn affordable_periods(balance: u64, rate: u64) -> u64 {
    balance.checked_div(rate).unwrap_or(0)
}

/// Timestamp through which charged periods plus the balance keep the
/// subscription paid, absent any interruption.
#[must_use]
pub fn funded_until(started_at: u64, charged_periods: u64, balance: u64, rate: u64, period: u64) -> u64 {
    let periods = charged_periods.saturating_add(affordable_periods(balance, rate));
    started_at.saturating_add(periods.saturating_mul(period))
}

/// Per-period rate after applying `discount_percent`.
///
/// Rounds down once, on the per-period rate.
#[must_use]
pub fn discounted_rate(rate: u64, discount_percent: u8) -> u64 {
    let discount = u128::from(discount_percent.min(MAX_DISCOUNT_PERCENT));
    let adjusted = u128::from(rate) * (100 - discount) / 100;
    // adjusted <= rate, so it always fits
    u64::try_from(adjusted).unwrap_or(rate)
}

/// Amount, period count and effective rate of one charge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeQuote {
    /// Total to debit.
    pub amount: u64,
    /// Periods covered.
    pub periods: u64,
    /// Per-period rate after discount.
    pub adjusted_rate: u64,
}

/// Price `periods_to_charge` periods at `rate` less `charge_discount` percent.
#[must_use]
pub fn charge_amount(periods_to_charge: u64, charge_discount: u8, rate: u64) -> ChargeQuote {
    let adjusted_rate = discounted_rate(rate, charge_discount);
    ChargeQuote {
        amount: adjusted_rate.saturating_mul(periods_to_charge),
        periods: periods_to_charge,
        adjusted_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: u64 = 24 * 60 * 60;
    const WEEK: u64 = 7 * DAY;

    #[test]
    fn interruption_picks_earliest_cause() {
        assert_eq!(earliest_interruption(None, None), None);
        assert_eq!(earliest_interruption(Some(10), None), Some(10));
        assert_eq!(earliest_interruption(None, Some(7)), Some(7));
        assert_eq!(earliest_interruption(Some(10), Some(7)), Some(7));
        assert_eq!(earliest_interruption(Some(3), Some(7)), Some(3));
    }

    #[test]
    fn period_owed_from_its_first_second() {
        assert_eq!(counted_periods(100, 99, None, None, 10), 0);
        assert_eq!(counted_periods(100, 100, None, None, 10), 1);
        assert_eq!(counted_periods(100, 109, None, None, 10), 1);
        assert_eq!(counted_periods(100, 110, None, None, 10), 2);
    }

    #[test]
    fn interruption_inside_period_keeps_it_owed() {
        // cancelled half-way through the third period
        assert_eq!(counted_periods(0, 1_000, Some(25), None, 10), 3);
        assert_eq!(counted_periods(0, 1_000, None, Some(25), 10), 3);
    }

    #[test]
    fn interruption_before_start_counts_nothing() {
        assert_eq!(counted_periods(100, 1_000, Some(50), None, 10), 0);
        assert_eq!(counted_periods(100, 1_000, None, Some(99), 10), 0);
    }

    #[test]
    fn counted_periods_monotonic_in_horizon() {
        let mut previous = 0;
        for until in 0..200 {
            let counted = counted_periods(20, until, None, Some(150), 7);
            assert!(counted >= previous);
            previous = counted;
        }
    }

    #[test]
    fn earlier_interruption_never_counts_more() {
        for cancelled in 0..120 {
            let earlier = counted_periods(10, 500, Some(cancelled), None, 9);
            let later = counted_periods(10, 500, Some(cancelled + 1), None, 9);
            assert!(earlier <= later);
        }
    }

    #[test]
    fn debt_bounded_by_owed_and_balance() {
        for balance in [0, 50, 99, 100, 250, 10_000] {
            for charged in 0..4 {
                let debt = debt_periods(0, 45, None, charged, None, 10, 100, balance);
                let owed = counted_periods(0, 45, None, None, 10).saturating_sub(charged);
                assert!(debt <= owed);
                assert!(debt * 100 <= balance);
            }
        }
    }

    #[test]
    fn debt_is_zero_when_overcharged() {
        assert_eq!(debt_periods(0, 5, None, 3, None, 10, 1, 1_000), 0);
    }

    #[test]
    fn funded_until_steps_by_period_per_rate() {
        for balance in (0..1_000).step_by(37) {
            for charged in 0..3 {
                let base = funded_until(500, charged, balance, 100, WEEK);
                assert_eq!((base - 500) % WEEK, 0);
                assert_eq!(funded_until(500, charged, balance + 100, 100, WEEK), base + WEEK);
            }
        }
    }

    #[test]
    fn discount_rounds_per_period_rate() {
        assert_eq!(charge_amount(2, 5, 100), ChargeQuote { amount: 190, periods: 2, adjusted_rate: 95 });
        // 33 * 0.95 = 31.35 -> 31 per period, not floor(66 * 0.95) = 62
        assert_eq!(charge_amount(2, 5, 33).amount, 62);
        assert_eq!(charge_amount(3, 5, 33).amount, 93);
        assert_eq!(charge_amount(4, 100, 33).amount, 0);
        assert_eq!(charge_amount(4, 0, 33).amount, 132);
    }

    #[test]
    fn discounted_rate_handles_large_rates() {
        assert_eq!(discounted_rate(u64::MAX, 0), u64::MAX);
        assert_eq!(discounted_rate(u64::MAX, 50), u64::MAX / 2);
    }

    #[test]
    fn scenario_two_weeks_after_subscribe() {
        let started = 1_000;
        let now = started + 2 * WEEK;
        let debt = debt_periods(started, now, None, 1, None, WEEK, 100, 900);
        assert_eq!(debt, 2);
        assert_eq!(charge_amount(debt, 0, 100), ChargeQuote { amount: 200, periods: 2, adjusted_rate: 100 });
        assert_eq!(charge_amount(debt, 5, 100), ChargeQuote { amount: 190, periods: 2, adjusted_rate: 95 });
    }
}
