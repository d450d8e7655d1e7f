//! Custodial balances and collected revenue.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};
use crate::ids::AccountId;

/// Per-account balances plus the revenue charged but not yet swept.
///
/// Every unit charged out of a balance lands in `paid_amount`, so the sum of
/// balances plus `paid_amount` only changes through deposits, withdrawals and
/// revenue sweeps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    balances: HashMap<AccountId, u64>,
    paid_amount: u64,
}

impl Ledger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted values.
    #[must_use]
    pub fn from_parts(balances: HashMap<AccountId, u64>, paid_amount: u64) -> Self {
        Self {
            balances,
            paid_amount,
        }
    }

    /// Current balance, zero for unknown accounts.
    #[must_use]
    pub fn balance_of(&self, account: &AccountId) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// All non-default balances.
    #[must_use]
    pub fn balances(&self) -> &HashMap<AccountId, u64> {
        &self.balances
    }

    /// Revenue waiting to be withdrawn.
    #[must_use]
    pub const fn paid_amount(&self) -> u64 {
        self.paid_amount
    }

    /// Credit `amount` to `account`.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::InvalidAmount`] if the balance would overflow.
    pub fn increase_balance(&mut self, account: AccountId, amount: u64) -> Result<u64> {
        let balance = self.balance_of(&account);
        let updated = balance
            .checked_add(amount)
            .ok_or_else(|| BillingError::InvalidAmount(format!("balance overflow for {account}")))?;
        self.balances.insert(account, updated);
        Ok(updated)
    }

    /// Debit `amount` from `account`.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::InsufficientBalance`] with the current balance
    /// and the requested amount if the balance is too low.
    pub fn decrease_balance(&mut self, account: AccountId, amount: u64) -> Result<u64> {
        let balance = self.balance_of(&account);
        let updated = balance
            .checked_sub(amount)
            .ok_or(BillingError::InsufficientBalance {
                balance,
                required: amount,
            })?;
        self.balances.insert(account, updated);
        Ok(updated)
    }

    /// Record collected revenue.
    pub fn pay(&mut self, amount: u64) {
        self.paid_amount = self.paid_amount.saturating_add(amount);
    }

    /// Take all collected revenue, leaving zero behind.
    pub fn take_paid(&mut self) -> u64 {
        std::mem::take(&mut self.paid_amount)
    }

    /// Put revenue back after a failed sweep.
    pub fn restore_paid(&mut self, amount: u64) {
        self.paid_amount = self.paid_amount.saturating_add(amount);
    }
}
