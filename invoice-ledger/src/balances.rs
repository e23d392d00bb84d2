//! Per-identity credit balances
//!
//! Balances are unsigned; every debit is checked against the current balance
//! and every credit against overflow before anything is written.

use crate::{
    types::{Amount, Identity},
    Error, Result,
};
use std::collections::HashMap;

/// Credit balances, zero by default
#[derive(Debug, Clone, Default)]
pub struct BalanceLedger {
    balances: HashMap<Identity, Amount>,
}

impl BalanceLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `identity`, 0 if never seen
    pub fn balance_of(&self, identity: &Identity) -> Amount {
        self.balances.get(identity).copied().unwrap_or(0)
    }

    /// Balance after crediting `amount`, or `Overflow`
    pub fn checked_credit(&self, identity: &Identity, amount: Amount) -> Result<Amount> {
        self.balance_of(identity)
            .checked_add(amount)
            .ok_or_else(|| Error::Overflow {
                account: identity.clone(),
                amount,
            })
    }

    /// Balance after debiting `amount`, or `InsufficientBalance`
    pub fn checked_debit(&self, identity: &Identity, amount: Amount) -> Result<Amount> {
        let balance = self.balance_of(identity);
        balance
            .checked_sub(amount)
            .ok_or_else(|| Error::InsufficientBalance {
                caller: identity.clone(),
                balance,
                requested: amount,
            })
    }

    /// Credit `amount` to `identity`
    pub fn credit(&mut self, identity: &Identity, amount: Amount) -> Result<()> {
        let updated = self.checked_credit(identity, amount)?;
        self.balances.insert(identity.clone(), updated);
        Ok(())
    }

    /// Move `amount` from `from` to `to` as one step: both sides are computed
    /// before either is written.
    pub fn transfer(&mut self, from: &Identity, to: &Identity, amount: Amount) -> Result<()> {
        if from == to {
            self.checked_debit(from, amount)?;
            return Ok(());
        }
        let debited = self.checked_debit(from, amount)?;
        let credited = self.checked_credit(to, amount)?;
        self.balances.insert(from.clone(), debited);
        self.balances.insert(to.clone(), credited);
        Ok(())
    }

    /// Sum of all balances, `None` if it does not fit
    pub fn total(&self) -> Option<Amount> {
        self.balances
            .values()
            .try_fold(0 as Amount, |acc, b| acc.checked_add(*b))
    }
}
