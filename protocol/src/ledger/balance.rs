//! # Per-Account Balances
//!
//! A [`BalanceSheet`] maps account identifiers to a single denomination of
//! balance (shares or assets) and enforces the invariant that no account can
//! spend more than it holds. Accounts are kept in a `BTreeMap` so that
//! serialized snapshots are byte-for-byte reproducible.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{LedgerError, Unit};

/// Balances of one denomination, keyed by account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    /// Denomination of every balance in this sheet.
    unit: Unit,
    /// Non-zero balances indexed by account.
    balances: BTreeMap<String, u64>,
}

impl BalanceSheet {
    /// Creates an empty balance sheet.
    pub fn new(unit: Unit) -> Self {
        Self {
            unit,
            balances: BTreeMap::new(),
        }
    }

    /// Credits `amount` to `account` and returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if the credit would exceed `u64::MAX`.
    pub fn credit(&mut self, account: &str, amount: u64) -> Result<u64, LedgerError> {
        if amount == 0 {
            return Ok(self.get(account));
        }

        let balance = self.balances.entry(account.to_string()).or_insert(0);
        let new_amount = balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow {
                unit: self.unit,
                account: account.to_string(),
                current: *balance,
                credit: amount,
            })?;

        *balance = new_amount;
        Ok(new_amount)
    }

    /// Debits `amount` from `account` and returns the remaining balance.
    /// Accounts that reach zero are dropped from the sheet.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] if the debit exceeds
    /// the current balance.
    pub fn debit(&mut self, account: &str, amount: u64) -> Result<u64, LedgerError> {
        let available = self.get(account);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                unit: self.unit,
                account: account.to_string(),
                available,
                requested: amount,
            });
        }

        let remaining = available - amount;
        if remaining == 0 {
            self.balances.remove(account);
        } else {
            self.balances.insert(account.to_string(), remaining);
        }
        Ok(remaining)
    }

    /// Returns the balance of `account`, zero if it holds nothing.
    pub fn get(&self, account: &str) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Returns all non-zero balances as `(account, amount)` pairs.
    pub fn all_balances(&self) -> Vec<(String, u64)> {
        self.balances
            .iter()
            .map(|(account, amount)| (account.clone(), *amount))
            .collect()
    }

    /// Sum of all balances, saturating at `u64::MAX`.
    pub fn total(&self) -> u64 {
        self.balances
            .values()
            .fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    /// Returns `true` if no account holds a balance.
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_creates_new_entry() {
        let mut sheet = BalanceSheet::new(Unit::Shares);
        assert_eq!(sheet.credit("alice", 1000).unwrap(), 1000);
        assert_eq!(sheet.get("alice"), 1000);
    }

    #[test]
    fn credit_accumulates() {
        let mut sheet = BalanceSheet::new(Unit::Assets);
        sheet.credit("alice", 500).unwrap();
        sheet.credit("alice", 300).unwrap();
        assert_eq!(sheet.get("alice"), 800);
    }

    #[test]
    fn zero_credit_does_not_create_entry() {
        let mut sheet = BalanceSheet::new(Unit::Assets);
        sheet.credit("alice", 0).unwrap();
        assert!(sheet.is_empty());
    }

    #[test]
    fn credit_overflow_rejected() {
        let mut sheet = BalanceSheet::new(Unit::Shares);
        sheet.credit("alice", u64::MAX).unwrap();
        let result = sheet.credit("alice", 1);
        assert!(matches!(
            result,
            Err(LedgerError::Overflow {
                unit: Unit::Shares,
                ..
            })
        ));
        assert_eq!(sheet.get("alice"), u64::MAX);
    }

    #[test]
    fn debit_to_zero_removes_entry() {
        let mut sheet = BalanceSheet::new(Unit::Shares);
        sheet.credit("alice", 500).unwrap();
        assert_eq!(sheet.debit("alice", 200).unwrap(), 300);
        assert_eq!(sheet.debit("alice", 300).unwrap(), 0);
        assert!(sheet.is_empty());
    }

    #[test]
    fn debit_insufficient_balance_rejected() {
        let mut sheet = BalanceSheet::new(Unit::Assets);
        sheet.credit("alice", 100).unwrap();
        let result = sheet.debit("alice", 200);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance {
                available: 100,
                requested: 200,
                ..
            })
        ));
        assert_eq!(sheet.get("alice"), 100);
    }

    #[test]
    fn debit_unknown_account_rejected() {
        let mut sheet = BalanceSheet::new(Unit::Assets);
        assert!(sheet.debit("nobody", 1).is_err());
        assert_eq!(sheet.debit("nobody", 0).unwrap(), 0);
    }

    #[test]
    fn totals_and_listing() {
        let mut sheet = BalanceSheet::new(Unit::Shares);
        sheet.credit("bob", 5).unwrap();
        sheet.credit("alice", 7).unwrap();
        assert_eq!(sheet.total(), 12);
        assert_eq!(
            sheet.all_balances(),
            vec![("alice".to_string(), 7), ("bob".to_string(), 5)]
        );
    }

    #[test]
    fn balance_sheet_serialization_roundtrip() {
        let mut sheet = BalanceSheet::new(Unit::Shares);
        sheet.credit("alice", 42).unwrap();

        let json = serde_json::to_string(&sheet).expect("serialize");
        let recovered: BalanceSheet = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(recovered, sheet);
    }
}
