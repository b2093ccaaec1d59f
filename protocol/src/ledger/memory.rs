//! # In-Memory Ledger
//!
//! A self-contained [`ShareLedger`] used by the simulator and the test
//! suites. Share supply and per-account balances are tracked together and
//! every mutation is overflow-checked.
//!
//! Commits run against a staged copy of the ledger which replaces the live
//! one only after the whole batch succeeded, so a failing effect halfway
//! through a batch leaves nothing behind.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{BalanceSheet, LedgerEffect, LedgerError, ShareLedger, Unit};

/// Share and asset balances for a single vault, held in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryLedger {
    /// Share balances per holder.
    shares: BalanceSheet,
    /// Asset balances per account, outside the vault.
    assets: BalanceSheet,
    /// Outstanding share supply.
    total_shares: u64,
    /// Assets held in vault custody.
    idle_assets: u64,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self {
            shares: BalanceSheet::new(Unit::Shares),
            assets: BalanceSheet::new(Unit::Assets),
            total_shares: 0,
            idle_assets: 0,
        }
    }

    /// Credits underlying assets to an external account. This is the
    /// faucet the simulator and tests use to give depositors funds.
    pub fn fund_account(&mut self, account: &str, amount: u64) -> Result<u64, LedgerError> {
        self.assets.credit(account, amount)
    }

    /// Adds assets straight into vault custody without minting shares,
    /// the way yield or a donation would arrive.
    pub fn donate(&mut self, amount: u64) -> Result<u64, LedgerError> {
        self.idle_assets = self
            .idle_assets
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow {
                unit: Unit::Assets,
                account: "vault".to_string(),
                current: self.idle_assets,
                credit: amount,
            })?;
        Ok(self.idle_assets)
    }

    /// All share holders with their balances.
    pub fn share_holders(&self) -> Vec<(String, u64)> {
        self.shares.all_balances()
    }

    fn apply(&mut self, effect: &LedgerEffect) -> Result<(), LedgerError> {
        trace!(?effect, "applying ledger effect");
        match effect {
            LedgerEffect::TransferIn { from, amount } => {
                self.assets.debit(from, *amount)?;
                self.donate(*amount)?;
            }
            LedgerEffect::TransferOut { to, amount } => {
                if self.idle_assets < *amount {
                    return Err(LedgerError::InsufficientLiquidity {
                        idle: self.idle_assets,
                        requested: *amount,
                    });
                }
                self.idle_assets -= *amount;
                self.assets.credit(to, *amount)?;
            }
            LedgerEffect::Mint { to, shares } => {
                self.total_shares = self.total_shares.checked_add(*shares).ok_or(
                    LedgerError::SupplyOverflow {
                        supply: self.total_shares,
                        shares: *shares,
                    },
                )?;
                self.shares.credit(to, *shares)?;
            }
            LedgerEffect::Burn { from, shares } => {
                self.shares.debit(from, *shares)?;
                // A holder's balance never exceeds the supply.
                self.total_shares = self.total_shares.saturating_sub(*shares);
            }
        }
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ShareLedger for InMemoryLedger {
    fn total_shares(&self) -> u64 {
        self.total_shares
    }

    fn share_balance(&self, account: &str) -> u64 {
        self.shares.get(account)
    }

    fn asset_balance(&self, account: &str) -> u64 {
        self.assets.get(account)
    }

    fn idle_assets(&self) -> u64 {
        self.idle_assets
    }

    fn commit(&mut self, effects: &[LedgerEffect]) -> Result<(), LedgerError> {
        let mut staged = self.clone();
        for effect in effects {
            staged.apply(effect)?;
        }
        *self = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded() -> InMemoryLedger {
        let mut ledger = InMemoryLedger::new();
        ledger.fund_account("alice", 1_000).unwrap();
        ledger
    }

    #[test]
    fn deposit_batch_moves_assets_and_mints() {
        let mut ledger = funded();
        ledger
            .commit(&[
                LedgerEffect::TransferIn {
                    from: "alice".into(),
                    amount: 600,
                },
                LedgerEffect::Mint {
                    to: "alice".into(),
                    shares: 600,
                },
            ])
            .unwrap();

        assert_eq!(ledger.asset_balance("alice"), 400);
        assert_eq!(ledger.idle_assets(), 600);
        assert_eq!(ledger.total_shares(), 600);
        assert_eq!(ledger.share_balance("alice"), 600);
    }

    #[test]
    fn failing_batch_leaves_no_trace() {
        let mut ledger = funded();
        let before = ledger.clone();

        let result = ledger.commit(&[
            LedgerEffect::TransferIn {
                from: "alice".into(),
                amount: 500,
            },
            LedgerEffect::Mint {
                to: "alice".into(),
                shares: 500,
            },
            // Alice holds 500 shares, not 501.
            LedgerEffect::Burn {
                from: "alice".into(),
                shares: 501,
            },
        ]);

        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance {
                unit: Unit::Shares,
                ..
            })
        ));
        assert_eq!(ledger, before);
    }

    #[test]
    fn transfer_out_requires_liquidity() {
        let mut ledger = funded();
        ledger.donate(10).unwrap();
        let result = ledger.commit(&[LedgerEffect::TransferOut {
            to: "bob".into(),
            amount: 11,
        }]);
        assert_eq!(
            result,
            Err(LedgerError::InsufficientLiquidity {
                idle: 10,
                requested: 11
            })
        );
    }

    #[test]
    fn burn_reduces_supply() {
        let mut ledger = InMemoryLedger::new();
        ledger
            .commit(&[
                LedgerEffect::Mint {
                    to: "alice".into(),
                    shares: 100,
                },
                LedgerEffect::Mint {
                    to: "bob".into(),
                    shares: 50,
                },
                LedgerEffect::Burn {
                    from: "alice".into(),
                    shares: 30,
                },
            ])
            .unwrap();
        assert_eq!(ledger.total_shares(), 120);
        assert_eq!(
            ledger.share_holders(),
            vec![("alice".to_string(), 70), ("bob".to_string(), 50)]
        );
    }

    #[test]
    fn supply_overflow_rejected() {
        let mut ledger = InMemoryLedger::new();
        ledger
            .commit(&[LedgerEffect::Mint {
                to: "alice".into(),
                shares: u64::MAX,
            }])
            .unwrap();
        let result = ledger.commit(&[LedgerEffect::Mint {
            to: "bob".into(),
            shares: 1,
        }]);
        assert!(matches!(result, Err(LedgerError::SupplyOverflow { .. })));
        assert_eq!(ledger.share_balance("bob"), 0);
    }

    #[test]
    fn ledger_serialization_roundtrip() {
        let mut ledger = funded();
        ledger.donate(5).unwrap();
        let json = serde_json::to_string(&ledger).expect("serialize");
        let recovered: InMemoryLedger = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(recovered, ledger);
    }
}
