//! # Ledger Module: Share Supply, Asset Custody & Valuation
//!
//! The accounting engine never owns balances. It talks to two narrow
//! collaborators:
//!
//! ```text
//! ShareLedger        - share supply, share/asset balances, atomic commits
//! ValuationProvider  - assets under management, given the idle balance
//! ```
//!
//! ## Effect Batches
//!
//! A vault operation is expressed as an ordered batch of [`LedgerEffect`]s
//! and handed to [`ShareLedger::commit`] in one call. The commit is
//! all-or-nothing: either every effect in the batch becomes visible or none
//! does. Ordering inside the batch is part of the contract:
//!
//! 1. inbound asset transfers happen before any shares are minted,
//! 2. shares are burned before any asset leaves the vault,
//! 3. the batched fee mint to the collector comes last.
//!
//! A host whose transfer primitive can call back into untrusted code must
//! therefore never observe a half-applied operation.

pub mod balance;
pub mod memory;
pub mod valuation;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use balance::BalanceSheet;
pub use memory::InMemoryLedger;
pub use valuation::{IdleBalance, ReportedValuation, ValuationProvider};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// What a balance is denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Vault shares.
    Shares,
    /// The underlying asset.
    Assets,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Shares => write!(f, "share"),
            Unit::Assets => write!(f, "asset"),
        }
    }
}

/// Errors raised while applying ledger effects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// An account tried to spend more than it holds.
    #[error("insufficient {unit} balance for {account}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Denomination of the balance.
        unit: Unit,
        /// The account being debited.
        account: String,
        /// Its current balance.
        available: u64,
        /// The amount requested.
        requested: u64,
    },

    /// A credit would push an account past `u64::MAX`.
    #[error("{unit} balance overflow for {account}: current {current}, credit {credit}")]
    Overflow {
        /// Denomination of the balance.
        unit: Unit,
        /// The account being credited.
        account: String,
        /// Balance before the failed credit.
        current: u64,
        /// The amount that overflowed.
        credit: u64,
    },

    /// The vault does not hold enough idle assets for a payout.
    #[error("insufficient vault liquidity: idle {idle}, requested {requested}")]
    InsufficientLiquidity {
        /// Idle assets held by the vault.
        idle: u64,
        /// The payout requested.
        requested: u64,
    },

    /// Minting would overflow the share supply.
    #[error("share supply overflow: minting {shares} on top of {supply}")]
    SupplyOverflow {
        /// Supply before the mint.
        supply: u64,
        /// Shares being minted.
        shares: u64,
    },
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// A single balance mutation requested by the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum LedgerEffect {
    /// Move assets from `from` into vault custody.
    TransferIn {
        /// Paying account.
        from: String,
        /// Asset amount.
        amount: u64,
    },
    /// Move assets out of vault custody to `to`.
    TransferOut {
        /// Receiving account.
        to: String,
        /// Asset amount.
        amount: u64,
    },
    /// Create new shares for `to`.
    Mint {
        /// Receiving account.
        to: String,
        /// Share amount.
        shares: u64,
    },
    /// Destroy shares held by `from`.
    Burn {
        /// Holder.
        from: String,
        /// Share amount.
        shares: u64,
    },
}

// ---------------------------------------------------------------------------
// Provider Traits
// ---------------------------------------------------------------------------

/// Share supply and asset custody as seen by the accounting engine.
pub trait ShareLedger {
    /// Outstanding shares.
    fn total_shares(&self) -> u64;

    /// Shares held by `account`.
    fn share_balance(&self, account: &str) -> u64;

    /// Underlying assets held by `account` outside the vault.
    fn asset_balance(&self, account: &str) -> u64;

    /// Underlying assets held in vault custody and available for payouts.
    fn idle_assets(&self) -> u64;

    /// Applies `effects` in order as one indivisible transition.
    ///
    /// On error, no effect of the batch may remain visible.
    fn commit(&mut self, effects: &[LedgerEffect]) -> Result<(), LedgerError>;
}
