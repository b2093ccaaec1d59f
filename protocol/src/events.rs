//! # Vault Events
//!
//! Every state transition a vault performs is described by a [`VaultEvent`].
//! The vault keeps them in an in-memory journal that the host drains after
//! each committed operation; failed operations never leave events behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fees::FeeKind;
use crate::math::{checked_sum, MathError};

/// Per-component fee shares minted to the collector in one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeBreakdown {
    /// Time-prorated management fee shares.
    pub management_shares: u64,
    /// Performance fee shares above the high-water mark.
    pub performance_shares: u64,
    /// Entry fee shares from a deposit or mint.
    pub entry_shares: u64,
    /// Exit fee shares from a withdraw or redeem.
    pub exit_shares: u64,
}

impl FeeBreakdown {
    /// Sum of all components.
    pub fn total(&self) -> Result<u64, MathError> {
        checked_sum(
            &[
                self.management_shares,
                self.performance_shares,
                self.entry_shares,
                self.exit_shares,
            ],
            "fee_breakdown_total",
        )
    }

    /// Sum of the components that accrue with time.
    pub fn accrued(&self) -> Result<u64, MathError> {
        checked_sum(
            &[self.management_shares, self.performance_shares],
            "fee_breakdown_accrued",
        )
    }

    /// True when nothing is owed.
    pub fn is_empty(&self) -> bool {
        *self == FeeBreakdown::default()
    }
}

/// Observable vault state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VaultEvent {
    /// Assets entered the vault and shares were minted to `receiver`.
    Deposit {
        /// Account that supplied the assets.
        caller: String,
        /// Account that received the shares.
        receiver: String,
        /// Gross assets transferred in, fee included.
        assets: u64,
        /// Net shares minted to the receiver.
        shares: u64,
    },

    /// Shares were burned from `owner` and assets sent to `receiver`.
    Withdraw {
        /// Account that initiated the exit.
        caller: String,
        /// Account that received the assets.
        receiver: String,
        /// Account whose shares were burned.
        owner: String,
        /// Net assets transferred out.
        assets: u64,
        /// Shares burned from the owner, fee included.
        shares: u64,
    },

    /// A new rate was proposed and is waiting out the timelock.
    FeeProposed {
        /// Which fee.
        kind: FeeKind,
        /// Proposed rate.
        rate_bps: u32,
        /// Earliest enforcement time.
        activation: DateTime<Utc>,
    },

    /// A pending rate became active.
    FeeEnforced {
        /// Which fee.
        kind: FeeKind,
        /// Newly active rate.
        rate_bps: u32,
    },

    /// Fee shares were minted to the collector.
    FeeCollected {
        /// Collector that received the shares.
        collector: String,
        /// Sum of the breakdown.
        total_shares: u64,
        /// Per-component shares.
        breakdown: FeeBreakdown,
        /// Collection time.
        timestamp: DateTime<Utc>,
    },

    /// The fee collector changed.
    FeeCollectorUpdated {
        /// Previous collector.
        previous: String,
        /// New collector.
        collector: String,
    },

    /// The governance principal changed.
    GovernanceTransferred {
        /// Previous governance principal.
        previous: String,
        /// New governance principal.
        governance: String,
    },
}
