//! # Share / Asset Conversion
//!
//! Pure conversions between asset amounts and share amounts against an
//! explicit `(assets, supply)` pair:
//!
//! ```text
//! to_shares(a) = a * (supply + OFFSET) / (assets + 1)
//! to_assets(s) = s * (assets + 1)     / (supply + OFFSET)
//! ```
//!
//! `OFFSET` (a power of ten) and the `+ 1` are virtual liquidity. An empty
//! vault prices its first shares at `OFFSET` shares per asset unit, and a
//! donation made before the first deposit is mostly captured by the virtual
//! shares instead of the attacker.

use serde::{Deserialize, Serialize};

use crate::math::{mul_div, MathError, Rounding};

/// Converts an asset amount into shares.
pub fn to_shares(
    assets: u64,
    vault_assets: u64,
    vault_supply: u64,
    share_offset: u64,
    rounding: Rounding,
) -> Result<u64, MathError> {
    let numerator = u128::from(vault_supply) + u128::from(share_offset);
    let denominator = u128::from(vault_assets) + 1;
    mul_div(assets, numerator, denominator, rounding, "to_shares")
}

/// Converts a share amount into assets.
pub fn to_assets(
    shares: u64,
    vault_assets: u64,
    vault_supply: u64,
    share_offset: u64,
    rounding: Rounding,
) -> Result<u64, MathError> {
    let numerator = u128::from(vault_assets) + 1;
    let denominator = u128::from(vault_supply) + u128::from(share_offset);
    mul_div(shares, numerator, denominator, rounding, "to_assets")
}

/// A point-in-time `(assets, supply)` pair, either observed from the
/// providers or simulated with pending fee shares folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VaultSnapshot {
    /// Assets under management.
    pub total_assets: u64,
    /// Outstanding shares.
    pub total_shares: u64,
}

impl VaultSnapshot {
    /// Creates a snapshot from raw totals.
    pub fn new(total_assets: u64, total_shares: u64) -> Self {
        Self {
            total_assets,
            total_shares,
        }
    }

    /// Returns the snapshot after `shares` more have been minted with no
    /// assets entering the vault (fee dilution).
    pub fn with_minted(self, shares: u64) -> Result<Self, MathError> {
        let total_shares = self
            .total_shares
            .checked_add(shares)
            .ok_or(MathError::Overflow("with_minted"))?;
        Ok(Self {
            total_shares,
            ..self
        })
    }

    /// [`to_shares`] against this snapshot.
    pub fn to_shares(
        &self,
        assets: u64,
        share_offset: u64,
        rounding: Rounding,
    ) -> Result<u64, MathError> {
        to_shares(
            assets,
            self.total_assets,
            self.total_shares,
            share_offset,
            rounding,
        )
    }

    /// [`to_assets`] against this snapshot.
    pub fn to_assets(
        &self,
        shares: u64,
        share_offset: u64,
        rounding: Rounding,
    ) -> Result<u64, MathError> {
        to_assets(
            shares,
            self.total_assets,
            self.total_shares,
            share_offset,
            rounding,
        )
    }

    /// Assets backing one whole share (`decimals_scale` base units), floored.
    pub fn share_value(&self, decimals_scale: u64, share_offset: u64) -> Result<u64, MathError> {
        self.to_assets(decimals_scale, share_offset, Rounding::Floor)
    }
}
