//! # Protocol Configuration & Constants
//!
//! Every magic number in Vaultline lives here, together with the
//! [`VaultConfig`] a vault is deployed with. If you're hardcoding a basis
//! point scale somewhere else, you're doing it wrong.
//!
//! These values decide how value moves between depositors and the fee
//! collector. Changing them on a live vault is what the timelock exists for,
//! so the constants themselves should be treated as frozen.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fees::{FeeKind, FeeRates};

// ---------------------------------------------------------------------------
// Fee Parameters
// ---------------------------------------------------------------------------

/// Denominator for all basis-point rates. 1 bp = 1 / 10_000.
pub const BPS_SCALE: u64 = 10_000;

/// Upper bound for any single fee rate: 50%. Anything above this is a
/// fat-finger, not a business model.
pub const MAX_FEE_BPS: u32 = 5_000;

/// Seconds in the year used to prorate the annualized management fee.
/// Leap years are ignored on purpose so that the rate is time-invariant.
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

/// Timelock between proposing a fee change and being allowed to enforce it.
/// Two weeks gives depositors time to exit before a new rate applies.
pub const FEE_UPDATE_DELAY: Duration = Duration::from_secs(14 * 24 * 60 * 60);

// ---------------------------------------------------------------------------
// Share Precision
// ---------------------------------------------------------------------------

/// Default decimals of the underlying asset (USDC-style).
pub const DEFAULT_ASSET_DECIMALS: u8 = 6;

/// Default decimals offset between shares and assets. Each offset decimal
/// multiplies the virtual share padding by ten and makes a donation attack
/// ten times more expensive.
pub const DEFAULT_DECIMALS_OFFSET: u8 = 3;

/// `10^19` is the largest power of ten that fits in a `u64`, so asset
/// decimals plus offset must stay at or below this.
pub const MAX_SHARE_DECIMALS: u8 = 19;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while validating a [`VaultConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Asset decimals plus offset do not fit in a `u64` power of ten.
    #[error("share decimals too large: {asset_decimals} + {decimals_offset} exceeds {max}")]
    ShareDecimalsTooLarge {
        /// Configured asset decimals.
        asset_decimals: u8,
        /// Configured decimals offset.
        decimals_offset: u8,
        /// Maximum allowed sum.
        max: u8,
    },

    /// An initial fee rate is above [`MAX_FEE_BPS`].
    #[error("initial {kind} fee of {rate_bps} bps exceeds maximum of {max} bps")]
    RateTooHigh {
        /// Which fee is out of range.
        kind: FeeKind,
        /// The offending rate.
        rate_bps: u32,
        /// The maximum allowed rate.
        max: u32,
    },

    /// A required principal identifier is empty.
    #[error("missing principal: {0} must not be empty")]
    MissingPrincipal(&'static str),
}

// ---------------------------------------------------------------------------
// Vault Configuration
// ---------------------------------------------------------------------------

/// Deployment-time parameters of a single vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Decimals of the underlying asset.
    #[serde(default = "default_asset_decimals")]
    pub asset_decimals: u8,
    /// Extra share decimals used as virtual liquidity padding.
    #[serde(default = "default_decimals_offset")]
    pub decimals_offset: u8,
    /// Principal allowed to change fee parameters and collect fees.
    pub governance: String,
    /// Account that receives fee shares.
    pub fee_collector: String,
    /// Fee rates active at deployment.
    #[serde(default)]
    pub initial_rates: FeeRates,
    /// Optional ceiling on total assets under management.
    #[serde(default)]
    pub deposit_cap: Option<u64>,
}

fn default_asset_decimals() -> u8 {
    DEFAULT_ASSET_DECIMALS
}

fn default_decimals_offset() -> u8 {
    DEFAULT_DECIMALS_OFFSET
}

impl VaultConfig {
    /// Builds a fee-free config with the default precision.
    pub fn new(governance: impl Into<String>, fee_collector: impl Into<String>) -> Self {
        Self {
            asset_decimals: DEFAULT_ASSET_DECIMALS,
            decimals_offset: DEFAULT_DECIMALS_OFFSET,
            governance: governance.into(),
            fee_collector: fee_collector.into(),
            initial_rates: FeeRates::default(),
            deposit_cap: None,
        }
    }

    /// Checks precision bounds, rate bounds and principals.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let share_decimals = self.asset_decimals.saturating_add(self.decimals_offset);
        if share_decimals > MAX_SHARE_DECIMALS {
            return Err(ConfigError::ShareDecimalsTooLarge {
                asset_decimals: self.asset_decimals,
                decimals_offset: self.decimals_offset,
                max: MAX_SHARE_DECIMALS,
            });
        }

        for kind in FeeKind::ALL {
            let rate_bps = self.initial_rates.get(kind);
            if rate_bps > MAX_FEE_BPS {
                return Err(ConfigError::RateTooHigh {
                    kind,
                    rate_bps,
                    max: MAX_FEE_BPS,
                });
            }
        }

        if self.governance.trim().is_empty() {
            return Err(ConfigError::MissingPrincipal("governance"));
        }
        if self.fee_collector.trim().is_empty() {
            return Err(ConfigError::MissingPrincipal("fee_collector"));
        }

        Ok(())
    }

    /// Virtual shares added to the supply side of every conversion.
    pub fn share_offset(&self) -> u64 {
        10u64.pow(u32::from(self.decimals_offset))
    }

    /// Number of share base units in one whole share. Share values and the
    /// high-water mark are expressed in assets per this many units.
    pub fn decimals_scale(&self) -> u64 {
        10u64.pow(u32::from(self.asset_decimals) + u32::from(self.decimals_offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_constants_sanity() {
        assert!(u64::from(MAX_FEE_BPS) < BPS_SCALE);
        assert_eq!(SECONDS_PER_YEAR, 31_536_000);
        assert_eq!(FEE_UPDATE_DELAY.as_secs(), 1_209_600);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = VaultConfig::new("gov", "collector");
        assert!(config.validate().is_ok());
        assert_eq!(config.share_offset(), 1_000);
        assert_eq!(config.decimals_scale(), 1_000_000_000);
    }

    #[test]
    fn test_share_decimals_bound() {
        let mut config = VaultConfig::new("gov", "collector");
        config.asset_decimals = 18;
        config.decimals_offset = 2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ShareDecimalsTooLarge { .. })
        ));

        config.decimals_offset = 1;
        assert!(config.validate().is_ok());
        assert_eq!(config.decimals_scale(), 10_000_000_000_000_000_000);
    }

    #[test]
    fn test_initial_rate_bound() {
        let mut config = VaultConfig::new("gov", "collector");
        config.initial_rates.performance_bps = MAX_FEE_BPS + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RateTooHigh {
                kind: FeeKind::Performance,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_principals_rejected() {
        let config = VaultConfig::new("  ", "collector");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingPrincipal("governance"))
        ));

        let config = VaultConfig::new("gov", "");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingPrincipal("fee_collector"))
        ));
    }

    #[test]
    fn test_config_serde_defaults() {
        let json = r#"{"governance":"gov","fee_collector":"fees"}"#;
        let config: VaultConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(config.asset_decimals, DEFAULT_ASSET_DECIMALS);
        assert_eq!(config.decimals_offset, DEFAULT_DECIMALS_OFFSET);
        assert_eq!(config.initial_rates, FeeRates::default());
        assert_eq!(config.deposit_cap, None);
    }
}
