//! # Valuation Providers
//!
//! The engine treats assets under management as opaque: it hands the
//! provider the vault's idle balance and gets back a total. Two providers
//! ship with the crate. Anything more elaborate (external positions, price
//! feeds) plugs in behind the same trait.

use serde::{Deserialize, Serialize};

use crate::math::MathError;

/// Source of the vault's total assets under management.
pub trait ValuationProvider {
    /// Total assets backing the share supply, given the assets sitting idle
    /// in vault custody.
    fn total_assets(&self, idle_assets: u64) -> Result<u64, MathError>;
}

/// Assets under management are exactly the idle balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdleBalance;

impl ValuationProvider for IdleBalance {
    fn total_assets(&self, idle_assets: u64) -> Result<u64, MathError> {
        Ok(idle_assets)
    }
}

/// Idle balance plus an externally reported amount (deployed capital,
/// strategy positions). The reported figure is updated by whoever operates
/// the strategy and can go down as well as up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReportedValuation {
    external_assets: u64,
}

impl ReportedValuation {
    /// Creates a provider with an initial external position value.
    pub fn new(external_assets: u64) -> Self {
        Self { external_assets }
    }

    /// Current reported value of assets held outside the vault.
    pub fn external_assets(&self) -> u64 {
        self.external_assets
    }

    /// Replaces the reported value.
    pub fn report(&mut self, external_assets: u64) {
        tracing::debug!(
            previous = self.external_assets,
            reported = external_assets,
            "external valuation reported"
        );
        self.external_assets = external_assets;
    }
}

impl ValuationProvider for ReportedValuation {
    fn total_assets(&self, idle_assets: u64) -> Result<u64, MathError> {
        idle_assets
            .checked_add(self.external_assets)
            .ok_or(MathError::Overflow("reported_valuation"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_balance_is_identity() {
        assert_eq!(IdleBalance.total_assets(1_234).unwrap(), 1_234);
    }

    #[test]
    fn reported_valuation_adds_external_value() {
        let mut valuation = ReportedValuation::new(500);
        assert_eq!(valuation.total_assets(1_000).unwrap(), 1_500);

        valuation.report(200);
        assert_eq!(valuation.external_assets(), 200);
        assert_eq!(valuation.total_assets(1_000).unwrap(), 1_200);
    }

    #[test]
    fn reported_valuation_overflow() {
        let valuation = ReportedValuation::new(u64::MAX);
        assert!(valuation.total_assets(1).is_err());
    }
}
