//! # Fee Calculator
//!
//! Pure functions for the four fee mechanisms. Nothing in here touches
//! state; the vault decides when to call them and what to do with the
//! result.
//!
//! ## Rounding
//!
//! Every function rounds in favor of the vault and its fee collector. A
//! caller who splits one large operation into many tiny ones pays at least
//! as much in fees, never less.
//!
//! ## Formulas
//!
//! ```text
//! fee_on_raw(a, bp)   = ceil(a * bp / SCALE)          // fee added on top of a
//! fee_on_total(a, bp) = ceil(a * bp / (bp + SCALE))   // fee already inside a
//! management(s, bp, t) = ceil(s * bp * t / (SCALE * YEAR))
//! performance         = floor(floor(profit/share * s / unit) * bp / SCALE), as shares (ceil)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{BPS_SCALE, MAX_FEE_BPS, SECONDS_PER_YEAR};
use crate::conversion::VaultSnapshot;
use crate::math::{mul_div, mul_div_u128, narrow, MathError, Rounding};

// ---------------------------------------------------------------------------
// Fee Kinds & Rates
// ---------------------------------------------------------------------------

/// The four independently governed fee mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeKind {
    /// Charged on deposit and mint.
    Entry,
    /// Charged on withdraw and redeem.
    Exit,
    /// Annualized, accrues with time on the outstanding supply.
    Management,
    /// Charged on share-value gains above the high-water mark.
    Performance,
}

impl FeeKind {
    /// All kinds, in a stable order.
    pub const ALL: [FeeKind; 4] = [
        FeeKind::Entry,
        FeeKind::Exit,
        FeeKind::Management,
        FeeKind::Performance,
    ];

    /// Whether this fee accrues over time and must be settled before its
    /// rate changes.
    pub fn is_time_based(self) -> bool {
        matches!(self, FeeKind::Management | FeeKind::Performance)
    }
}

impl fmt::Display for FeeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeKind::Entry => write!(f, "entry"),
            FeeKind::Exit => write!(f, "exit"),
            FeeKind::Management => write!(f, "management"),
            FeeKind::Performance => write!(f, "performance"),
        }
    }
}

impl std::str::FromStr for FeeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "entry" => Ok(FeeKind::Entry),
            "exit" => Ok(FeeKind::Exit),
            "management" => Ok(FeeKind::Management),
            "performance" => Ok(FeeKind::Performance),
            other => Err(format!("unknown fee kind: {other}")),
        }
    }
}

/// Active fee rates in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeRates {
    /// Entry fee, charged on deposit/mint.
    pub entry_bps: u32,
    /// Exit fee, charged on withdraw/redeem.
    pub exit_bps: u32,
    /// Annualized management fee.
    pub management_bps: u32,
    /// Performance fee on gains above the high-water mark.
    pub performance_bps: u32,
}

impl FeeRates {
    /// Returns the rate for `kind`.
    pub fn get(&self, kind: FeeKind) -> u32 {
        match kind {
            FeeKind::Entry => self.entry_bps,
            FeeKind::Exit => self.exit_bps,
            FeeKind::Management => self.management_bps,
            FeeKind::Performance => self.performance_bps,
        }
    }

    /// Overwrites the rate for `kind`. Bounds are the caller's concern.
    pub fn set(&mut self, kind: FeeKind, rate_bps: u32) {
        match kind {
            FeeKind::Entry => self.entry_bps = rate_bps,
            FeeKind::Exit => self.exit_bps = rate_bps,
            FeeKind::Management => self.management_bps = rate_bps,
            FeeKind::Performance => self.performance_bps = rate_bps,
        }
    }

    /// True when every rate is within [`MAX_FEE_BPS`].
    pub fn within_bounds(&self) -> bool {
        FeeKind::ALL.iter().all(|k| self.get(*k) <= MAX_FEE_BPS)
    }
}

// ---------------------------------------------------------------------------
// Entry / Exit
// ---------------------------------------------------------------------------

/// Fee to add on top of an amount that does not include it yet.
///
/// Used for the asset requirement of a mint and the payout of a withdraw.
pub fn fee_on_raw(amount: u64, rate_bps: u32) -> Result<u64, MathError> {
    mul_div(
        amount,
        u128::from(rate_bps),
        u128::from(BPS_SCALE),
        Rounding::Ceil,
        "fee_on_raw",
    )
}

/// Fee contained inside an amount that already includes it.
///
/// Used for the assets supplied to a deposit and the proceeds of a redeem.
/// `amount - fee_on_total(amount, bp)` is the net part, and the two always
/// sum back to `amount`.
pub fn fee_on_total(amount: u64, rate_bps: u32) -> Result<u64, MathError> {
    mul_div(
        amount,
        u128::from(rate_bps),
        u128::from(rate_bps) + u128::from(BPS_SCALE),
        Rounding::Ceil,
        "fee_on_total",
    )
}

// ---------------------------------------------------------------------------
// Management
// ---------------------------------------------------------------------------

/// Management fee shares accrued on `supply` over `elapsed_secs`.
///
/// Always evaluated against the supply at the call site. Non-decreasing in
/// `elapsed_secs` for a fixed supply and rate.
pub fn management_fee(supply: u64, rate_bps: u32, elapsed_secs: u64) -> Result<u64, MathError> {
    if rate_bps == 0 || elapsed_secs == 0 {
        return Ok(0);
    }

    let rate_time = u128::from(rate_bps)
        .checked_mul(u128::from(elapsed_secs))
        .ok_or(MathError::Overflow("management_fee"))?;
    let denominator = u128::from(BPS_SCALE) * u128::from(SECONDS_PER_YEAR);

    mul_div(supply, rate_time, denominator, Rounding::Ceil, "management_fee")
}

// ---------------------------------------------------------------------------
// Performance
// ---------------------------------------------------------------------------

/// Result of a performance fee evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerformanceFee {
    /// Profit above the high-water mark, in assets, across the whole supply.
    pub profit_assets: u64,
    /// The collector's cut of that profit, in assets.
    pub fee_assets: u64,
    /// `fee_assets` converted to shares (ceil).
    pub fee_shares: u64,
}

/// Inputs for [`performance_fee`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceInputs {
    /// Current assets per whole share.
    pub current_share_value: u64,
    /// Highest share value at which a performance fee was settled.
    pub high_water_mark: u64,
    /// State the fee is converted against; its supply is the fee base.
    pub snapshot: VaultSnapshot,
    /// Performance fee rate.
    pub rate_bps: u32,
    /// Share base units per whole share.
    pub decimals_scale: u64,
    /// Virtual share padding used by conversion.
    pub share_offset: u64,
}

/// Performance fee on share-value gains above the high-water mark.
///
/// Zero when the rate is zero, the supply is zero, or the share value has
/// not moved above the mark. A recovery back to a previous peak is never
/// charged a second time.
pub fn performance_fee(inputs: PerformanceInputs) -> Result<PerformanceFee, MathError> {
    let supply = inputs.snapshot.total_shares;
    if inputs.rate_bps == 0
        || supply == 0
        || inputs.current_share_value <= inputs.high_water_mark
    {
        return Ok(PerformanceFee::default());
    }

    let profit_per_share = inputs.current_share_value - inputs.high_water_mark;
    let profit_assets = narrow(
        mul_div_u128(
            u128::from(profit_per_share),
            u128::from(supply),
            u128::from(inputs.decimals_scale),
            Rounding::Floor,
            "performance_profit",
        )?,
        "performance_profit",
    )?;

    let fee_assets = mul_div(
        profit_assets,
        u128::from(inputs.rate_bps),
        u128::from(BPS_SCALE),
        Rounding::Floor,
        "performance_fee",
    )?;

    let fee_shares = inputs
        .snapshot
        .to_shares(fee_assets, inputs.share_offset, Rounding::Ceil)?;

    Ok(PerformanceFee {
        profit_assets,
        fee_assets,
        fee_shares,
    })
}
