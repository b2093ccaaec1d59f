// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Vaultline Protocol - Core Library
//!
//! The arithmetic core of Vaultline tokenized vaults: how many shares an
//! asset amount is worth, how much of it belongs to the fee collector, and
//! how share supply and custody are represented.
//!
//! ## Architecture
//!
//! - **config** - Protocol constants and the per-vault deployment config.
//! - **math** - `u128` mul-div with explicit rounding. The only division.
//! - **conversion** - Share/asset conversion with virtual liquidity padding.
//! - **fees** - Entry, exit, management and performance fee formulas.
//! - **events** - Observable state transitions and fee breakdowns.
//! - **ledger** - Share ledger and valuation provider traits, plus the
//!   in-memory ledger used by the simulator and tests.
//!
//! ## Design Philosophy
//!
//! 1. No floating point anywhere near money.
//! 2. Every rounding decision is explicit and favors the vault over the caller.
//! 3. Every function in `fees` and `conversion` is pure.
//! 4. If it touches money, it has tests. Plural.

pub mod config;
pub mod conversion;
pub mod events;
pub mod fees;
pub mod ledger;
pub mod math;

pub use config::{VaultConfig, BPS_SCALE, FEE_UPDATE_DELAY, MAX_FEE_BPS, SECONDS_PER_YEAR};
pub use conversion::VaultSnapshot;
pub use events::{FeeBreakdown, VaultEvent};
pub use fees::{FeeKind, FeeRates};
pub use math::{MathError, Rounding};
