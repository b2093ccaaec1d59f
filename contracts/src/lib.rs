//! # Vaultline Contracts
//!
//! Stateful vault logic built on the pure math in `vaultline-protocol`:
//!
//! - **Fee Governance** - the four active fee rates, the fee collector, and
//!   timelocked proposals that must wait out `FEE_UPDATE_DELAY` before they
//!   can be enforced.
//! - **Vault** - deposit, mint, withdraw and redeem with entry, exit,
//!   management and performance fees, matching previews, and one atomic
//!   ledger commit per operation.
//!
//! ## Design Principles
//!
//! 1. All monetary operations check for overflow. Wrapping arithmetic and
//!    money do not mix.
//! 2. State transitions are explicit: enum variants, not sentinel values.
//! 3. Governance gates every privileged operation.
//! 4. An operation either commits completely or leaves no trace, events
//!    included.

pub mod fee_governance;
pub mod vault;

pub use fee_governance::{FeeParameterStore, GovernanceError, PendingFeeUpdate};
pub use vault::{OperationQuote, PerformanceState, Vault, VaultError};
