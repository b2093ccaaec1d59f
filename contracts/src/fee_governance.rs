//! # Fee Governance Contract
//!
//! Owns the four active fee rates, the fee collector, and one timelocked
//! pending update per fee kind. The lifecycle of a rate change is:
//!
//! 1. **Propose** - governance submits a new rate. It becomes enforceable
//!    after [`FEE_UPDATE_DELAY`]. Proposing again overwrites the previous
//!    proposal and restarts the clock.
//! 2. **Enforce** - once the timelock has elapsed, governance copies the
//!    pending rate into the active set and the pending slot is cleared.
//!
//! ```text
//!   ┌──────┐  propose   ┌─────────────────────┐  enforce (now >= activation)
//!   │ None │ ─────────► │ Pending(rate, time) │ ───────────────────────────┐
//!   └──────┘            └─────────────────────┘                            │
//!      ▲                    │  ▲ propose (overwrite)                       │
//!      │                    └──┘                                           │
//!      └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Settling time-based fees before a management or performance rate change
//! is the vault's job; this contract only guards sequencing and bounds.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use vaultline_protocol::config::{VaultConfig, FEE_UPDATE_DELAY, MAX_FEE_BPS};
use vaultline_protocol::events::VaultEvent;
use vaultline_protocol::fees::{FeeKind, FeeRates};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during fee governance operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernanceError {
    /// The caller is not the governance principal.
    #[error("unauthorized: {caller} may not {action}")]
    Unauthorized {
        /// The account that attempted the operation.
        caller: String,
        /// What it attempted.
        action: &'static str,
    },

    /// The proposed rate is above [`MAX_FEE_BPS`].
    #[error("invalid {kind} fee: {rate_bps} bps exceeds maximum of {max} bps")]
    InvalidFee {
        /// Which fee.
        kind: FeeKind,
        /// The rejected rate.
        rate_bps: u32,
        /// The maximum allowed rate.
        max: u32,
    },

    /// Enforcement was attempted without a pending proposal.
    #[error("no pending {0} fee update")]
    NoPendingFeeUpdate(FeeKind),

    /// Enforcement was attempted before the timelock elapsed.
    #[error("{kind} fee update not active until {activation} (now {now})")]
    ActivationTimestampNotReached {
        /// Which fee.
        kind: FeeKind,
        /// Time of the attempt.
        now: DateTime<Utc>,
        /// Earliest enforcement time.
        activation: DateTime<Utc>,
    },

    /// The activation time of a proposal falls outside the representable
    /// calendar.
    #[error("{kind} fee proposal at {now} has no representable activation time")]
    ActivationOutOfRange {
        /// Which fee.
        kind: FeeKind,
        /// Time of the proposal.
        now: DateTime<Utc>,
    },

    /// The fee collector identifier is empty.
    #[error("invalid fee collector: identifier must not be empty")]
    InvalidFeeCollector,

    /// The governance identifier is empty.
    #[error("invalid governance: identifier must not be empty")]
    InvalidGovernance,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Timelocked update waiting to replace an active rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PendingFeeUpdate {
    /// Nothing proposed.
    #[default]
    None,
    /// A rate waiting out the timelock.
    Pending {
        /// Proposed rate.
        rate_bps: u32,
        /// Earliest enforcement time.
        activation: DateTime<Utc>,
    },
}

impl PendingFeeUpdate {
    /// Returns `true` if a proposal is waiting.
    pub fn is_pending(&self) -> bool {
        matches!(self, PendingFeeUpdate::Pending { .. })
    }

    /// The proposed rate, if any.
    pub fn rate_bps(&self) -> Option<u32> {
        match self {
            PendingFeeUpdate::Pending { rate_bps, .. } => Some(*rate_bps),
            PendingFeeUpdate::None => None,
        }
    }

    /// The activation time, if any.
    pub fn activation(&self) -> Option<DateTime<Utc>> {
        match self {
            PendingFeeUpdate::Pending { activation, .. } => Some(*activation),
            PendingFeeUpdate::None => None,
        }
    }
}

/// One pending slot per fee kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
struct PendingUpdates {
    entry: PendingFeeUpdate,
    exit: PendingFeeUpdate,
    management: PendingFeeUpdate,
    performance: PendingFeeUpdate,
}

impl PendingUpdates {
    fn get(&self, kind: FeeKind) -> &PendingFeeUpdate {
        match kind {
            FeeKind::Entry => &self.entry,
            FeeKind::Exit => &self.exit,
            FeeKind::Management => &self.management,
            FeeKind::Performance => &self.performance,
        }
    }

    fn slot_mut(&mut self, kind: FeeKind) -> &mut PendingFeeUpdate {
        match kind {
            FeeKind::Entry => &mut self.entry,
            FeeKind::Exit => &mut self.exit,
            FeeKind::Management => &mut self.management,
            FeeKind::Performance => &mut self.performance,
        }
    }
}

/// Active fee configuration plus the timelocked proposals against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeParameterStore {
    /// Principal allowed to propose, enforce and collect.
    governance: String,
    /// Account that receives fee shares.
    fee_collector: String,
    /// Currently active rates.
    rates: FeeRates,
    /// Timelocked proposals.
    pending: PendingUpdates,
}

impl FeeParameterStore {
    /// Creates a store with the given principals and initial rates.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::InvalidGovernance`] or
    /// [`GovernanceError::InvalidFeeCollector`] for empty principals and
    /// [`GovernanceError::InvalidFee`] for the first out-of-range rate.
    pub fn new(
        governance: impl Into<String>,
        fee_collector: impl Into<String>,
        rates: FeeRates,
    ) -> Result<Self, GovernanceError> {
        let governance = governance.into();
        let fee_collector = fee_collector.into();

        if governance.trim().is_empty() {
            return Err(GovernanceError::InvalidGovernance);
        }
        if fee_collector.trim().is_empty() {
            return Err(GovernanceError::InvalidFeeCollector);
        }
        if !rates.within_bounds() {
            let kind = FeeKind::ALL
                .into_iter()
                .find(|k| rates.get(*k) > MAX_FEE_BPS)
                .unwrap_or(FeeKind::Entry);
            return Err(GovernanceError::InvalidFee {
                kind,
                rate_bps: rates.get(kind),
                max: MAX_FEE_BPS,
            });
        }

        Ok(Self {
            governance,
            fee_collector,
            rates,
            pending: PendingUpdates::default(),
        })
    }

    /// Creates a store from a vault's deployment config.
    pub fn from_config(config: &VaultConfig) -> Result<Self, GovernanceError> {
        Self::new(
            config.governance.clone(),
            config.fee_collector.clone(),
            config.initial_rates,
        )
    }

    // -- Reads --

    /// The governance principal.
    pub fn governance(&self) -> &str {
        &self.governance
    }

    /// The current fee collector.
    pub fn fee_collector(&self) -> &str {
        &self.fee_collector
    }

    /// All active rates.
    pub fn rates(&self) -> &FeeRates {
        &self.rates
    }

    /// Active rate for `kind`.
    pub fn rate(&self, kind: FeeKind) -> u32 {
        self.rates.get(kind)
    }

    /// Pending update for `kind`.
    pub fn pending(&self, kind: FeeKind) -> &PendingFeeUpdate {
        self.pending.get(kind)
    }

    // -- Gating --

    /// Fails unless `caller` is the governance principal.
    pub fn ensure_governance(
        &self,
        caller: &str,
        action: &'static str,
    ) -> Result<(), GovernanceError> {
        if caller != self.governance {
            return Err(GovernanceError::Unauthorized {
                caller: caller.to_string(),
                action,
            });
        }
        Ok(())
    }

    // -- Transitions --

    /// Proposes `rate_bps` for `kind`, enforceable from `now + FEE_UPDATE_DELAY`.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::Unauthorized`] for non-governance callers,
    /// [`GovernanceError::InvalidFee`] for rates above [`MAX_FEE_BPS`], and
    /// [`GovernanceError::ActivationOutOfRange`] when `now` is too close to
    /// the end of the calendar for the timelock to fit.
    pub fn propose_fee(
        &mut self,
        caller: &str,
        kind: FeeKind,
        rate_bps: u32,
        now: DateTime<Utc>,
    ) -> Result<VaultEvent, GovernanceError> {
        self.ensure_governance(caller, "propose fees")?;

        if rate_bps > MAX_FEE_BPS {
            return Err(GovernanceError::InvalidFee {
                kind,
                rate_bps,
                max: MAX_FEE_BPS,
            });
        }

        let activation = now
            .checked_add_signed(Duration::seconds(FEE_UPDATE_DELAY.as_secs() as i64))
            .ok_or(GovernanceError::ActivationOutOfRange { kind, now })?;
        let slot = self.pending.slot_mut(kind);
        if let Some(previous) = slot.rate_bps() {
            info!(%kind, previous, "discarding earlier fee proposal");
        }
        *slot = PendingFeeUpdate::Pending {
            rate_bps,
            activation,
        };

        info!(%kind, rate_bps, %activation, "fee update proposed");
        Ok(VaultEvent::FeeProposed {
            kind,
            rate_bps,
            activation,
        })
    }

    /// Returns the pending rate for `kind` if it may be enforced at `now`,
    /// without changing anything.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::Unauthorized`],
    /// [`GovernanceError::NoPendingFeeUpdate`] or
    /// [`GovernanceError::ActivationTimestampNotReached`].
    pub fn check_enforceable(
        &self,
        caller: &str,
        kind: FeeKind,
        now: DateTime<Utc>,
    ) -> Result<u32, GovernanceError> {
        self.ensure_governance(caller, "enforce fees")?;

        match *self.pending.get(kind) {
            PendingFeeUpdate::None => Err(GovernanceError::NoPendingFeeUpdate(kind)),
            PendingFeeUpdate::Pending {
                activation,
                rate_bps,
            } => {
                if now < activation {
                    return Err(GovernanceError::ActivationTimestampNotReached {
                        kind,
                        now,
                        activation,
                    });
                }
                Ok(rate_bps)
            }
        }
    }

    /// Activates the pending rate for `kind` and clears the pending slot.
    ///
    /// # Errors
    ///
    /// Same as [`check_enforceable`](Self::check_enforceable).
    pub fn enforce_fee(
        &mut self,
        caller: &str,
        kind: FeeKind,
        now: DateTime<Utc>,
    ) -> Result<VaultEvent, GovernanceError> {
        let rate_bps = self.check_enforceable(caller, kind, now)?;

        let previous = self.rates.get(kind);
        self.rates.set(kind, rate_bps);
        *self.pending.slot_mut(kind) = PendingFeeUpdate::None;

        info!(%kind, previous, rate_bps, "fee update enforced");
        Ok(VaultEvent::FeeEnforced { kind, rate_bps })
    }

    /// Replaces the fee collector.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::Unauthorized`] for non-governance callers
    /// and [`GovernanceError::InvalidFeeCollector`] for an empty identifier.
    pub fn set_fee_collector(
        &mut self,
        caller: &str,
        collector: &str,
    ) -> Result<VaultEvent, GovernanceError> {
        self.ensure_governance(caller, "set the fee collector")?;
        if collector.trim().is_empty() {
            return Err(GovernanceError::InvalidFeeCollector);
        }

        let previous = std::mem::replace(&mut self.fee_collector, collector.to_string());
        info!(%previous, collector, "fee collector updated");
        Ok(VaultEvent::FeeCollectorUpdated {
            previous,
            collector: collector.to_string(),
        })
    }

    /// Hands governance to a new principal.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::Unauthorized`] for non-governance callers
    /// and [`GovernanceError::InvalidGovernance`] for an empty identifier.
    pub fn transfer_governance(
        &mut self,
        caller: &str,
        governance: &str,
    ) -> Result<VaultEvent, GovernanceError> {
        self.ensure_governance(caller, "transfer governance")?;
        if governance.trim().is_empty() {
            return Err(GovernanceError::InvalidGovernance);
        }

        let previous = std::mem::replace(&mut self.governance, governance.to_string());
        info!(%previous, governance, "governance transferred");
        Ok(VaultEvent::GovernanceTransferred {
            previous,
            governance: governance.to_string(),
        })
    }
}
