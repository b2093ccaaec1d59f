//! # Vault Accounting
//!
//! The aggregate that turns deposits, mints, withdrawals and redemptions
//! into ledger effects while charging the four fees.
//!
//! Every operation runs the same pipeline:
//!
//! ```text
//! observe (A, S) ──► accrue management + performance ──► simulated (A, S')
//!                                                             │
//!       convert principal and entry/exit fee against (A, S') ◄┘
//!                                                             │
//!       commit [transfer in | burn] [mint | transfer out] [collector mint]
//!                                                             │
//!    last_collection += whole seconds, high-water mark ◄─────┘
//! ```
//!
//! Previews run the first two stages only and return the same
//! [`OperationQuote`] the real operation commits, so a preview and the
//! operation that follows it at the same instant always agree.
//!
//! Fees are settled in shares minted to the collector. The asset side of
//! the simulated state is therefore never adjusted, only the supply.
//! Management fees accrue before the performance fee, and the performance
//! fee is measured on the share value after management dilution.
//!
//! Management fees are billed per whole second. `last_collection` only
//! moves forward by the seconds actually billed, so a sub-second remainder
//! carries over to the next accrual.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use vaultline_protocol::config::{ConfigError, VaultConfig};
use vaultline_protocol::conversion::VaultSnapshot;
use vaultline_protocol::events::{FeeBreakdown, VaultEvent};
use vaultline_protocol::fees::{self, FeeKind, PerformanceInputs};
use vaultline_protocol::ledger::{LedgerEffect, LedgerError, ShareLedger, ValuationProvider};
use vaultline_protocol::math::{checked_sum, MathError, Rounding};

use crate::fee_governance::{FeeParameterStore, GovernanceError, PendingFeeUpdate};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during vault operations.
///
/// Any error discards the whole operation: no ledger effect, state change
/// or event survives it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// A fee governance rule rejected the call.
    #[error(transparent)]
    Governance(#[from] GovernanceError),

    /// The deposit is above [`Vault::max_deposit`].
    #[error("exceeded max deposit: attempted {assets}, max {max}")]
    ExceededMaxDeposit {
        /// Assets the caller tried to deposit.
        assets: u64,
        /// The bound at that instant.
        max: u64,
    },

    /// The mint is above [`Vault::max_mint`].
    #[error("exceeded max mint: attempted {shares}, max {max}")]
    ExceededMaxMint {
        /// Shares the caller tried to mint.
        shares: u64,
        /// The bound at that instant.
        max: u64,
    },

    /// The withdrawal is above [`Vault::max_withdraw`] for the owner.
    #[error("exceeded max withdraw for {owner}: attempted {assets}, max {max}")]
    ExceededMaxWithdraw {
        /// Share owner.
        owner: String,
        /// Net assets the caller tried to withdraw.
        assets: u64,
        /// The bound at that instant.
        max: u64,
    },

    /// The redemption is above [`Vault::max_redeem`] for the owner.
    #[error("exceeded max redeem for {owner}: attempted {shares}, max {max}")]
    ExceededMaxRedeem {
        /// Share owner.
        owner: String,
        /// Shares the caller tried to redeem.
        shares: u64,
        /// The bound at that instant.
        max: u64,
    },

    /// Someone other than the owner tried to spend the owner's shares.
    #[error("{caller} is not the owner of the shares ({owner})")]
    NotOwner {
        /// Account that initiated the exit.
        caller: String,
        /// Account whose shares would be burned.
        owner: String,
    },

    /// Accrued fees claim more value than the vault holds, and the
    /// valuation provider reports fewer assets than sit idle in custody.
    #[error("insufficient assets for fees: fees claim {fee_assets}, vault holds {available}")]
    InsufficientAssetsForFees {
        /// Asset value of the accrued fee shares (rounded up).
        fee_assets: u64,
        /// Total assets under management.
        available: u64,
    },

    /// Checked arithmetic failed.
    #[error("math error: {0}")]
    Math(#[from] MathError),

    /// The ledger refused the effect batch.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The deployment config is invalid.
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Bookkeeping for the time-based fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceState {
    /// Highest share value at which a performance fee has been settled.
    /// Never decreases.
    pub high_water_mark: u64,
    /// Instant up to which management fees have been billed. Advances in
    /// whole seconds.
    pub last_collection: DateTime<Utc>,
}

/// Everything an operation will do, computed without touching state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperationQuote {
    /// Gross assets pulled in (deposit, mint) or net assets paid out
    /// (withdraw, redeem).
    pub assets: u64,
    /// Shares minted to the receiver or burned from the owner.
    pub shares: u64,
    /// Entry or exit fee in assets.
    pub fee_assets: u64,
    /// Entry or exit fee in shares, minted to the collector.
    pub fee_shares: u64,
    /// Management and performance fee shares settled by the operation.
    pub accrued: FeeBreakdown,
}

impl OperationQuote {
    /// Total shares the collector receives if the operation executes.
    pub fn collector_shares(&self) -> Result<u64, MathError> {
        checked_sum(
            &[self.accrued.accrued()?, self.fee_shares],
            "collector_shares",
        )
    }
}

/// Management and performance fees owed at one instant and the state they
/// imply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Accrual {
    observed: VaultSnapshot,
    simulated: VaultSnapshot,
    breakdown: FeeBreakdown,
    high_water_mark: u64,
    billed_until: DateTime<Utc>,
}

/// A tokenized vault over a share ledger and a valuation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vault<L, V> {
    config: VaultConfig,
    fees: FeeParameterStore,
    performance: PerformanceState,
    ledger: L,
    valuation: V,
    #[serde(skip)]
    events: Vec<VaultEvent>,
}

impl<L: ShareLedger, V: ValuationProvider> Vault<L, V> {
    /// Creates a vault. The high-water mark starts at the current share
    /// value, which for an empty vault is one asset unit per whole share.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] for an invalid config and
    /// [`VaultError::Governance`] if the fee store rejects it.
    pub fn new(
        config: VaultConfig,
        ledger: L,
        valuation: V,
        now: DateTime<Utc>,
    ) -> Result<Self, VaultError> {
        config.validate()?;
        let fees = FeeParameterStore::from_config(&config)?;

        let observed = VaultSnapshot::new(
            valuation.total_assets(ledger.idle_assets())?,
            ledger.total_shares(),
        );
        let high_water_mark =
            observed.share_value(config.decimals_scale(), config.share_offset())?;

        info!(
            governance = %config.governance,
            collector = %config.fee_collector,
            high_water_mark,
            "vault created"
        );

        Ok(Self {
            config,
            fees,
            performance: PerformanceState {
                high_water_mark,
                last_collection: now,
            },
            ledger,
            valuation,
            events: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Deployment config.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Fee rates, principals and pending updates.
    pub fn fees(&self) -> &FeeParameterStore {
        &self.fees
    }

    /// High-water mark and last collection time.
    pub fn performance(&self) -> &PerformanceState {
        &self.performance
    }

    /// Underlying share ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Mutable access to the ledger, for host-side funding.
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    /// Valuation provider.
    pub fn valuation(&self) -> &V {
        &self.valuation
    }

    /// Mutable access to the valuation provider, for reporting gains and losses.
    pub fn valuation_mut(&mut self) -> &mut V {
        &mut self.valuation
    }

    /// Assets under management as reported by the valuation provider.
    pub fn total_assets(&self) -> Result<u64, VaultError> {
        Ok(self.observe()?.total_assets)
    }

    /// Outstanding shares.
    pub fn total_shares(&self) -> u64 {
        self.ledger.total_shares()
    }

    /// Assets per whole share at the observed state, before pending fees.
    pub fn share_value(&self) -> Result<u64, VaultError> {
        Ok(self
            .observe()?
            .share_value(self.config.decimals_scale(), self.config.share_offset())?)
    }

    /// Shares `assets` are worth after pending fees, without entry fee.
    pub fn convert_to_shares(&self, assets: u64, now: DateTime<Utc>) -> Result<u64, VaultError> {
        let accrual = self.accrue(now)?;
        Ok(accrual
            .simulated
            .to_shares(assets, self.config.share_offset(), Rounding::Floor)?)
    }

    /// Assets `shares` are worth after pending fees, without exit fee.
    pub fn convert_to_assets(&self, shares: u64, now: DateTime<Utc>) -> Result<u64, VaultError> {
        let accrual = self.accrue(now)?;
        Ok(accrual
            .simulated
            .to_assets(shares, self.config.share_offset(), Rounding::Floor)?)
    }

    /// Active rate for `kind`.
    pub fn fee_rate(&self, kind: FeeKind) -> u32 {
        self.fees.rate(kind)
    }

    /// Pending update for `kind`.
    pub fn pending_fee(&self, kind: FeeKind) -> &PendingFeeUpdate {
        self.fees.pending(kind)
    }

    /// See [`PerformanceState::high_water_mark`].
    pub fn high_water_mark(&self) -> u64 {
        self.performance.high_water_mark
    }

    /// See [`PerformanceState::last_collection`].
    pub fn last_collection(&self) -> DateTime<Utc> {
        self.performance.last_collection
    }

    /// Current fee collector.
    pub fn fee_collector(&self) -> &str {
        self.fees.fee_collector()
    }

    /// Current governance principal.
    pub fn governance(&self) -> &str {
        self.fees.governance()
    }

    /// Management and performance fee shares that would be settled at `now`.
    pub fn accrued_fees(&self, now: DateTime<Utc>) -> Result<FeeBreakdown, VaultError> {
        Ok(self.accrue(now)?.breakdown)
    }

    /// Events recorded since the last drain.
    pub fn events(&self) -> &[VaultEvent] {
        &self.events
    }

    /// Takes all recorded events.
    pub fn drain_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Bounds
    // -----------------------------------------------------------------------

    /// Largest deposit accepted right now: the headroom under the deposit
    /// cap, or unlimited without one.
    pub fn max_deposit(&self) -> Result<u64, VaultError> {
        match self.config.deposit_cap {
            Some(cap) => Ok(cap.saturating_sub(self.total_assets()?)),
            None => Ok(u64::MAX),
        }
    }

    /// Largest mint accepted at `now`: the shares [`max_deposit`](Self::max_deposit)
    /// would buy, or unlimited without a cap.
    pub fn max_mint(&self, now: DateTime<Utc>) -> Result<u64, VaultError> {
        match self.config.deposit_cap {
            Some(_) => Ok(self.quote_deposit(self.max_deposit()?, now)?.shares),
            None => Ok(u64::MAX),
        }
    }

    /// Largest redemption `owner` can make at `now`: their balance, limited
    /// to the shares the idle assets can pay out.
    pub fn max_redeem(&self, owner: &str, now: DateTime<Utc>) -> Result<u64, VaultError> {
        let accrual = self.accrue(now)?;
        let liquid = accrual.simulated.to_shares(
            self.ledger.idle_assets(),
            self.config.share_offset(),
            Rounding::Floor,
        )?;
        Ok(self.ledger.share_balance(owner).min(liquid))
    }

    /// Largest net withdrawal `owner` can make at `now`: the proceeds of
    /// [`max_redeem`](Self::max_redeem).
    pub fn max_withdraw(&self, owner: &str, now: DateTime<Utc>) -> Result<u64, VaultError> {
        let shares = self.max_redeem(owner, now)?;
        Ok(self.quote_redeem(shares, now)?.assets)
    }

    // -----------------------------------------------------------------------
    // Quotes & Previews
    // -----------------------------------------------------------------------

    /// Full plan for depositing `assets` (fee included) at `now`.
    pub fn quote_deposit(&self, assets: u64, now: DateTime<Utc>) -> Result<OperationQuote, VaultError> {
        Ok(self.plan_deposit(assets, now)?.1)
    }

    /// Full plan for minting `shares` at `now`.
    pub fn quote_mint(&self, shares: u64, now: DateTime<Utc>) -> Result<OperationQuote, VaultError> {
        Ok(self.plan_mint(shares, now)?.1)
    }

    /// Full plan for withdrawing `assets` net of fee at `now`.
    pub fn quote_withdraw(&self, assets: u64, now: DateTime<Utc>) -> Result<OperationQuote, VaultError> {
        Ok(self.plan_withdraw(assets, now)?.1)
    }

    /// Full plan for redeeming `shares` at `now`.
    pub fn quote_redeem(&self, shares: u64, now: DateTime<Utc>) -> Result<OperationQuote, VaultError> {
        Ok(self.plan_redeem(shares, now)?.1)
    }

    /// Shares a deposit of `assets` would mint to the receiver.
    pub fn preview_deposit(&self, assets: u64, now: DateTime<Utc>) -> Result<u64, VaultError> {
        Ok(self.quote_deposit(assets, now)?.shares)
    }

    /// Assets, fee included, a mint of `shares` would pull in.
    pub fn preview_mint(&self, shares: u64, now: DateTime<Utc>) -> Result<u64, VaultError> {
        Ok(self.quote_mint(shares, now)?.assets)
    }

    /// Shares a withdrawal of `assets` would burn.
    pub fn preview_withdraw(&self, assets: u64, now: DateTime<Utc>) -> Result<u64, VaultError> {
        Ok(self.quote_withdraw(assets, now)?.shares)
    }

    /// Net assets a redemption of `shares` would pay out.
    pub fn preview_redeem(&self, shares: u64, now: DateTime<Utc>) -> Result<u64, VaultError> {
        Ok(self.quote_redeem(shares, now)?.assets)
    }

    // -----------------------------------------------------------------------
    // User Operations
    // -----------------------------------------------------------------------

    /// Deposits `assets` from `caller`, minting shares to `receiver`.
    /// Returns the shares minted to the receiver.
    pub fn deposit(
        &mut self,
        caller: &str,
        assets: u64,
        receiver: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, VaultError> {
        let result = self.try_deposit(caller, assets, receiver, now);
        logged("deposit", result)
    }

    /// Mints exactly `shares` to `receiver`, pulling the required assets
    /// from `caller`. Returns the assets pulled in.
    pub fn mint(
        &mut self,
        caller: &str,
        shares: u64,
        receiver: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, VaultError> {
        let result = self.try_mint(caller, shares, receiver, now);
        logged("mint", result)
    }

    /// Pays exactly `assets` to `receiver`, burning the required shares
    /// from `owner`. Returns the shares burned.
    pub fn withdraw(
        &mut self,
        caller: &str,
        assets: u64,
        receiver: &str,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, VaultError> {
        let result = self.try_withdraw(caller, assets, receiver, owner, now);
        logged("withdraw", result)
    }

    /// Burns `shares` from `owner` and pays the net proceeds to `receiver`.
    /// Returns the assets paid out.
    pub fn redeem(
        &mut self,
        caller: &str,
        shares: u64,
        receiver: &str,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, VaultError> {
        let result = self.try_redeem(caller, shares, receiver, owner, now);
        logged("redeem", result)
    }

    // -----------------------------------------------------------------------
    // Governance
    // -----------------------------------------------------------------------

    /// Mints accrued management and performance fees to the collector.
    /// Returns the shares minted; zero when called again at the same instant.
    pub fn collect_fees(&mut self, caller: &str, now: DateTime<Utc>) -> Result<u64, VaultError> {
        let result = self
            .fees
            .ensure_governance(caller, "collect fees")
            .map_err(VaultError::from)
            .and_then(|()| self.settle(now));
        logged("collect_fees", result)
    }

    /// Proposes a new rate for `kind`. See [`FeeParameterStore::propose_fee`].
    pub fn propose_fee(
        &mut self,
        caller: &str,
        kind: FeeKind,
        rate_bps: u32,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        let result = self
            .fees
            .propose_fee(caller, kind, rate_bps, now)
            .map(|event| self.events.push(event))
            .map_err(VaultError::from);
        logged("propose_fee", result)
    }

    /// Activates the pending rate for `kind` and returns it. Management and
    /// performance changes first settle what accrued under the old rate.
    pub fn enforce_fee(
        &mut self,
        caller: &str,
        kind: FeeKind,
        now: DateTime<Utc>,
    ) -> Result<u32, VaultError> {
        let result = self.try_enforce_fee(caller, kind, now);
        logged("enforce_fee", result)
    }

    /// Replaces the fee collector after settling accrued fees to the
    /// outgoing one.
    pub fn set_fee_collector(
        &mut self,
        caller: &str,
        collector: &str,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        let result = self.try_set_fee_collector(caller, collector, now);
        logged("set_fee_collector", result)
    }

    /// Hands governance to a new principal.
    pub fn transfer_governance(&mut self, caller: &str, governance: &str) -> Result<(), VaultError> {
        let result = self
            .fees
            .transfer_governance(caller, governance)
            .map(|event| self.events.push(event))
            .map_err(VaultError::from);
        logged("transfer_governance", result)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn observe(&self) -> Result<VaultSnapshot, VaultError> {
        let total_assets = self.valuation.total_assets(self.ledger.idle_assets())?;
        Ok(VaultSnapshot::new(total_assets, self.ledger.total_shares()))
    }

    /// Fees only accrue while time moves forward. At or before the last
    /// collection the simulated state is the observed one.
    fn accrue(&self, now: DateTime<Utc>) -> Result<Accrual, VaultError> {
        let idle = self.ledger.idle_assets();
        let observed = VaultSnapshot::new(
            self.valuation.total_assets(idle)?,
            self.ledger.total_shares(),
        );
        let last_collection = self.performance.last_collection;
        let mut accrual = Accrual {
            observed,
            simulated: observed,
            breakdown: FeeBreakdown::default(),
            high_water_mark: self.performance.high_water_mark,
            billed_until: last_collection,
        };
        if now <= last_collection {
            return Ok(accrual);
        }

        let whole_secs = (now - last_collection).num_seconds();
        let elapsed_secs = u64::try_from(whole_secs).unwrap_or(0);
        accrual.billed_until = last_collection
            .checked_add_signed(Duration::seconds(whole_secs))
            .unwrap_or(last_collection);
        let scale = self.config.decimals_scale();
        let offset = self.config.share_offset();

        let management_shares = fees::management_fee(
            observed.total_shares,
            self.fees.rate(FeeKind::Management),
            elapsed_secs,
        )?;
        let after_management = observed.with_minted(management_shares)?;

        let performance = fees::performance_fee(PerformanceInputs {
            current_share_value: after_management.share_value(scale, offset)?,
            high_water_mark: self.performance.high_water_mark,
            snapshot: after_management,
            rate_bps: self.fees.rate(FeeKind::Performance),
            decimals_scale: scale,
            share_offset: offset,
        })?;
        let simulated = after_management.with_minted(performance.fee_shares)?;

        if performance.fee_shares > 0 {
            let settled_value = simulated.share_value(scale, offset)?;
            accrual.high_water_mark = accrual.high_water_mark.max(settled_value);
        }

        accrual.simulated = simulated;
        accrual.breakdown = FeeBreakdown {
            management_shares,
            performance_shares: performance.fee_shares,
            ..FeeBreakdown::default()
        };

        // Fee shares on a vault with no assets are worthless but harmless.
        // They only signal a fault when the provider undercounts custody.
        let accrued = accrual.breakdown.accrued()?;
        if accrued > 0 && observed.total_assets < idle {
            let fee_assets = simulated.to_assets(accrued, offset, Rounding::Ceil)?;
            if fee_assets > observed.total_assets {
                return Err(VaultError::InsufficientAssetsForFees {
                    fee_assets,
                    available: observed.total_assets,
                });
            }
        }

        Ok(accrual)
    }

    fn plan_deposit(
        &self,
        assets: u64,
        now: DateTime<Utc>,
    ) -> Result<(Accrual, OperationQuote), VaultError> {
        let accrual = self.accrue(now)?;
        let offset = self.config.share_offset();

        let fee_assets = fees::fee_on_total(assets, self.fees.rate(FeeKind::Entry))?;
        let net = assets
            .checked_sub(fee_assets)
            .ok_or(MathError::Overflow("deposit_net"))?;
        let shares = accrual.simulated.to_shares(net, offset, Rounding::Floor)?;
        let fee_shares = accrual
            .simulated
            .to_shares(fee_assets, offset, Rounding::Floor)?;

        Ok((
            accrual,
            OperationQuote {
                assets,
                shares,
                fee_assets,
                fee_shares,
                accrued: accrual.breakdown,
            },
        ))
    }

    fn plan_mint(
        &self,
        shares: u64,
        now: DateTime<Utc>,
    ) -> Result<(Accrual, OperationQuote), VaultError> {
        let accrual = self.accrue(now)?;
        let offset = self.config.share_offset();

        let net = accrual.simulated.to_assets(shares, offset, Rounding::Ceil)?;
        let fee_assets = fees::fee_on_raw(net, self.fees.rate(FeeKind::Entry))?;
        let assets = net
            .checked_add(fee_assets)
            .ok_or(MathError::Overflow("mint_assets"))?;
        let fee_shares = accrual
            .simulated
            .to_shares(fee_assets, offset, Rounding::Floor)?;

        Ok((
            accrual,
            OperationQuote {
                assets,
                shares,
                fee_assets,
                fee_shares,
                accrued: accrual.breakdown,
            },
        ))
    }

    fn plan_withdraw(
        &self,
        assets: u64,
        now: DateTime<Utc>,
    ) -> Result<(Accrual, OperationQuote), VaultError> {
        let accrual = self.accrue(now)?;
        let offset = self.config.share_offset();

        let fee_assets = fees::fee_on_raw(assets, self.fees.rate(FeeKind::Exit))?;
        let gross = assets
            .checked_add(fee_assets)
            .ok_or(MathError::Overflow("withdraw_gross"))?;
        let shares = accrual.simulated.to_shares(gross, offset, Rounding::Ceil)?;
        let fee_shares = accrual
            .simulated
            .to_shares(fee_assets, offset, Rounding::Floor)?;

        Ok((
            accrual,
            OperationQuote {
                assets,
                shares,
                fee_assets,
                fee_shares,
                accrued: accrual.breakdown,
            },
        ))
    }

    fn plan_redeem(
        &self,
        shares: u64,
        now: DateTime<Utc>,
    ) -> Result<(Accrual, OperationQuote), VaultError> {
        let accrual = self.accrue(now)?;
        let offset = self.config.share_offset();

        let gross = accrual.simulated.to_assets(shares, offset, Rounding::Floor)?;
        let fee_assets = fees::fee_on_total(gross, self.fees.rate(FeeKind::Exit))?;
        let assets = gross
            .checked_sub(fee_assets)
            .ok_or(MathError::Overflow("redeem_net"))?;
        let fee_shares = accrual
            .simulated
            .to_shares(fee_assets, offset, Rounding::Floor)?;

        Ok((
            accrual,
            OperationQuote {
                assets,
                shares,
                fee_assets,
                fee_shares,
                accrued: accrual.breakdown,
            },
        ))
    }

    fn try_deposit(
        &mut self,
        caller: &str,
        assets: u64,
        receiver: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, VaultError> {
        let max = self.max_deposit()?;
        if assets > max {
            return Err(VaultError::ExceededMaxDeposit { assets, max });
        }

        let (accrual, quote) = self.plan_deposit(assets, now)?;
        debug!(caller, receiver, ?quote, "deposit planned");
        self.execute_entry(caller, receiver, &accrual, &quote, now)?;
        Ok(quote.shares)
    }

    fn try_mint(
        &mut self,
        caller: &str,
        shares: u64,
        receiver: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, VaultError> {
        let max = self.max_mint(now)?;
        if shares > max {
            return Err(VaultError::ExceededMaxMint { shares, max });
        }

        let (accrual, quote) = self.plan_mint(shares, now)?;
        debug!(caller, receiver, ?quote, "mint planned");
        self.execute_entry(caller, receiver, &accrual, &quote, now)?;
        Ok(quote.assets)
    }

    fn try_withdraw(
        &mut self,
        caller: &str,
        assets: u64,
        receiver: &str,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, VaultError> {
        ensure_owner(caller, owner)?;
        let max = self.max_withdraw(owner, now)?;
        if assets > max {
            return Err(VaultError::ExceededMaxWithdraw {
                owner: owner.to_string(),
                assets,
                max,
            });
        }

        let (accrual, quote) = self.plan_withdraw(assets, now)?;
        debug!(caller, receiver, owner, ?quote, "withdraw planned");
        self.execute_exit(caller, receiver, owner, &accrual, &quote, now)?;
        Ok(quote.shares)
    }

    fn try_redeem(
        &mut self,
        caller: &str,
        shares: u64,
        receiver: &str,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, VaultError> {
        ensure_owner(caller, owner)?;
        let max = self.max_redeem(owner, now)?;
        if shares > max {
            return Err(VaultError::ExceededMaxRedeem {
                owner: owner.to_string(),
                shares,
                max,
            });
        }

        let (accrual, quote) = self.plan_redeem(shares, now)?;
        debug!(caller, receiver, owner, ?quote, "redeem planned");
        self.execute_exit(caller, receiver, owner, &accrual, &quote, now)?;
        Ok(quote.assets)
    }

    /// Transfer in, mint to receiver, then the batched collector mint.
    fn execute_entry(
        &mut self,
        caller: &str,
        receiver: &str,
        accrual: &Accrual,
        quote: &OperationQuote,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        let breakdown = FeeBreakdown {
            entry_shares: quote.fee_shares,
            ..accrual.breakdown
        };
        let collected = breakdown.total()?;
        let effects = effect_batch(vec![
            LedgerEffect::TransferIn {
                from: caller.to_string(),
                amount: quote.assets,
            },
            LedgerEffect::Mint {
                to: receiver.to_string(),
                shares: quote.shares,
            },
            LedgerEffect::Mint {
                to: self.fees.fee_collector().to_string(),
                shares: collected,
            },
        ]);
        self.ledger.commit(&effects)?;

        self.events.push(VaultEvent::Deposit {
            caller: caller.to_string(),
            receiver: receiver.to_string(),
            assets: quote.assets,
            shares: quote.shares,
        });
        self.finish(now, accrual, breakdown, collected);
        Ok(())
    }

    /// Burn from owner, transfer out, then the batched collector mint.
    fn execute_exit(
        &mut self,
        caller: &str,
        receiver: &str,
        owner: &str,
        accrual: &Accrual,
        quote: &OperationQuote,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        let breakdown = FeeBreakdown {
            exit_shares: quote.fee_shares,
            ..accrual.breakdown
        };
        let collected = breakdown.total()?;
        let effects = effect_batch(vec![
            LedgerEffect::Burn {
                from: owner.to_string(),
                shares: quote.shares,
            },
            LedgerEffect::TransferOut {
                to: receiver.to_string(),
                amount: quote.assets,
            },
            LedgerEffect::Mint {
                to: self.fees.fee_collector().to_string(),
                shares: collected,
            },
        ]);
        self.ledger.commit(&effects)?;

        self.events.push(VaultEvent::Withdraw {
            caller: caller.to_string(),
            receiver: receiver.to_string(),
            owner: owner.to_string(),
            assets: quote.assets,
            shares: quote.shares,
        });
        self.finish(now, accrual, breakdown, collected);
        Ok(())
    }

    /// Mints accrued time-based fees to the current collector.
    fn settle(&mut self, now: DateTime<Utc>) -> Result<u64, VaultError> {
        let accrual = self.accrue(now)?;
        let collected = accrual.breakdown.accrued()?;
        let effects = effect_batch(vec![LedgerEffect::Mint {
            to: self.fees.fee_collector().to_string(),
            shares: collected,
        }]);
        self.ledger.commit(&effects)?;
        self.finish(now, &accrual, accrual.breakdown, collected);
        Ok(collected)
    }

    fn try_enforce_fee(
        &mut self,
        caller: &str,
        kind: FeeKind,
        now: DateTime<Utc>,
    ) -> Result<u32, VaultError> {
        self.fees.check_enforceable(caller, kind, now)?;
        if kind.is_time_based() {
            self.settle(now)?;
        }
        let event = self.fees.enforce_fee(caller, kind, now)?;
        self.events.push(event);
        Ok(self.fees.rate(kind))
    }

    fn try_set_fee_collector(
        &mut self,
        caller: &str,
        collector: &str,
        now: DateTime<Utc>,
    ) -> Result<(), VaultError> {
        self.fees.ensure_governance(caller, "set the fee collector")?;
        if collector.trim().is_empty() {
            return Err(GovernanceError::InvalidFeeCollector.into());
        }
        self.settle(now)?;
        let event = self.fees.set_fee_collector(caller, collector)?;
        self.events.push(event);
        Ok(())
    }

    /// Post-commit bookkeeping. Cannot fail, so a committed batch is never
    /// left without its state update.
    fn finish(
        &mut self,
        now: DateTime<Utc>,
        accrual: &Accrual,
        breakdown: FeeBreakdown,
        collected: u64,
    ) {
        if accrual.billed_until > self.performance.last_collection {
            self.performance.last_collection = accrual.billed_until;
        }
        if accrual.high_water_mark > self.performance.high_water_mark {
            info!(
                previous = self.performance.high_water_mark,
                high_water_mark = accrual.high_water_mark,
                "high-water mark raised"
            );
            self.performance.high_water_mark = accrual.high_water_mark;
        }

        if collected > 0 {
            let collector = self.fees.fee_collector().to_string();
            info!(
                %collector,
                collected,
                management = breakdown.management_shares,
                performance = breakdown.performance_shares,
                entry = breakdown.entry_shares,
                exit = breakdown.exit_shares,
                "fees collected"
            );
            self.events.push(VaultEvent::FeeCollected {
                collector,
                total_shares: collected,
                breakdown,
                timestamp: now,
            });
        }
    }
}

fn ensure_owner(caller: &str, owner: &str) -> Result<(), VaultError> {
    if caller != owner {
        return Err(VaultError::NotOwner {
            caller: caller.to_string(),
            owner: owner.to_string(),
        });
    }
    Ok(())
}

/// Drops zero-amount effects, keeping the order of the rest.
fn effect_batch(mut effects: Vec<LedgerEffect>) -> Vec<LedgerEffect> {
    effects.retain(|effect| match effect {
        LedgerEffect::TransferIn { amount, .. } | LedgerEffect::TransferOut { amount, .. } => {
            *amount > 0
        }
        LedgerEffect::Mint { shares, .. } | LedgerEffect::Burn { shares, .. } => *shares > 0,
    });
    effects
}

fn logged<T>(operation: &'static str, result: Result<T, VaultError>) -> Result<T, VaultError> {
    if let Err(error) = &result {
        warn!(operation, %error, "vault operation rejected");
    }
    result
}
