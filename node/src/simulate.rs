//! # Scenario Simulation
//!
//! Replays a TOML scenario of timed steps against an in-memory vault and
//! produces a JSON-serializable report. A scenario looks like:
//!
//! ```toml
//! start = "2026-01-01T00:00:00Z"
//!
//! [[step]]
//! action = "fund"
//! account = "alice"
//! amount = 1000000
//!
//! [[step]]
//! action = "deposit"
//! caller = "alice"
//! assets = 1000
//!
//! [[step]]
//! advance_days = 365
//! action = "collect_fees"
//! ```
//!
//! Each step may move the clock forward with `advance_days` and
//! `advance_secs` before it runs. A failed step is recorded in the report
//! and the run continues.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vaultline_contracts::vault::{Vault, VaultError};
use vaultline_protocol::config::VaultConfig;
use vaultline_protocol::events::VaultEvent;
use vaultline_protocol::fees::{FeeKind, FeeRates};
use vaultline_protocol::ledger::{InMemoryLedger, ReportedValuation, ShareLedger};

use crate::metrics::VaultMetrics;

/// The vault type every scenario runs against.
pub type SimulatedVault = Vault<InMemoryLedger, ReportedValuation>;

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// A timed sequence of vault actions.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Clock value of the first step.
    #[serde(default = "default_start")]
    pub start: DateTime<Utc>,
    /// Steps in execution order.
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

fn default_start() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// One scenario step.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// Days to move the clock forward before running the action.
    #[serde(default)]
    pub advance_days: u32,
    /// Seconds to move the clock forward before running the action.
    #[serde(default)]
    pub advance_secs: u32,
    /// What to do.
    #[serde(flatten)]
    pub action: Action,
}

/// Vault actions a scenario can perform. Omitted receivers and owners
/// default to the caller; omitted governance callers default to the
/// vault's governance principal.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Credit an account with assets outside the vault.
    Fund {
        /// Account to credit.
        account: String,
        /// Assets credited.
        amount: u64,
    },
    /// Send assets to the vault without minting shares.
    Donate {
        /// Assets donated.
        amount: u64,
    },
    /// Replace the externally reported position value.
    ReportValuation {
        /// New value of assets held outside the vault.
        external_assets: u64,
    },
    /// [`Vault::deposit`].
    Deposit {
        /// Account paying the assets.
        caller: String,
        /// Gross assets deposited.
        assets: u64,
        /// Share recipient.
        receiver: Option<String>,
    },
    /// [`Vault::mint`].
    Mint {
        /// Account paying the assets.
        caller: String,
        /// Shares to mint.
        shares: u64,
        /// Share recipient.
        receiver: Option<String>,
    },
    /// [`Vault::withdraw`].
    Withdraw {
        /// Account initiating the exit.
        caller: String,
        /// Net assets to receive.
        assets: u64,
        /// Asset recipient.
        receiver: Option<String>,
        /// Share owner.
        owner: Option<String>,
    },
    /// [`Vault::redeem`].
    Redeem {
        /// Account initiating the exit.
        caller: String,
        /// Shares to burn.
        shares: u64,
        /// Asset recipient.
        receiver: Option<String>,
        /// Share owner.
        owner: Option<String>,
    },
    /// [`Vault::propose_fee`].
    ProposeFee {
        /// Proposing principal.
        caller: Option<String>,
        /// Which fee.
        kind: FeeKind,
        /// Proposed rate.
        rate_bps: u32,
    },
    /// [`Vault::enforce_fee`].
    EnforceFee {
        /// Enforcing principal.
        caller: Option<String>,
        /// Which fee.
        kind: FeeKind,
    },
    /// [`Vault::collect_fees`].
    CollectFees {
        /// Collecting principal.
        caller: Option<String>,
    },
    /// [`Vault::set_fee_collector`].
    SetFeeCollector {
        /// Governance principal.
        caller: Option<String>,
        /// New collector.
        collector: String,
    },
}

impl Action {
    /// Snake-case action name, used as the metrics label.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Fund { .. } => "fund",
            Action::Donate { .. } => "donate",
            Action::ReportValuation { .. } => "report_valuation",
            Action::Deposit { .. } => "deposit",
            Action::Mint { .. } => "mint",
            Action::Withdraw { .. } => "withdraw",
            Action::Redeem { .. } => "redeem",
            Action::ProposeFee { .. } => "propose_fee",
            Action::EnforceFee { .. } => "enforce_fee",
            Action::CollectFees { .. } => "collect_fees",
            Action::SetFeeCollector { .. } => "set_fee_collector",
        }
    }
}

impl Scenario {
    /// Parses a scenario from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse scenario")
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// One entry per step.
    pub steps: Vec<StepReport>,
    /// Vault state after the last step.
    pub final_state: FinalState,
}

/// Outcome of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Zero-based step index.
    pub index: usize,
    /// Clock value the step ran at.
    pub at: DateTime<Utc>,
    /// Action name.
    pub action: &'static str,
    /// What happened.
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Whether a step committed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The action committed.
    Ok {
        /// Shares, assets or rate returned by the operation, if any.
        value: Option<u64>,
        /// Events recorded by the vault.
        events: Vec<VaultEvent>,
    },
    /// The action was rejected and left the vault unchanged.
    Failed {
        /// Rendered error.
        error: String,
    },
}

impl StepOutcome {
    /// Returns `true` for a committed step.
    pub fn is_ok(&self) -> bool {
        matches!(self, StepOutcome::Ok { .. })
    }
}

/// Vault state snapshot for the report.
#[derive(Debug, Clone, Serialize)]
pub struct FinalState {
    /// Assets under management.
    pub total_assets: u64,
    /// Outstanding shares.
    pub total_shares: u64,
    /// Assets held in vault custody.
    pub idle_assets: u64,
    /// Observed value of one whole share.
    pub share_value: u64,
    /// Current high-water mark.
    pub high_water_mark: u64,
    /// Instant management fees are billed up to.
    pub last_collection: DateTime<Utc>,
    /// Active fee rates.
    pub fee_rates: FeeRates,
    /// Current fee collector.
    pub fee_collector: String,
    /// Current governance principal.
    pub governance: String,
    /// Share balances by account.
    pub share_balances: BTreeMap<String, u64>,
}

impl FinalState {
    fn capture(vault: &SimulatedVault) -> Result<Self> {
        Ok(Self {
            total_assets: vault.total_assets()?,
            total_shares: vault.total_shares(),
            idle_assets: vault.ledger().idle_assets(),
            share_value: vault.share_value()?,
            high_water_mark: vault.high_water_mark(),
            last_collection: vault.last_collection(),
            fee_rates: *vault.fees().rates(),
            fee_collector: vault.fee_collector().to_string(),
            governance: vault.governance().to_string(),
            share_balances: vault.ledger().share_holders().into_iter().collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Runs `scenario` against a fresh vault built from `config`.
pub fn run(config: VaultConfig, scenario: &Scenario, metrics: &VaultMetrics) -> Result<SimulationReport> {
    let mut vault = Vault::new(
        config,
        InMemoryLedger::new(),
        ReportedValuation::default(),
        scenario.start,
    )
    .context("failed to create vault")?;

    let mut now = scenario.start;
    let mut steps = Vec::with_capacity(scenario.steps.len());

    for (index, step) in scenario.steps.iter().enumerate() {
        let advance = i64::from(step.advance_days) * 86_400 + i64::from(step.advance_secs);
        now = now
            .checked_add_signed(Duration::seconds(advance))
            .with_context(|| format!("step {index} moves the clock past {now}"))?;

        let outcome = match apply(&mut vault, &step.action, now) {
            Ok(value) => StepOutcome::Ok {
                value,
                events: vault.drain_events(),
            },
            Err(error) => StepOutcome::Failed {
                error: error.to_string(),
            },
        };
        debug!(index, action = step.action.name(), ok = outcome.is_ok(), "step finished");

        if let StepOutcome::Ok { events, .. } = &outcome {
            metrics.record(step.action.name(), true, events);
        } else {
            metrics.record(step.action.name(), false, &[]);
        }

        steps.push(StepReport {
            index,
            at: now,
            action: step.action.name(),
            outcome,
        });
    }

    let final_state = FinalState::capture(&vault)?;
    metrics.set_state(
        final_state.total_assets,
        final_state.total_shares,
        final_state.high_water_mark,
    );

    let failed = steps.iter().filter(|s| !s.outcome.is_ok()).count();
    info!(steps = steps.len(), failed, "scenario finished");

    Ok(SimulationReport { steps, final_state })
}

/// Applies one action. Host-side setup actions (funding, donations,
/// valuation reports) map ledger errors into [`VaultError`] as well.
fn apply(vault: &mut SimulatedVault, action: &Action, now: DateTime<Utc>) -> Result<Option<u64>, VaultError> {
    let governance = vault.governance().to_string();
    let gov = |caller: &Option<String>| caller.clone().unwrap_or_else(|| governance.clone());

    match action {
        Action::Fund { account, amount } => {
            Ok(Some(vault.ledger_mut().fund_account(account, *amount)?))
        }
        Action::Donate { amount } => Ok(Some(vault.ledger_mut().donate(*amount)?)),
        Action::ReportValuation { external_assets } => {
            vault.valuation_mut().report(*external_assets);
            Ok(None)
        }
        Action::Deposit {
            caller,
            assets,
            receiver,
        } => {
            let receiver = receiver.as_deref().unwrap_or(caller);
            vault.deposit(caller, *assets, receiver, now).map(Some)
        }
        Action::Mint {
            caller,
            shares,
            receiver,
        } => {
            let receiver = receiver.as_deref().unwrap_or(caller);
            vault.mint(caller, *shares, receiver, now).map(Some)
        }
        Action::Withdraw {
            caller,
            assets,
            receiver,
            owner,
        } => {
            let receiver = receiver.as_deref().unwrap_or(caller);
            let owner = owner.as_deref().unwrap_or(caller);
            vault.withdraw(caller, *assets, receiver, owner, now).map(Some)
        }
        Action::Redeem {
            caller,
            shares,
            receiver,
            owner,
        } => {
            let receiver = receiver.as_deref().unwrap_or(caller);
            let owner = owner.as_deref().unwrap_or(caller);
            vault.redeem(caller, *shares, receiver, owner, now).map(Some)
        }
        Action::ProposeFee {
            caller,
            kind,
            rate_bps,
        } => vault
            .propose_fee(&gov(caller), *kind, *rate_bps, now)
            .map(|()| None),
        Action::EnforceFee { caller, kind } => vault
            .enforce_fee(&gov(caller), *kind, now)
            .map(|rate| Some(u64::from(rate))),
        Action::CollectFees { caller } => vault.collect_fees(&gov(caller), now).map(Some),
        Action::SetFeeCollector { caller, collector } => vault
            .set_fee_collector(&gov(caller), collector, now)
            .map(|()| None),
    }
}
