// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Vaultline CLI
//!
//! Entry point for the `vaultline` binary. Parses CLI arguments,
//! initializes logging, and dispatches to the subcommand.
//!
//! The binary supports four subcommands:
//!
//! - `check-config` - validate a vault config and print effective values
//! - `simulate`     - replay a scenario against an in-memory vault
//! - `quote`        - evaluate one fee or conversion formula
//! - `version`      - print build version information

mod cli;
mod config;
mod logging;
mod metrics;
mod simulate;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;

use vaultline_protocol::config::{
    VaultConfig, BPS_SCALE, FEE_UPDATE_DELAY, MAX_FEE_BPS, SECONDS_PER_YEAR,
};
use vaultline_protocol::conversion::{self, VaultSnapshot};
use vaultline_protocol::fees::{self, PerformanceInputs};

use cli::{Commands, PrecisionArgs, QuoteFormula, VaultlineCli};
use metrics::VaultMetrics;
use simulate::Scenario;

fn main() -> Result<()> {
    let cli = VaultlineCli::parse();
    logging::init_logging(logging::DEFAULT_FILTER, cli.log_format);

    match cli.command {
        Commands::CheckConfig(args) => check_config(args),
        Commands::Simulate(args) => run_simulation(args),
        Commands::Quote(args) => quote(args.formula),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Validates a config file and prints it with the derived precision values.
fn check_config(args: cli::ConfigArgs) -> Result<()> {
    let config = config::load_vault_config(&args.config)?;

    let report = json!({
        "config": config,
        "share_offset": config.share_offset(),
        "decimals_scale": config.decimals_scale(),
        "constants": constants(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Replays a scenario and prints the JSON report, then metrics if asked.
fn run_simulation(args: cli::SimulateArgs) -> Result<()> {
    let config = config::load_vault_config(&args.config)?;
    let contents = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("failed to read scenario file {}", args.scenario.display()))?;
    let scenario = Scenario::from_toml(&contents)
        .with_context(|| format!("invalid scenario file {}", args.scenario.display()))?;

    tracing::info!(
        config = %args.config.display(),
        scenario = %args.scenario.display(),
        steps = scenario.steps.len(),
        "starting simulation"
    );

    let metrics = VaultMetrics::new().context("failed to register metrics")?;
    let report = simulate::run(config, &scenario, &metrics)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.metrics {
        print!("{}", metrics.encode()?);
    }
    Ok(())
}

/// Evaluates one formula and prints the inputs and result as JSON.
fn quote(formula: QuoteFormula) -> Result<()> {
    let result = match formula {
        QuoteFormula::FeeOnRaw { amount, bps } => {
            let fee = fees::fee_on_raw(amount, bps)?;
            json!({ "formula": "fee_on_raw", "amount": amount, "bps": bps, "fee": fee,
                    "gross": amount.checked_add(fee) })
        }
        QuoteFormula::FeeOnTotal { amount, bps } => {
            let fee = fees::fee_on_total(amount, bps)?;
            json!({ "formula": "fee_on_total", "amount": amount, "bps": bps, "fee": fee,
                    "net": amount.saturating_sub(fee) })
        }
        QuoteFormula::Management {
            supply,
            bps,
            elapsed_secs,
        } => {
            let fee_shares = fees::management_fee(supply, bps, elapsed_secs)?;
            json!({ "formula": "management", "supply": supply, "bps": bps,
                    "elapsed_secs": elapsed_secs, "fee_shares": fee_shares })
        }
        QuoteFormula::Performance {
            total_assets,
            total_shares,
            high_water_mark,
            bps,
            precision,
        } => {
            let config = precision_config(precision)?;
            let snapshot = VaultSnapshot::new(total_assets, total_shares);
            let current_share_value =
                snapshot.share_value(config.decimals_scale(), config.share_offset())?;
            let fee = fees::performance_fee(PerformanceInputs {
                current_share_value,
                high_water_mark,
                snapshot,
                rate_bps: bps,
                decimals_scale: config.decimals_scale(),
                share_offset: config.share_offset(),
            })?;
            json!({ "formula": "performance", "current_share_value": current_share_value,
                    "high_water_mark": high_water_mark, "bps": bps, "result": fee })
        }
        QuoteFormula::ToShares {
            assets,
            total_assets,
            total_shares,
            rounding,
            precision,
        } => {
            let config = precision_config(precision)?;
            let shares = conversion::to_shares(
                assets,
                total_assets,
                total_shares,
                config.share_offset(),
                rounding.into(),
            )?;
            json!({ "formula": "to_shares", "assets": assets, "shares": shares })
        }
        QuoteFormula::ToAssets {
            shares,
            total_assets,
            total_shares,
            rounding,
            precision,
        } => {
            let config = precision_config(precision)?;
            let assets = conversion::to_assets(
                shares,
                total_assets,
                total_shares,
                config.share_offset(),
                rounding.into(),
            )?;
            json!({ "formula": "to_assets", "shares": shares, "assets": assets })
        }
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Builds a throwaway config so precision flags go through the same
/// validation as a deployed vault.
fn precision_config(precision: PrecisionArgs) -> Result<VaultConfig> {
    let mut config = VaultConfig::new("quote", "quote");
    config.asset_decimals = precision.asset_decimals;
    config.decimals_offset = precision.decimals_offset;
    config.validate()?;
    Ok(config)
}

fn constants() -> serde_json::Value {
    json!({
        "bps_scale": BPS_SCALE,
        "max_fee_bps": MAX_FEE_BPS,
        "seconds_per_year": SECONDS_PER_YEAR,
        "fee_update_delay_secs": FEE_UPDATE_DELAY.as_secs(),
    })
}

/// Prints version information to stdout.
fn print_version() {
    println!("vaultline {}", env!("CARGO_PKG_VERSION"));
    println!("max fee   {} bps", MAX_FEE_BPS);
    println!("timelock  {} s", FEE_UPDATE_DELAY.as_secs());
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
