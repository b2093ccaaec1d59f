//! # CLI Interface
//!
//! Defines the command-line argument structure for `vaultline` using
//! `clap` derive. Supports four subcommands: `check-config`, `simulate`,
//! `quote`, and `version`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use vaultline_protocol::config::{DEFAULT_ASSET_DECIMALS, DEFAULT_DECIMALS_OFFSET, SECONDS_PER_YEAR};
use vaultline_protocol::Rounding;

use crate::logging::LogFormat;

/// Vaultline tokenized vault toolkit.
///
/// Validates vault configs, replays fee scenarios against an in-memory
/// vault, and quotes the fee and conversion formulas.
#[derive(Parser, Debug)]
#[command(
    name = "vaultline",
    about = "Vaultline tokenized vault toolkit",
    version,
    propagate_version = true
)]
pub struct VaultlineCli {
    /// Log output format.
    #[arg(long, global = true, env = "VAULTLINE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a vault config and print the effective values.
    CheckConfig(ConfigArgs),
    /// Replay a scenario file against an in-memory vault.
    Simulate(SimulateArgs),
    /// Evaluate a single fee or conversion formula.
    Quote(QuoteArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for `check-config`.
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Path to the vault configuration file (TOML).
    #[arg(long, short = 'c', env = "VAULTLINE_CONFIG")]
    pub config: PathBuf,
}

/// Arguments for `simulate`.
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Path to the vault configuration file (TOML).
    #[arg(long, short = 'c', env = "VAULTLINE_CONFIG")]
    pub config: PathBuf,

    /// Path to the scenario file (TOML).
    #[arg(long, short = 's')]
    pub scenario: PathBuf,

    /// Print Prometheus metrics after the report.
    #[arg(long)]
    pub metrics: bool,
}

/// Arguments for `quote`.
#[derive(Parser, Debug)]
pub struct QuoteArgs {
    /// Formula to evaluate.
    #[command(subcommand)]
    pub formula: QuoteFormula,
}

/// Pure formulas available to `quote`.
#[derive(Subcommand, Debug)]
pub enum QuoteFormula {
    /// Fee charged on top of a net amount (mint, withdraw).
    FeeOnRaw {
        #[arg(long)]
        amount: u64,
        #[arg(long)]
        bps: u32,
    },
    /// Fee contained in a gross amount (deposit, redeem).
    FeeOnTotal {
        #[arg(long)]
        amount: u64,
        #[arg(long)]
        bps: u32,
    },
    /// Management fee shares for a supply over an elapsed period.
    Management {
        #[arg(long)]
        supply: u64,
        #[arg(long)]
        bps: u32,
        /// Elapsed seconds. Defaults to one year.
        #[arg(long, default_value_t = SECONDS_PER_YEAR)]
        elapsed_secs: u64,
    },
    /// Performance fee for a vault state against a high-water mark.
    Performance {
        #[arg(long)]
        total_assets: u64,
        #[arg(long)]
        total_shares: u64,
        #[arg(long)]
        high_water_mark: u64,
        #[arg(long)]
        bps: u32,
        #[command(flatten)]
        precision: PrecisionArgs,
    },
    /// Shares an asset amount converts to.
    ToShares {
        #[arg(long)]
        assets: u64,
        #[arg(long)]
        total_assets: u64,
        #[arg(long)]
        total_shares: u64,
        #[arg(long, value_enum, default_value_t = RoundingArg::Floor)]
        rounding: RoundingArg,
        #[command(flatten)]
        precision: PrecisionArgs,
    },
    /// Assets a share amount converts to.
    ToAssets {
        #[arg(long)]
        shares: u64,
        #[arg(long)]
        total_assets: u64,
        #[arg(long)]
        total_shares: u64,
        #[arg(long, value_enum, default_value_t = RoundingArg::Floor)]
        rounding: RoundingArg,
        #[command(flatten)]
        precision: PrecisionArgs,
    },
}

/// Vault precision shared by the conversion-based quotes.
#[derive(Parser, Debug, Clone, Copy)]
pub struct PrecisionArgs {
    /// Decimals of the underlying asset.
    #[arg(long, default_value_t = DEFAULT_ASSET_DECIMALS)]
    pub asset_decimals: u8,
    /// Extra share decimals used as virtual liquidity.
    #[arg(long, default_value_t = DEFAULT_DECIMALS_OFFSET)]
    pub decimals_offset: u8,
}

/// Rounding direction on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoundingArg {
    Floor,
    Ceil,
}

impl From<RoundingArg> for Rounding {
    fn from(arg: RoundingArg) -> Self {
        match arg {
            RoundingArg::Floor => Rounding::Floor,
            RoundingArg::Ceil => Rounding::Ceil,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        VaultlineCli::command().debug_assert();
    }

    #[test]
    fn parses_simulate_with_metrics() {
        let cli = VaultlineCli::try_parse_from([
            "vaultline",
            "--log-format",
            "json",
            "simulate",
            "--config",
            "vault.toml",
            "--scenario",
            "run.toml",
            "--metrics",
        ])
        .unwrap();

        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Simulate(args) => {
                assert_eq!(args.config, PathBuf::from("vault.toml"));
                assert_eq!(args.scenario, PathBuf::from("run.toml"));
                assert!(args.metrics);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn management_quote_defaults_to_one_year() {
        let cli = VaultlineCli::try_parse_from([
            "vaultline", "quote", "management", "--supply", "1000", "--bps", "100",
        ])
        .unwrap();

        match cli.command {
            Commands::Quote(QuoteArgs {
                formula: QuoteFormula::Management { elapsed_secs, .. },
            }) => assert_eq!(elapsed_secs, SECONDS_PER_YEAR),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
