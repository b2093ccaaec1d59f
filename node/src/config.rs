//! Loading vault deployment configs from TOML.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use vaultline_protocol::config::VaultConfig;

/// Reads and validates a [`VaultConfig`] from a TOML file.
pub fn load_vault_config(path: &Path) -> Result<VaultConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = parse_vault_config(&contents)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    tracing::info!(path = %path.display(), "vault config loaded");
    Ok(config)
}

/// Parses and validates a [`VaultConfig`] from TOML text.
pub fn parse_vault_config(contents: &str) -> Result<VaultConfig> {
    let config: VaultConfig = toml::from_str(contents).context("failed to parse TOML")?;
    config.validate()?;
    Ok(config)
}
