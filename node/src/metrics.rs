//! # Prometheus Metrics
//!
//! Counters and gauges describing what a simulated vault did. The binary
//! renders them in the Prometheus text exposition format after a run
//! (`simulate --metrics`), so a scenario can be diffed or scraped like a
//! live service.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use vaultline_protocol::events::{FeeBreakdown, VaultEvent};

/// Holds all Prometheus metric handles for a vault.
#[derive(Clone)]
pub struct VaultMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Committed operations, by operation name.
    pub operations_total: IntCounterVec,
    /// Rejected operations, by operation name.
    pub rejected_operations_total: IntCounterVec,
    /// Fee shares minted to the collector, by fee component.
    pub fee_shares_minted_total: IntCounterVec,
    /// Assets under management after the last step.
    pub total_assets: IntGauge,
    /// Outstanding shares after the last step.
    pub total_shares: IntGauge,
    /// Current high-water mark.
    pub high_water_mark: IntGauge,
}

impl VaultMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("vaultline".into()), None)?;

        let operations_total = IntCounterVec::new(
            Opts::new("operations_total", "Committed vault operations"),
            &["operation"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let rejected_operations_total = IntCounterVec::new(
            Opts::new(
                "rejected_operations_total",
                "Vault operations rejected before commit",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(rejected_operations_total.clone()))?;

        let fee_shares_minted_total = IntCounterVec::new(
            Opts::new(
                "fee_shares_minted_total",
                "Fee shares minted to the collector",
            ),
            &["component"],
        )?;
        registry.register(Box::new(fee_shares_minted_total.clone()))?;

        let total_assets = IntGauge::new("total_assets", "Assets under management")?;
        registry.register(Box::new(total_assets.clone()))?;

        let total_shares = IntGauge::new("total_shares", "Outstanding vault shares")?;
        registry.register(Box::new(total_shares.clone()))?;

        let high_water_mark = IntGauge::new(
            "high_water_mark",
            "Share value at which the last performance fee was settled",
        )?;
        registry.register(Box::new(high_water_mark.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            rejected_operations_total,
            fee_shares_minted_total,
            total_assets,
            total_shares,
            high_water_mark,
        })
    }

    /// Records the outcome of one operation and the events it produced.
    pub fn record(&self, operation: &str, committed: bool, events: &[VaultEvent]) {
        if !committed {
            self.rejected_operations_total
                .with_label_values(&[operation])
                .inc();
            return;
        }

        self.operations_total.with_label_values(&[operation]).inc();
        for event in events {
            if let VaultEvent::FeeCollected { breakdown, .. } = event {
                self.record_fees(breakdown);
            }
        }
    }

    fn record_fees(&self, breakdown: &FeeBreakdown) {
        for (component, shares) in [
            ("management", breakdown.management_shares),
            ("performance", breakdown.performance_shares),
            ("entry", breakdown.entry_shares),
            ("exit", breakdown.exit_shares),
        ] {
            if shares > 0 {
                self.fee_shares_minted_total
                    .with_label_values(&[component])
                    .inc_by(shares);
            }
        }
    }

    /// Updates the state gauges. Values beyond `i64::MAX` saturate.
    pub fn set_state(&self, total_assets: u64, total_shares: u64, high_water_mark: u64) {
        self.total_assets.set(saturating_i64(total_assets));
        self.total_shares.set(saturating_i64(total_shares));
        self.high_water_mark.set(saturating_i64(high_water_mark));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
