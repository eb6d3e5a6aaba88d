//! Signal generator interface and registry

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};
use crate::config::Config;
use crate::errors::BotResult;
use crate::types::{ArbitrageOpportunity, Venue};
use crate::venues::QuoteSnapshot;
use super::{LatencyGenerator, StatisticalGenerator};

#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub enable_statistical: bool,
    pub window: usize,
    pub z_threshold: Decimal,
    pub base_size: Decimal,
    pub max_multiple: Decimal,
    pub reference_venue: Venue,
    pub enable_latency: bool,
    pub latency_lag: Duration,
    pub latency_base_size: Decimal,
    /// Same ceiling the risk gate enforces.
    pub max_position_size: Decimal,
    pub network_fee_pct: Decimal,
    pub opportunity_ttl: Duration,
}

impl StrategyConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            enable_statistical: config.enable_statistical,
            window: config.stat_window,
            z_threshold: config.stat_z_threshold,
            base_size: config.stat_base_size,
            max_multiple: config.stat_max_multiple,
            reference_venue: config.stat_reference_venue,
            enable_latency: config.enable_latency,
            latency_lag: Duration::milliseconds(config.latency_lag_ms as i64),
            latency_base_size: config.latency_base_size,
            max_position_size: config.max_position_size,
            network_fee_pct: config.network_fee_pct,
            opportunity_ttl: Duration::milliseconds(config.opportunity_ttl_ms as i64),
        }
    }
}

/// A detector that turns quote snapshots into candidate opportunities.
/// Generators may keep history between calls; snapshots are read-only.
pub trait SignalGenerator: Send {
    fn name(&self) -> &'static str;

    fn generate(&mut self, snapshot: &QuoteSnapshot, now: DateTime<Utc>) -> BotResult<Vec<ArbitrageOpportunity>>;

    /// Ceiling on recommended sizes. Called whenever the risk snapshot changes.
    fn set_max_position_size(&mut self, _max: Decimal) {}
}

#[derive(Default)]
pub struct StrategyRegistry {
    generators: Vec<Box<dyn SignalGenerator>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every generator the configuration enables.
    pub fn from_config(config: &StrategyConfig) -> Self {
        let mut registry = Self::new();
        if config.enable_statistical {
            registry.register(Box::new(StatisticalGenerator::new(config.clone())));
        }
        if config.enable_latency {
            registry.register(Box::new(LatencyGenerator::new(config.clone())));
        }
        registry
    }

    pub fn register(&mut self, generator: Box<dyn SignalGenerator>) {
        self.generators.push(generator);
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.generators.iter().map(|g| g.name()).collect()
    }

    pub fn set_max_position_size(&mut self, max: Decimal) {
        for generator in &mut self.generators {
            generator.set_max_position_size(max);
        }
    }

    /// Runs every generator over the same snapshot. A failing generator is
    /// logged and skipped; the others still contribute.
    pub fn run(&mut self, snapshot: &QuoteSnapshot, now: DateTime<Utc>) -> Vec<ArbitrageOpportunity> {
        let mut opportunities = Vec::new();
        for generator in &mut self.generators {
            match generator.generate(snapshot, now) {
                Ok(found) => {
                    if !found.is_empty() {
                        debug!(strategy = generator.name(), count = found.len(), "Strategy produced candidates");
                    }
                    opportunities.extend(found);
                }
                Err(e) => warn!(strategy = generator.name(), error = %e, "⚠️ Strategy failed, skipping this tick"),
            }
        }
        opportunities
    }
}
