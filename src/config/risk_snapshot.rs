//! Hot-reloadable risk configuration snapshot

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};
use crate::errors::{BotError, BotResult};
use super::Config;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Minimum net profit, in percent, an opportunity must exceed.
    pub min_profit_threshold: Decimal,
    pub max_position_size: Decimal,
    pub min_position_size: Decimal,
    pub max_total_exposure: Decimal,
    pub max_daily_loss: Decimal,
    pub max_consecutive_losses: u32,
    pub circuit_breaker_cooldown_secs: u64,
    pub var_limit_percent: Decimal,
    pub capital: Decimal,
    pub pair_cooldown_secs: u64,
    /// Net profit at which a trade is sized at the full position limit.
    pub full_size_profit_pct: Decimal,
    /// Realized volatility above which size is scaled down proportionally.
    pub volatility_reference_pct: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            min_profit_threshold: dec!(0.5),
            max_position_size: dec!(1000),
            min_position_size: dec!(10),
            max_total_exposure: dec!(3000),
            max_daily_loss: dec!(100),
            max_consecutive_losses: 5,
            circuit_breaker_cooldown_secs: 300,
            var_limit_percent: dec!(5),
            capital: dec!(10000),
            pair_cooldown_secs: 60,
            full_size_profit_pct: dec!(2),
            volatility_reference_pct: dec!(1),
        }
    }
}

impl RiskConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_profit_threshold: config.min_profit_pct,
            max_position_size: config.max_position_size,
            min_position_size: config.min_position_size,
            max_total_exposure: config.max_total_exposure,
            max_daily_loss: config.max_daily_loss,
            max_consecutive_losses: config.max_consecutive_losses,
            circuit_breaker_cooldown_secs: config.circuit_breaker_cooldown_secs,
            var_limit_percent: config.var_limit_percent,
            capital: config.capital_usd,
            pair_cooldown_secs: config.pair_cooldown_secs,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> BotResult<()> {
        let positive = [
            ("max_position_size", self.max_position_size),
            ("min_position_size", self.min_position_size),
            ("max_total_exposure", self.max_total_exposure),
            ("max_daily_loss", self.max_daily_loss),
            ("capital", self.capital),
            ("full_size_profit_pct", self.full_size_profit_pct),
            ("volatility_reference_pct", self.volatility_reference_pct),
        ];
        for (name, value) in positive {
            if value <= Decimal::ZERO {
                return Err(BotError::invalid_config(format!("{} must be positive, got {}", name, value)));
            }
        }

        if self.min_profit_threshold < Decimal::ZERO {
            return Err(BotError::invalid_config("min_profit_threshold cannot be negative"));
        }
        if self.min_position_size > self.max_position_size {
            return Err(BotError::invalid_config(format!(
                "min_position_size {} exceeds max_position_size {}",
                self.min_position_size, self.max_position_size
            )));
        }
        if self.max_consecutive_losses == 0 {
            return Err(BotError::invalid_config("max_consecutive_losses must be at least 1"));
        }
        if self.var_limit_percent <= Decimal::ZERO || self.var_limit_percent > dec!(100) {
            return Err(BotError::invalid_config(format!(
                "var_limit_percent must be in (0, 100], got {}",
                self.var_limit_percent
            )));
        }
        Ok(())
    }
}

/// Owns the active risk snapshot and re-reads it from disk on demand.
///
/// A reload that fails to read, parse or validate leaves the active snapshot
/// untouched and reports the error.
#[derive(Debug)]
pub struct RiskConfigManager {
    path: Option<PathBuf>,
    current: RiskConfig,
    last_modified: Option<SystemTime>,
}

impl RiskConfigManager {
    pub fn in_memory(config: RiskConfig) -> BotResult<Self> {
        config.validate()?;
        Ok(Self {
            path: None,
            current: config,
            last_modified: None,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> BotResult<Self> {
        let path = path.as_ref().to_path_buf();
        let config = read_snapshot(&path)?;
        let last_modified = modified_time(&path);
        info!(path = %path.display(), "Loaded risk configuration snapshot");
        Ok(Self {
            path: Some(path),
            current: config,
            last_modified,
        })
    }

    pub fn current(&self) -> &RiskConfig {
        &self.current
    }

    /// Re-reads the snapshot unconditionally. Returns `Ok(true)` if the
    /// active snapshot changed.
    pub fn reload(&mut self) -> BotResult<bool> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        self.last_modified = modified_time(&path);

        match read_snapshot(&path) {
            Ok(config) if config == self.current => Ok(false),
            Ok(config) => {
                info!(path = %path.display(), "Risk configuration reloaded");
                self.current = config;
                Ok(true)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Rejected risk configuration reload, keeping last valid snapshot");
                Err(e)
            }
        }
    }

    /// Reloads only when the file's modification time moved.
    pub fn reload_if_modified(&mut self) -> BotResult<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        if modified_time(path) == self.last_modified {
            return Ok(false);
        }
        self.reload()
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

fn read_snapshot(path: &Path) -> BotResult<RiskConfig> {
    let raw = fs::read_to_string(path)
        .map_err(|e| BotError::invalid_config(format!("cannot read {}: {}", path.display(), e)))?;
    let config: RiskConfig = serde_json::from_str(&raw).map_err(|e| BotError::DataParsing {
        context: format!("risk snapshot {}", path.display()),
        source: e.into(),
    })?;
    config.validate()?;
    Ok(config)
}
