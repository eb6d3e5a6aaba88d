//! Bot configuration settings and environment variable handling

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::env;
use std::str::FromStr;
use tracing::warn;
use crate::types::{TokenPair, Venue};

// Detection constants
pub const MIN_POLL_INTERVAL_MS: u64 = 100;
pub const MAX_HOP_LIMIT: usize = 5;
pub const DEFAULT_MAX_QUOTE_AGE_MS: u64 = 5_000;

// Execution constants
pub const MAX_COMPUTE_UNITS: u64 = 1_400_000;
pub const FLASH_LOAN_FEE_BPS: u64 = 3;
pub const MIN_PRIORITY_FEE_MICRO_LAMPORTS: u64 = 50_000;
pub const MAX_PRIORITY_FEE_MICRO_LAMPORTS: u64 = 1_000_000;
pub const MAX_SLIPPAGE_BPS: u32 = 300;
pub const DEFAULT_RELAY_TIP_LAMPORTS: u64 = 10_000;

// Risk constants
pub const MIN_POSITION_FLOOR: Decimal = dec!(1);
pub const VAR_Z_SCORE_95: Decimal = dec!(1.645);
pub const VAR_Z_SCORE_99: Decimal = dec!(2.326);

/// How the execution engine chooses between the standard and flash-loan paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLoanPolicy {
    Never,
    Always,
    /// Flash loan only when the sized trade exceeds held inventory.
    WhenExceedsInventory,
    /// Try the flash-loan path first, fall back to standard if it cannot be
    /// built or fails before submission.
    FirstWithFallback,
}

impl FromStr for FlashLoanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "never" | "standard" => Ok(FlashLoanPolicy::Never),
            "always" => Ok(FlashLoanPolicy::Always),
            "size" | "when_exceeds_inventory" => Ok(FlashLoanPolicy::WhenExceedsInventory),
            "fallback" | "first_with_fallback" => Ok(FlashLoanPolicy::FirstWithFallback),
            other => Err(format!("unknown flash loan policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Endpoints
    pub rpc_url: String,
    pub quote_api_url: String,
    pub relay_url: String,
    pub private_key: Option<String>,
    // Market universe
    pub quote_token: String,
    pub trading_pairs: Vec<TokenPair>,
    pub venues: Vec<Venue>,
    // Detection
    pub poll_interval_ms: u64,
    pub max_quote_age_ms: u64,
    pub max_hops: usize,
    pub min_profit_pct: Decimal,
    pub network_fee_pct: Decimal,
    pub opportunity_ttl_ms: u64,
    // Statistical strategy
    pub enable_statistical: bool,
    pub stat_window: usize,
    pub stat_z_threshold: Decimal,
    pub stat_base_size: Decimal,
    pub stat_max_multiple: Decimal,
    pub stat_reference_venue: Venue,
    // Latency strategy
    pub enable_latency: bool,
    pub latency_lag_ms: u64,
    pub latency_base_size: Decimal,
    // Risk (seed for the risk snapshot)
    pub risk_config_path: Option<String>,
    pub capital_usd: Decimal,
    pub max_position_size: Decimal,
    pub min_position_size: Decimal,
    pub max_total_exposure: Decimal,
    pub max_daily_loss: Decimal,
    pub max_consecutive_losses: u32,
    pub circuit_breaker_cooldown_secs: u64,
    pub var_limit_percent: Decimal,
    pub pair_cooldown_secs: u64,
    // Execution
    pub dry_run: bool,
    pub flash_loan_policy: FlashLoanPolicy,
    pub inventory_usd: Decimal,
    pub use_private_relay: bool,
    pub relay_tip_lamports: u64,
    pub slippage_tolerance_bps: u32,
    pub quote_token_decimals: u32,
    pub max_retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub confirmation_timeout_secs: u64,
    // Rate limiting
    pub venue_rate_limit_per_sec: u32,
    pub rpc_rate_limit_per_sec: u32,
    // Operations
    pub kill_switch_file: Option<String>,
    pub stats_interval_ticks: u64,
}

fn env_decimal(key: &str, default: Decimal) -> Decimal {
    env::var(key)
        .ok()
        .and_then(|s| Decimal::from_str(s.trim()).ok())
        .unwrap_or(default)
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_list<T: FromStr<Err = String>>(key: &str, default: &str) -> Vec<T> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| match s.parse() {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Ignoring {} entry: {}", key, e);
                None
            }
        })
        .collect()
}

impl Config {
    pub fn load() -> Self {
        let poll_interval_ms = env_parse("POLL_INTERVAL_MS", 500u64).max(MIN_POLL_INTERVAL_MS);

        Self {
            rpc_url: env::var("RPC_URL")
                .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string()),
            quote_api_url: env::var("QUOTE_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string()),
            relay_url: env::var("RELAY_URL")
                .unwrap_or_else(|_| "https://mainnet.block-engine.jito.wtf".to_string()),
            private_key: env::var("PRIVATE_KEY").ok(),
            quote_token: env::var("QUOTE_TOKEN")
                .unwrap_or_else(|_| "USDC".to_string())
                .trim()
                .to_uppercase(),
            trading_pairs: env_list("TRADING_PAIRS", "SOL/USDC,RAY/USDC,ORCA/USDC,RAY/SOL,ORCA/SOL"),
            venues: env_list("VENUES", "raydium,orca,jupiter,meteora"),
            poll_interval_ms,
            max_quote_age_ms: env_parse("MAX_QUOTE_AGE_MS", DEFAULT_MAX_QUOTE_AGE_MS),
            max_hops: env_parse("MAX_HOPS", 3usize).clamp(2, MAX_HOP_LIMIT),
            min_profit_pct: env_decimal("MIN_PROFIT_PCT", dec!(0.5)).max(Decimal::ZERO),
            network_fee_pct: env_decimal("NETWORK_FEE_PCT", dec!(0.01)).max(Decimal::ZERO),
            opportunity_ttl_ms: env_parse("OPPORTUNITY_TTL_MS", 2_000u64),
            enable_statistical: env_parse("ENABLE_STATISTICAL", true),
            stat_window: env_parse("STAT_WINDOW", 20usize).max(2),
            stat_z_threshold: env_decimal("STAT_Z_THRESHOLD", dec!(2.0)),
            stat_base_size: env_decimal("STAT_BASE_SIZE", dec!(100)),
            stat_max_multiple: env_decimal("STAT_MAX_MULTIPLE", dec!(5)),
            stat_reference_venue: env_parse("STAT_REFERENCE_VENUE", Venue::Jupiter),
            enable_latency: env_parse("ENABLE_LATENCY", true),
            latency_lag_ms: env_parse("LATENCY_LAG_MS", 1_000u64),
            latency_base_size: env_decimal("LATENCY_BASE_SIZE", dec!(100)),
            risk_config_path: env::var("RISK_CONFIG_PATH").ok(),
            capital_usd: env_decimal("CAPITAL_USD", dec!(10000)),
            max_position_size: env_decimal("MAX_POSITION_SIZE", dec!(1000)),
            min_position_size: env_decimal("MIN_POSITION_SIZE", dec!(10)).max(MIN_POSITION_FLOOR),
            max_total_exposure: env_decimal("MAX_TOTAL_EXPOSURE", dec!(3000)),
            max_daily_loss: env_decimal("MAX_DAILY_LOSS", dec!(100)),
            max_consecutive_losses: env_parse("MAX_CONSECUTIVE_LOSSES", 5u32).max(1),
            circuit_breaker_cooldown_secs: env_parse("CIRCUIT_BREAKER_COOLDOWN_SECS", 300u64),
            var_limit_percent: env_decimal("VAR_LIMIT_PERCENT", dec!(5)),
            pair_cooldown_secs: env_parse("PAIR_COOLDOWN_SECS", 60u64),
            dry_run: env_parse("DRY_RUN", true),
            flash_loan_policy: env_parse("FLASH_LOAN_POLICY", FlashLoanPolicy::WhenExceedsInventory),
            inventory_usd: env_decimal("INVENTORY_USD", dec!(500)),
            use_private_relay: env_parse("USE_PRIVATE_RELAY", false),
            relay_tip_lamports: env_parse("RELAY_TIP_LAMPORTS", DEFAULT_RELAY_TIP_LAMPORTS),
            slippage_tolerance_bps: env_parse("SLIPPAGE_TOLERANCE_BPS", 50u32).min(MAX_SLIPPAGE_BPS),
            quote_token_decimals: env_parse("QUOTE_TOKEN_DECIMALS", 6u32),
            max_retry_attempts: env_parse("MAX_RETRY_ATTEMPTS", 3u32).max(1),
            retry_base_delay_ms: env_parse("RETRY_BASE_DELAY_MS", 500u64),
            request_timeout_ms: env_parse("REQUEST_TIMEOUT_MS", 3_000u64),
            confirmation_timeout_secs: env_parse("CONFIRMATION_TIMEOUT_SECS", 30u64),
            venue_rate_limit_per_sec: env_parse("VENUE_RATE_LIMIT_PER_SEC", 10u32).max(1),
            rpc_rate_limit_per_sec: env_parse("RPC_RATE_LIMIT_PER_SEC", 20u32).max(1),
            kill_switch_file: env::var("KILL_SWITCH_FILE").ok(),
            stats_interval_ticks: env_parse("STATS_INTERVAL_TICKS", 120u64).max(1),
        }
    }

    /// Time budget for one tick's cycle search: most of the poll interval,
    /// leaving room for quote polling and risk evaluation.
    pub fn search_budget_ms(&self) -> u64 {
        self.poll_interval_ms * 4 / 5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_loan_policy_accepts_aliases() {
        assert_eq!("size".parse::<FlashLoanPolicy>().unwrap(), FlashLoanPolicy::WhenExceedsInventory);
        assert_eq!("First_With_Fallback".parse::<FlashLoanPolicy>().unwrap(), FlashLoanPolicy::FirstWithFallback);
        assert!("sometimes".parse::<FlashLoanPolicy>().is_err());
    }

    #[test]
    fn defaults_are_within_bounds() {
        let config = Config::load();
        assert!(config.poll_interval_ms >= MIN_POLL_INTERVAL_MS);
        assert!((2..=MAX_HOP_LIMIT).contains(&config.max_hops));
        assert!(config.search_budget_ms() < config.poll_interval_ms);
        assert!(!config.venues.is_empty());
    }
}
