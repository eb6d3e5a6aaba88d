//! Startup checks run once before the first tick

use tracing::{error, info, warn};
use crate::config::Config;
use crate::errors::{BotError, BotResult};
use crate::network::TransactionRpc;
use super::KillSwitch;

/// Hosts that rate limit hard or are not mainnet.
const PUBLIC_RPC_MARKERS: [&str; 3] = ["devnet", "testnet", "api.mainnet-beta.solana.com"];

#[derive(Debug, Clone)]
pub struct PreflightSettings {
    pub rpc_url: String,
    pub dry_run: bool,
}

impl PreflightSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            rpc_url: config.rpc_url.clone(),
            dry_run: config.dry_run,
        }
    }
}

/// Fails if the node is unreachable or the kill switch is already engaged.
/// Returns warnings that should not block startup.
pub async fn run_preflight_checks(
    rpc: &dyn TransactionRpc,
    settings: &PreflightSettings,
    kill: &KillSwitch,
) -> BotResult<Vec<String>> {
    if let Some(source) = kill.poll() {
        error!(source, "❌ Kill switch already engaged, aborting startup");
        return Err(BotError::KillSwitchEngaged);
    }

    match rpc.slot().await {
        Ok(slot) => info!("✅ RPC connection OK (slot {})", slot),
        Err(e) => {
            error!(error = %e, "❌ RPC connection failed");
            return Err(e);
        }
    }

    let mut warnings = Vec::new();
    if settings.dry_run {
        warnings.push("Running in DRY-RUN mode, no transaction will be submitted".to_string());
    }
    if PUBLIC_RPC_MARKERS.iter().any(|marker| settings.rpc_url.contains(marker)) {
        warnings.push(format!("Using public or test RPC {}, not suited to live trading", settings.rpc_url));
    }

    for warning in &warnings {
        warn!("⚠️  {}", warning);
    }
    Ok(warnings)
}
