//! Trade result storage

use anyhow::Result;
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use crate::types::TradeResult;

pub const TRADES_DIR: &str = "output/trades";

pub fn trades_file(dir: &Path) -> PathBuf {
    dir.join(format!("trades_{}.jsonl", Utc::now().format("%Y-%m-%d")))
}

pub fn save_trade_result(dir: &Path, result: &TradeResult) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(trades_file(dir))?;

    writeln!(file, "{}", serde_json::to_string(result)?)?;

    info!(
        opportunity_id = %result.opportunity_id,
        outcome = ?result.outcome,
        realized_pnl = %result.realized_pnl,
        "Saved trade result"
    );

    Ok(())
}
