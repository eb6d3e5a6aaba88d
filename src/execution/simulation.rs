//! Synthetic outcomes for dry-run mode

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;
use crate::config::FLASH_LOAN_FEE_BPS;
use crate::types::{ExecutionPath, TradeOutcome};

/// Profit the route should realize at `size`, net of venue and network
/// fees and of the flash-loan fee when borrowing.
pub fn expected_profit(size: Decimal, net_profit_pct: Decimal, path: ExecutionPath) -> Decimal {
    size * net_profit_pct / dec!(100) - flash_loan_fee(size, path)
}

pub fn flash_loan_fee(size: Decimal, path: ExecutionPath) -> Decimal {
    match path {
        ExecutionPath::FlashLoan => size * Decimal::from(FLASH_LOAN_FEE_BPS) / dec!(10000),
        ExecutionPath::Standard => Decimal::ZERO,
    }
}

/// Stands in for submission once the transaction has been built, signed and
/// simulated: the trade is booked at its expected profit.
pub fn simulated_outcome(
    size: Decimal,
    net_profit_pct: Decimal,
    path: ExecutionPath,
    units_consumed: Option<u64>,
) -> (TradeOutcome, Decimal) {
    let pnl = expected_profit(size, net_profit_pct, path);
    info!(
        path = %path,
        size = %size,
        expected_pnl = %pnl,
        units = units_consumed.unwrap_or_default(),
        "🎭 Dry run: simulated fill instead of submission"
    );
    (TradeOutcome::Simulated, pnl)
}
