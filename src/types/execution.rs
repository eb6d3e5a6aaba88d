//! Trade execution types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use crate::errors::ErrorKind;
use super::TokenPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionPath {
    /// Swap across the route using held inventory.
    Standard,
    /// Borrow, swap, repay inside one transaction.
    FlashLoan,
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPath::Standard => f.write_str("standard"),
            ExecutionPath::FlashLoan => f.write_str("flash-loan"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TradeOutcome {
    Confirmed,
    Failed { kind: ErrorKind, reason: String },
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub opportunity_id: Uuid,
    pub pair: TokenPair,
    pub path: Option<ExecutionPath>,
    pub outcome: TradeOutcome,
    pub size: Decimal,
    pub realized_pnl: Decimal,
    pub signature: Option<String>,
    /// Milliseconds from detection to the final outcome.
    pub latency_ms: u64,
    pub attempts: u32,
    pub completed_at: DateTime<Utc>,
}

impl TradeResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TradeOutcome::Confirmed | TradeOutcome::Simulated)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, TradeOutcome::Failed { .. })
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            TradeOutcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            TradeOutcome::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}
