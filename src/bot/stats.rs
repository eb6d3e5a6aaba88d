//! Session counters reported periodically and at shutdown

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Instant;
use crate::errors::ErrorKind;
use crate::types::{RiskDecision, TradeOutcome, TradeResult};

#[derive(Debug, Clone)]
pub struct SessionStats {
    pub started: Instant,
    pub ticks: u64,
    pub ticks_skipped: u64,
    pub quotes_received: u64,
    pub quote_errors: u64,
    pub opportunities_detected: u64,
    pub approved: u64,
    pub reduced: u64,
    pub rejected: u64,
    pub executed: u64,
    pub confirmed: u64,
    pub simulated: u64,
    pub failed: u64,
    pub realized_pnl: Decimal,
    pub rejections: HashMap<String, u32>,
    pub failures: HashMap<ErrorKind, u32>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            ticks: 0,
            ticks_skipped: 0,
            quotes_received: 0,
            quote_errors: 0,
            opportunities_detected: 0,
            approved: 0,
            reduced: 0,
            rejected: 0,
            executed: 0,
            confirmed: 0,
            simulated: 0,
            failed: 0,
            realized_pnl: Decimal::ZERO,
            rejections: HashMap::new(),
            failures: HashMap::new(),
        }
    }

    pub fn record_decision(&mut self, decision: &RiskDecision) {
        match decision {
            RiskDecision::Approved { .. } => self.approved += 1,
            RiskDecision::Reduced { .. } => self.reduced += 1,
            RiskDecision::Rejected { reason, .. } => {
                self.rejected += 1;
                let key = serde_json::to_value(reason)
                    .ok()
                    .and_then(|value| value.get("kind").and_then(|kind| kind.as_str()).map(str::to_string))
                    .unwrap_or_else(|| "unknown".to_string());
                *self.rejections.entry(key).or_insert(0) += 1;
            }
        }
    }

    pub fn record_result(&mut self, result: &TradeResult) {
        self.executed += 1;
        self.realized_pnl += result.realized_pnl;
        match &result.outcome {
            TradeOutcome::Confirmed => self.confirmed += 1,
            TradeOutcome::Simulated => self.simulated += 1,
            TradeOutcome::Failed { kind, .. } => {
                self.failed += 1;
                *self.failures.entry(*kind).or_insert(0) += 1;
            }
        }
    }

    pub fn runtime_minutes(&self) -> u64 {
        self.started.elapsed().as_secs() / 60
    }

    /// Fraction of executions that did not fail, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.executed == 0 {
            return 0.0;
        }
        (self.confirmed + self.simulated) as f64 / self.executed as f64 * 100.0
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArbitrageOpportunity, RejectReason, TokenPair, Venue};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn result(outcome: TradeOutcome, pnl: Decimal) -> TradeResult {
        TradeResult {
            opportunity_id: Uuid::new_v4(),
            pair: TokenPair::new("SOL", "USDC"),
            path: None,
            outcome,
            size: dec!(100),
            realized_pnl: pnl,
            signature: None,
            latency_ms: 10,
            attempts: 1,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn counts_outcomes_and_pnl() {
        let mut stats = SessionStats::new();
        stats.record_result(&result(TradeOutcome::Simulated, dec!(1.5)));
        stats.record_result(&result(
            TradeOutcome::Failed {
                kind: ErrorKind::SlippageExceeded,
                reason: "slippage".to_string(),
            },
            dec!(-0.5),
        ));

        assert_eq!(stats.executed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.realized_pnl, dec!(1.0));
        assert_eq!(stats.failures[&ErrorKind::SlippageExceeded], 1);
        assert!((stats.success_rate() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn groups_rejections_by_kind() {
        let opportunity = ArbitrageOpportunity::two_venue(
            crate::types::OpportunitySource::Spread,
            TokenPair::new("SOL", "USDC"),
            Venue::Raydium,
            dec!(100),
            Venue::Orca,
            dec!(101),
            dec!(0.01),
            Utc::now(),
        )
        .unwrap();
        let mut stats = SessionStats::new();
        stats.record_decision(&RiskDecision::rejected(&opportunity, RejectReason::Expired));
        stats.record_decision(&RiskDecision::rejected(&opportunity, RejectReason::Expired));

        assert_eq!(stats.rejected, 2);
        assert_eq!(stats.rejections["expired"], 2);
    }
}
