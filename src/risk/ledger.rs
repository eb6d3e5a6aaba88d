//! Daily realized P&L ledger with per-pair cooldowns

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};
use crate::types::{TokenPair, TradeResult};

#[derive(Debug, Clone)]
pub struct DailyLedger {
    day: NaiveDate,
    realized_pnl: Decimal,
    consecutive_losses: u32,
    trades: u32,
    wins: u32,
    losses: u32,
    pair_cooldowns: HashMap<TokenPair, DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub day: NaiveDate,
    pub realized_pnl: Decimal,
    pub consecutive_losses: u32,
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub pairs_cooling_down: usize,
}

impl DailyLedger {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            day: now.date_naive(),
            realized_pnl: Decimal::ZERO,
            consecutive_losses: 0,
            trades: 0,
            wins: 0,
            losses: 0,
            pair_cooldowns: HashMap::new(),
        }
    }

    /// Resets the counters when the UTC calendar day changes. Cooldowns
    /// that have not expired yet survive the reset.
    pub fn roll_if_new_day(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        if today == self.day {
            return false;
        }

        info!(
            previous_day = %self.day,
            realized_pnl = %self.realized_pnl,
            trades = self.trades,
            "📅 New trading day, resetting daily ledger"
        );
        self.day = today;
        self.realized_pnl = Decimal::ZERO;
        self.consecutive_losses = 0;
        self.trades = 0;
        self.wins = 0;
        self.losses = 0;
        self.pair_cooldowns.retain(|_, until| *until > now);
        true
    }

    /// Books a finished trade. Failures extend the consecutive-loss run and
    /// put every pair the trade touched on cooldown.
    pub fn record(&mut self, result: &TradeResult, pairs: &[TokenPair], cooldown: Duration, now: DateTime<Utc>) {
        self.roll_if_new_day(now);
        self.trades += 1;
        self.realized_pnl += result.realized_pnl;

        if result.is_failure() {
            self.losses += 1;
            self.consecutive_losses += 1;
            let until = now + cooldown;
            for pair in pairs {
                self.pair_cooldowns.insert(pair.clone(), until);
            }
            warn!(
                pair = %result.pair,
                consecutive_losses = self.consecutive_losses,
                cooldown_until = %until,
                "Trade failed, pair placed on cooldown"
            );
        } else {
            self.wins += 1;
            self.consecutive_losses = 0;
        }
    }

    pub fn cooldown_until(&self, pair: &TokenPair, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.pair_cooldowns.get(pair).copied().filter(|until| *until > now)
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    /// Realized loss for the day as a positive number; zero when in profit.
    pub fn daily_loss(&self) -> Decimal {
        (-self.realized_pnl).max(Decimal::ZERO)
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    pub fn summary(&self, now: DateTime<Utc>) -> LedgerSummary {
        LedgerSummary {
            day: self.day,
            realized_pnl: self.realized_pnl,
            consecutive_losses: self.consecutive_losses,
            trades: self.trades,
            wins: self.wins,
            losses: self.losses,
            pairs_cooling_down: self.pair_cooldowns.values().filter(|until| **until > now).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::types::TradeOutcome;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn result(outcome: TradeOutcome, pnl: Decimal, at: DateTime<Utc>) -> TradeResult {
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
            completed_at: at,
        }
    }

    fn failed() -> TradeOutcome {
        TradeOutcome::Failed {
            kind: ErrorKind::SimulationFailed,
            reason: "simulation failed".to_string(),
        }
    }

    #[test]
    fn failures_accumulate_and_success_resets() {
        let now = Utc::now();
        let pair = TokenPair::new("SOL", "USDC");
        let mut ledger = DailyLedger::new(now);

        ledger.record(&result(failed(), dec!(-1), now), &[pair.clone()], Duration::seconds(60), now);
        ledger.record(&result(failed(), dec!(-2), now), &[pair.clone()], Duration::seconds(60), now);
        assert_eq!(ledger.consecutive_losses(), 2);
        assert_eq!(ledger.daily_loss(), dec!(3));
        assert!(ledger.cooldown_until(&pair, now).is_some());
        assert!(ledger.cooldown_until(&pair, now + Duration::seconds(61)).is_none());

        ledger.record(&result(TradeOutcome::Confirmed, dec!(5), now), &[pair], Duration::seconds(60), now);
        assert_eq!(ledger.consecutive_losses(), 0);
        assert_eq!(ledger.daily_loss(), Decimal::ZERO);
        assert_eq!(ledger.summary(now).trades, 3);
    }

    #[test]
    fn new_day_resets_counters_but_keeps_live_cooldowns() {
        let late = DateTime::parse_from_rfc3339("2024-03-01T23:59:30Z").unwrap().with_timezone(&Utc);
        let pair = TokenPair::new("SOL", "USDC");
        let mut ledger = DailyLedger::new(late);
        ledger.record(&result(failed(), dec!(-10), late), &[pair.clone()], Duration::seconds(120), late);

        let next_day = late + Duration::seconds(60);
        assert!(ledger.roll_if_new_day(next_day));
        assert_eq!(ledger.realized_pnl(), Decimal::ZERO);
        assert_eq!(ledger.consecutive_losses(), 0);
        assert!(ledger.cooldown_until(&pair, next_day).is_some());
    }
}
