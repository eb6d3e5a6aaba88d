//! One detection tick: poll, search, decide, dispatch

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use crate::arbitrage::{CycleSearch, DetectionConfig, SearchOutcome, detect_spreads};
use crate::config::RiskConfigManager;
use crate::events::{BotEvent, EventBus};
use crate::execution::ExecutionEngine;
use crate::risk::{ExecutionPermit, Redemption, RiskGate};
use crate::storage::save_trade_result;
use crate::strategies::StrategyRegistry;
use crate::types::{ArbitrageOpportunity, TokenPair, TradeResult, Venue};
use crate::venues::{QuoteBook, VenueGateway, poll_quotes};
use super::SessionStats;

/// What one tick did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub quotes: usize,
    pub opportunities: usize,
    pub dispatched: usize,
    pub skipped: bool,
}

pub struct Pipeline {
    gateway: Arc<dyn VenueGateway>,
    venues: Vec<Venue>,
    pairs: Vec<TokenPair>,
    quote_book: QuoteBook,
    detection: DetectionConfig,
    search_budget: Duration,
    strategies: StrategyRegistry,
    gate: Arc<RiskGate>,
    engine: Arc<ExecutionEngine>,
    risk_config: RiskConfigManager,
    events: EventBus,
    executions: JoinSet<Option<TradeResult>>,
    trades_dir: Option<PathBuf>,
    stats: SessionStats,
    tick: u64,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<dyn VenueGateway>,
        venues: Vec<Venue>,
        pairs: Vec<TokenPair>,
        detection: DetectionConfig,
        search_budget: Duration,
        strategies: StrategyRegistry,
        gate: Arc<RiskGate>,
        engine: Arc<ExecutionEngine>,
        risk_config: RiskConfigManager,
        events: EventBus,
    ) -> Self {
        let mut pipeline = Self {
            gateway,
            venues,
            pairs,
            quote_book: QuoteBook::new(),
            detection,
            search_budget,
            strategies,
            gate,
            engine,
            risk_config,
            events,
            executions: JoinSet::new(),
            trades_dir: None,
            stats: SessionStats::new(),
            tick: 0,
        };
        pipeline.apply_risk_limits();
        pipeline
    }

    /// Appends every trade result to a JSONL file under `dir`.
    pub fn with_trade_log(mut self, dir: PathBuf) -> Self {
        self.trades_dir = Some(dir);
        self
    }

    pub fn gate(&self) -> &Arc<RiskGate> {
        &self.gate
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn in_flight(&self) -> usize {
        self.executions.len()
    }

    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        self.tick += 1;
        self.stats.ticks += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        self.reap_finished();
        self.reload_risk_config().await;

        for result in poll_quotes(&self.gateway, &self.venues, &self.pairs).await {
            match result {
                Ok(quote) => {
                    self.stats.quotes_received += 1;
                    self.quote_book.upsert(quote);
                }
                Err(e) => {
                    self.stats.quote_errors += 1;
                    debug!(error = %e, "Quote unavailable this tick");
                }
            }
        }

        let snapshot = Arc::new(self.quote_book.fresh_snapshot(now, self.detection.max_quote_age));
        report.quotes = snapshot.quotes.len();
        self.gate.observe_quotes(&snapshot, now).await;

        let search_snapshot = snapshot.clone();
        let detection = self.detection.clone();
        let deadline = Instant::now() + self.search_budget;
        let search = tokio::task::spawn_blocking(move || {
            CycleSearch::new(&search_snapshot.quotes, detection, now).best_per_token_set(Some(deadline))
        });

        let mut candidates = self.strategies.run(&snapshot, now);
        candidates.extend(detect_spreads(&snapshot, &self.detection, now));

        let outcome = match tokio::time::timeout(self.search_budget * 2, search).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!("Cycle search task failed: {}", e);
                SearchOutcome {
                    timed_out: true,
                    ..SearchOutcome::default()
                }
            }
            Err(_) => SearchOutcome {
                timed_out: true,
                ..SearchOutcome::default()
            },
        };

        if outcome.timed_out {
            warn!(
                tick = self.tick,
                budget_ms = self.search_budget.as_millis() as u64,
                cycles_found = outcome.cycles_found,
                "⚠️ Cycle search exceeded its budget, skipping tick"
            );
            self.stats.ticks_skipped += 1;
            self.events.publish(BotEvent::TickSkipped {
                tick: self.tick,
                reason: "cycle search exceeded its time budget".to_string(),
                at: Utc::now(),
            });
            report.skipped = true;
            return report;
        }

        candidates.extend(outcome.opportunities);
        let ranked = rank_opportunities(candidates);
        report.opportunities = ranked.len();
        self.stats.opportunities_detected += ranked.len() as u64;

        for opportunity in &ranked {
            info!(
                id = %opportunity.id,
                source = %opportunity.source,
                route = %opportunity.route_description(),
                net_profit_pct = %opportunity.net_profit_pct.round_dp(4),
                "🎯 Opportunity detected"
            );
            self.events.publish(BotEvent::OpportunityDetected(opportunity.clone()));
        }

        for opportunity in &ranked {
            let decision = self.gate.decide(opportunity, now).await;
            self.stats.record_decision(&decision.decision);
            if let Some(permit) = decision.permit {
                self.dispatch(permit);
                report.dispatched += 1;
            }
        }

        debug!(
            tick = report.tick,
            quotes = report.quotes,
            opportunities = report.opportunities,
            dispatched = report.dispatched,
            in_flight = self.executions.len(),
            "Tick complete"
        );
        report
    }

    /// Engages the kill switch on the gate and waits for every in-flight
    /// execution to reach a final outcome.
    pub async fn shutdown(&mut self, source: &str) {
        self.gate.engage_kill(source, Utc::now()).await;
        let pending = self.executions.len();
        if pending > 0 {
            info!(pending, "⏳ Waiting for in-flight executions to finish");
        }
        self.drain().await;
    }

    pub async fn drain(&mut self) {
        while let Some(joined) = self.executions.join_next().await {
            self.record_joined(joined);
        }
    }

    fn dispatch(&mut self, permit: ExecutionPermit) {
        let gate = self.gate.clone();
        let engine = self.engine.clone();
        let events = self.events.clone();
        let trades_dir = self.trades_dir.clone();

        self.executions.spawn(async move {
            let trade = match gate.redeem(permit).await {
                Redemption::Proceed(trade) => trade,
                Redemption::Revoked(decision) => {
                    debug!(id = %decision.opportunity_id(), reason = %decision.reason(), "Permit revoked before execution");
                    return None;
                }
            };

            let result = engine.execute(&trade).await;
            gate.record_outcome(&trade, &result, Utc::now()).await;
            events.publish(BotEvent::trade_outcome(result.clone()));

            if let Some(dir) = &trades_dir {
                if let Err(e) = save_trade_result(dir, &result) {
                    error!("Failed to save trade result {}: {}", result.opportunity_id, e);
                }
            }
            Some(result)
        });
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.executions.try_join_next() {
            self.record_joined(joined);
        }
    }

    fn record_joined(&mut self, joined: Result<Option<TradeResult>, tokio::task::JoinError>) {
        match joined {
            Ok(Some(result)) => self.stats.record_result(&result),
            Ok(None) => {}
            Err(e) => error!("Execution task panicked: {}", e),
        }
    }

    /// Pushes the snapshot's profit floor into detection and its position
    /// ceiling into the strategies.
    fn apply_risk_limits(&mut self) {
        let risk = self.risk_config.current();
        self.detection.min_profit_pct = risk.min_profit_threshold;
        self.strategies.set_max_position_size(risk.max_position_size);
    }

    async fn reload_risk_config(&mut self) {
        match self.risk_config.reload_if_modified() {
            Ok(false) => {}
            Ok(true) => {
                self.apply_risk_limits();
                self.gate.update_config(self.risk_config.current().clone()).await;
                self.events.publish(BotEvent::ConfigReloaded {
                    accepted: true,
                    reason: None,
                    at: Utc::now(),
                });
            }
            Err(e) => {
                self.events.publish(BotEvent::ConfigReloaded {
                    accepted: false,
                    reason: Some(e.to_string()),
                    at: Utc::now(),
                });
            }
        }
    }
}

/// Collapses opportunities that trade the same route, keeping the most
/// profitable, and orders the rest by net profit descending. Ties keep the
/// shorter route first.
pub fn rank_opportunities(candidates: Vec<ArbitrageOpportunity>) -> Vec<ArbitrageOpportunity> {
    let mut by_route: HashMap<String, ArbitrageOpportunity> = HashMap::new();
    for opportunity in candidates {
        let key = opportunity.route_key();
        let dominated = by_route
            .get(&key)
            .is_some_and(|current| current.net_profit_pct >= opportunity.net_profit_pct);
        if !dominated {
            by_route.insert(key, opportunity);
        }
    }

    let mut ranked: Vec<ArbitrageOpportunity> = by_route.into_values().collect();
    ranked.sort_by(|a, b| {
        b.net_profit_pct
            .cmp(&a.net_profit_pct)
            .then_with(|| a.hop_count().cmp(&b.hop_count()))
            .then_with(|| a.detected_at.cmp(&b.detected_at))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OpportunitySource;
    use rust_decimal_macros::dec;

    fn spread(buy: Venue, buy_price: rust_decimal::Decimal, sell: Venue, sell_price: rust_decimal::Decimal) -> ArbitrageOpportunity {
        ArbitrageOpportunity::two_venue(
            OpportunitySource::Spread,
            TokenPair::new("SOL", "USDC"),
            buy,
            buy_price,
            sell,
            sell_price,
            dec!(0.01),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn ranking_dedupes_routes_and_orders_by_net_profit() {
        let weak = spread(Venue::Raydium, dec!(100), Venue::Orca, dec!(101));
        let strong_same_route = spread(Venue::Raydium, dec!(100), Venue::Orca, dec!(102));
        let other = spread(Venue::Orca, dec!(100), Venue::Jupiter, dec!(101.5));

        let ranked = rank_opportunities(vec![weak, other.clone(), strong_same_route.clone()]);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, strong_same_route.id);
        assert_eq!(ranked[1].id, other.id);
    }
}
