//! Latency-spread signals: trade against venues whose quotes lag the market

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;
use crate::errors::BotResult;
use crate::types::{ArbitrageOpportunity, OpportunitySource, PriceQuote, TokenPair, Venue};
use crate::venues::QuoteSnapshot;
use super::{SignalGenerator, StrategyConfig};

type LagKey = (TokenPair, Venue, Venue);

/// Compares each pair's freshest quote with quotes lagging it by more than
/// `latency_lag`. The same (lagging, fresh) observation pair is only ever
/// reported once.
pub struct LatencyGenerator {
    config: StrategyConfig,
    last_emitted: HashMap<LagKey, (DateTime<Utc>, DateTime<Utc>)>,
}

impl LatencyGenerator {
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            config,
            last_emitted: HashMap::new(),
        }
    }

    fn candidate(
        &self,
        pair: &TokenPair,
        buy: &PriceQuote,
        sell: &PriceQuote,
        now: DateTime<Utc>,
    ) -> Option<ArbitrageOpportunity> {
        let opportunity = ArbitrageOpportunity::two_venue(
            OpportunitySource::LatencySpread,
            pair.clone(),
            buy.venue,
            buy.ask,
            sell.venue,
            sell.bid,
            self.config.network_fee_pct,
            now,
        )?;

        if opportunity.net_profit_pct <= Decimal::ZERO {
            return None;
        }
        let size = self.config.latency_base_size.min(self.config.max_position_size);
        Some(opportunity.with_recommended_size(size).with_expiry(self.config.opportunity_ttl))
    }
}

impl SignalGenerator for LatencyGenerator {
    fn name(&self) -> &'static str {
        "latency-spread"
    }

    fn set_max_position_size(&mut self, max: Decimal) {
        self.config.max_position_size = max;
    }

    fn generate(&mut self, snapshot: &QuoteSnapshot, now: DateTime<Utc>) -> BotResult<Vec<ArbitrageOpportunity>> {
        let mut found = Vec::new();

        for (pair, quotes) in snapshot.by_pair() {
            let Some(fresh) = quotes.iter().max_by_key(|q| q.observed_at) else {
                continue;
            };

            for lagging in &quotes {
                if lagging.venue == fresh.venue || fresh.observed_at - lagging.observed_at <= self.config.latency_lag {
                    continue;
                }

                let key = (pair.clone(), lagging.venue, fresh.venue);
                let stamp = (lagging.observed_at, fresh.observed_at);
                if self.last_emitted.get(&key) == Some(&stamp) {
                    continue;
                }

                let signal = self
                    .candidate(pair, lagging, fresh, now)
                    .or_else(|| self.candidate(pair, fresh, lagging, now));

                if let Some(opportunity) = signal {
                    debug!(
                        pair = %pair,
                        lagging = %lagging.venue,
                        fresh = %fresh.venue,
                        lag_ms = (fresh.observed_at - lagging.observed_at).num_milliseconds(),
                        "Latency spread signal"
                    );
                    self.last_emitted.insert(key, stamp);
                    found.push(opportunity);
                }
            }
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn config() -> StrategyConfig {
        StrategyConfig {
            enable_statistical: false,
            window: 5,
            z_threshold: dec!(2),
            base_size: dec!(100),
            max_multiple: dec!(5),
            reference_venue: Venue::Jupiter,
            enable_latency: true,
            latency_lag: Duration::seconds(1),
            latency_base_size: dec!(150),
            max_position_size: dec!(1000),
            network_fee_pct: Decimal::ZERO,
            opportunity_ttl: Duration::seconds(2),
        }
    }

    fn snapshot(now: DateTime<Utc>, lag: Duration) -> QuoteSnapshot {
        let pair = TokenPair::new("SOL", "USDC");
        QuoteSnapshot::new(
            now,
            vec![
                PriceQuote::new(Venue::Orca, pair.clone(), dec!(99), dec!(99.1), now - lag),
                PriceQuote::new(Venue::Raydium, pair, dec!(101), dec!(101.1), now),
            ],
        )
    }

    #[test]
    fn buys_on_stale_venue_and_sells_on_fresh_one() {
        let now = Utc::now();
        let mut generator = LatencyGenerator::new(config());
        let found = generator.generate(&snapshot(now, Duration::seconds(2)), now).unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source, OpportunitySource::LatencySpread);
        assert_eq!(found[0].buy_venue, Venue::Orca);
        assert_eq!(found[0].sell_venue, Venue::Raydium);
        assert_eq!(found[0].recommended_size, Some(dec!(150)));
    }

    #[test]
    fn quotes_within_lag_window_are_ignored() {
        let now = Utc::now();
        let mut generator = LatencyGenerator::new(config());
        let found = generator.generate(&snapshot(now, Duration::milliseconds(500)), now).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn same_observations_emit_once() {
        let now = Utc::now();
        let mut generator = LatencyGenerator::new(config());
        let snap = snapshot(now, Duration::seconds(2));
        assert_eq!(generator.generate(&snap, now).unwrap().len(), 1);
        assert!(generator.generate(&snap, now).unwrap().is_empty());
    }
}
