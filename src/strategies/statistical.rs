//! Mean-reversion signals from a rolling window of mid prices

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use tracing::debug;
use crate::errors::{BotError, BotResult};
use crate::types::{ArbitrageOpportunity, OpportunitySource, PriceQuote, TokenPair, Venue};
use crate::utils::mean_and_std_dev;
use crate::venues::QuoteSnapshot;
use super::{SignalGenerator, StrategyConfig};

struct PriceWindow {
    mids: VecDeque<f64>,
    last_seen: DateTime<Utc>,
}

/// Tracks each non-reference venue's mid price. When a new mid strays more
/// than `z_threshold` deviations from its window mean, the generator bets on
/// reversion against the reference venue.
pub struct StatisticalGenerator {
    config: StrategyConfig,
    windows: HashMap<(Venue, TokenPair), PriceWindow>,
}

impl StatisticalGenerator {
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            config,
            windows: HashMap::new(),
        }
    }

    pub fn window_len(&self, venue: Venue, pair: &TokenPair) -> usize {
        self.windows
            .get(&(venue, pair.clone()))
            .map(|w| w.mids.len())
            .unwrap_or(0)
    }

    /// Feeds one quote; returns a signal computed against the history that
    /// preceded it.
    fn observe(&mut self, quote: &PriceQuote, now: DateTime<Utc>) -> BotResult<Option<ArbitrageOpportunity>> {
        let mid = quote.mid.to_f64().ok_or_else(|| BotError::DataParsing {
            context: format!("{} {} mid", quote.venue, quote.pair),
            source: anyhow::anyhow!("mid price {} not representable", quote.mid),
        })?;

        let capacity = self.config.window;
        let window = self
            .windows
            .entry((quote.venue, quote.pair.clone()))
            .or_insert_with(|| PriceWindow {
                mids: VecDeque::with_capacity(capacity),
                last_seen: DateTime::<Utc>::MIN_UTC,
            });

        if quote.observed_at <= window.last_seen {
            return Ok(None);
        }
        window.last_seen = quote.observed_at;

        let stats = if window.mids.len() >= capacity {
            mean_and_std_dev(window.mids.make_contiguous())
        } else {
            None
        };

        window.mids.push_back(mid);
        while window.mids.len() > capacity {
            window.mids.pop_front();
        }

        let Some((mean, std_dev)) = stats else {
            return Ok(None);
        };
        if std_dev <= f64::EPSILON || mean <= 0.0 {
            return Ok(None);
        }

        let z = (mid - mean) / std_dev;
        let threshold = self.config.z_threshold.to_f64().unwrap_or(f64::MAX);
        if z.abs() <= threshold {
            return Ok(None);
        }

        let Some(mean_price) = Decimal::from_f64(mean) else {
            return Ok(None);
        };
        Ok(self.signal(quote, mean_price, z, now))
    }

    fn signal(&self, quote: &PriceQuote, mean: Decimal, z: f64, now: DateTime<Utc>) -> Option<ArbitrageOpportunity> {
        let reference = self.config.reference_venue;
        // Above the mean: sell here, buy back on the reference venue.
        let (buy_venue, buy_price, sell_venue, sell_price) = if z > 0.0 {
            (reference, mean, quote.venue, quote.mid)
        } else {
            (quote.venue, quote.mid, reference, mean)
        };

        let mut opportunity = ArbitrageOpportunity::two_venue(
            OpportunitySource::Statistical,
            quote.pair.clone(),
            buy_venue,
            buy_price,
            sell_venue,
            sell_price,
            self.config.network_fee_pct,
            now,
        )?;

        let deviation = (quote.mid - mean).abs() / mean * dec!(100);
        opportunity.gross_profit_pct = deviation;
        opportunity.net_profit_pct = deviation
            - buy_venue.fee_percentage()
            - sell_venue.fee_percentage()
            - self.config.network_fee_pct;

        if opportunity.net_profit_pct <= Decimal::ZERO {
            return None;
        }

        let confidence = Decimal::from_f64(z.abs()).unwrap_or(self.config.max_multiple);
        let size = (self.config.base_size * confidence.min(self.config.max_multiple)).min(self.config.max_position_size);

        debug!(
            venue = %quote.venue,
            pair = %quote.pair,
            z_score = z,
            net_profit_pct = %opportunity.net_profit_pct,
            "Statistical deviation signal"
        );

        Some(opportunity.with_recommended_size(size).with_expiry(self.config.opportunity_ttl))
    }
}

impl SignalGenerator for StatisticalGenerator {
    fn name(&self) -> &'static str {
        "statistical"
    }

    fn set_max_position_size(&mut self, max: Decimal) {
        self.config.max_position_size = max;
    }

    fn generate(&mut self, snapshot: &QuoteSnapshot, now: DateTime<Utc>) -> BotResult<Vec<ArbitrageOpportunity>> {
        let mut found = Vec::new();
        for quote in &snapshot.quotes {
            if quote.venue == self.config.reference_venue {
                continue;
            }
            if let Some(opportunity) = self.observe(quote, now)? {
                found.push(opportunity);
            }
        }
        Ok(found)
    }
}
