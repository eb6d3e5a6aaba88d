//! Realized volatility of mid prices, per pair

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::*;
use std::collections::{HashMap, VecDeque};
use tracing::warn;
use crate::types::TokenPair;
use crate::utils::mean_and_std_dev;
use crate::venues::QuoteSnapshot;

const MIN_SAMPLES: usize = 10;

struct PairWindow {
    samples: VecDeque<(DateTime<Utc>, f64)>,
}

impl PairWindow {
    fn add_value(&mut self, at: DateTime<Utc>, price: f64, max_age: Duration) {
        if let Some((last, _)) = self.samples.back() {
            if at <= *last {
                return;
            }
        }
        self.samples.push_back((at, price));

        while let Some((timestamp, _)) = self.samples.front() {
            if at - *timestamp > max_age {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn volatility_percentage(&self) -> Option<f64> {
        if self.samples.len() < MIN_SAMPLES {
            return None;
        }
        let prices: Vec<f64> = self.samples.iter().map(|(_, price)| *price).collect();
        let (mean, std_dev) = mean_and_std_dev(&prices)?;
        if mean > 0.0 { Some(std_dev / mean * 100.0) } else { None }
    }
}

/// Rolling standard deviation of each pair's average mid price, as a
/// percentage of the mean. Needs at least ten samples.
pub struct VolatilityTracker {
    windows: HashMap<TokenPair, PairWindow>,
    max_age: Duration,
}

impl VolatilityTracker {
    pub fn new(max_age: Duration) -> Self {
        Self {
            windows: HashMap::new(),
            max_age,
        }
    }

    pub fn add_value(&mut self, pair: &TokenPair, at: DateTime<Utc>, price: Decimal) {
        let Some(price) = price.to_f64() else {
            warn!(pair = %pair, "Mid price not representable, skipping volatility sample");
            return;
        };
        let max_age = self.max_age;
        self.windows
            .entry(pair.clone())
            .or_insert_with(|| PairWindow { samples: VecDeque::new() })
            .add_value(at, price, max_age);
    }

    /// Samples one averaged mid per pair, stamped with the pair's newest
    /// observation so an unchanged snapshot adds nothing.
    pub fn observe_snapshot(&mut self, snapshot: &QuoteSnapshot) {
        for (pair, quotes) in snapshot.by_pair() {
            let Some(latest) = quotes.iter().map(|q| q.observed_at).max() else {
                continue;
            };
            let mean_mid = quotes.iter().map(|q| q.mid).sum::<Decimal>() / Decimal::from(quotes.len());
            self.add_value(pair, latest, mean_mid);
        }
    }

    pub fn volatility_pct(&self, pair: &TokenPair) -> Option<Decimal> {
        self.windows
            .get(pair)
            .and_then(PairWindow::volatility_percentage)
            .and_then(Decimal::from_f64)
    }

    /// Worst volatility among the given pairs, if any of them is known.
    pub fn worst_of<'a>(&self, pairs: impl IntoIterator<Item = &'a TokenPair>) -> Option<Decimal> {
        pairs.into_iter().filter_map(|pair| self.volatility_pct(pair)).max()
    }

    pub fn sample_count(&self, pair: &TokenPair) -> usize {
        self.windows.get(pair).map(|w| w.samples.len()).unwrap_or(0)
    }
}
