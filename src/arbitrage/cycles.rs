//! Bounded depth-first search for profitable exchange cycles

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::debug;
use crate::config::Config;
use crate::types::{ArbitrageOpportunity, OpportunitySource, PriceQuote};
use super::{ExchangeEdge, ExchangeGraph};

#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Token every cycle starts and ends at.
    pub quote_token: String,
    pub max_hops: usize,
    /// Net profit, in percent, a cycle must exceed.
    pub min_profit_pct: Decimal,
    /// Estimated network cost as a percentage of trade size.
    pub network_fee_pct: Decimal,
    pub max_quote_age: Duration,
    pub opportunity_ttl: Duration,
}

impl DetectionConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            quote_token: config.quote_token.clone(),
            max_hops: config.max_hops,
            min_profit_pct: config.min_profit_pct,
            network_fee_pct: config.network_fee_pct,
            max_quote_age: Duration::milliseconds(config.max_quote_age_ms as i64),
            opportunity_ttl: Duration::milliseconds(config.opportunity_ttl_ms as i64),
        }
    }

    /// Rate product a cycle must beat to clear fees and the threshold.
    pub fn threshold_ratio(&self) -> Decimal {
        Decimal::ONE + (self.min_profit_pct + self.network_fee_pct) / dec!(100)
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    vertex: usize,
    cursor: usize,
    product: Decimal,
}

/// Search over one graph. Each call to [`CycleSearch::iter`] restarts the
/// traversal from scratch; nothing carries over between iterators.
pub struct CycleSearch<'q> {
    graph: ExchangeGraph<'q>,
    config: DetectionConfig,
    start: Option<usize>,
    bounds: Vec<Vec<Option<Decimal>>>,
    detected_at: DateTime<Utc>,
}

impl<'q> CycleSearch<'q> {
    pub fn new(quotes: &'q [PriceQuote], config: DetectionConfig, detected_at: DateTime<Utc>) -> Self {
        let graph = ExchangeGraph::build(quotes);
        let start = graph.token_index(&config.quote_token);
        let bounds = match start {
            Some(start) => graph.best_return_bounds(start, config.max_hops),
            None => Vec::new(),
        };
        Self {
            graph,
            config,
            start,
            bounds,
            detected_at,
        }
    }

    pub fn graph(&self) -> &ExchangeGraph<'q> {
        &self.graph
    }

    /// Lazily yields every qualifying cycle in traversal order.
    pub fn iter(&self) -> CycleIter<'_, 'q> {
        self.iter_until(None)
    }

    /// Like [`CycleSearch::iter`], but stops once `deadline` passes and
    /// records that it did.
    pub fn iter_until(&self, deadline: Option<Instant>) -> CycleIter<'_, 'q> {
        let mut stack = Vec::new();
        let mut visited = vec![false; self.graph.token_count()];
        if let Some(start) = self.start {
            stack.push(Frame {
                vertex: start,
                cursor: 0,
                product: Decimal::ONE,
            });
            visited[start] = true;
        }

        CycleIter {
            search: self,
            stack,
            path: Vec::new(),
            used_quotes: BTreeSet::new(),
            visited,
            deadline,
            timed_out: false,
            pruned: 0,
        }
    }

    /// Runs the search to completion (or the deadline) and keeps the best
    /// cycle per token set: highest net profit, then fewest hops, then the
    /// earliest found.
    pub fn best_per_token_set(&self, deadline: Option<Instant>) -> SearchOutcome {
        let mut iter = self.iter_until(deadline);
        let mut best: HashMap<BTreeSet<String>, (usize, ArbitrageOpportunity)> = HashMap::new();
        let mut found = 0;

        for (order, opportunity) in iter.by_ref().enumerate() {
            found += 1;
            let key = opportunity.token_set();
            let replace = match best.get(&key) {
                None => true,
                Some((_, current)) => {
                    opportunity.net_profit_pct > current.net_profit_pct
                        || (opportunity.net_profit_pct == current.net_profit_pct
                            && opportunity.hop_count() < current.hop_count())
                }
            };
            if replace {
                best.insert(key, (order, opportunity));
            }
        }

        let mut ranked: Vec<(usize, ArbitrageOpportunity)> = best.into_values().collect();
        ranked.sort_by_key(|(order, _)| *order);

        debug!(
            cycles = found,
            kept = ranked.len(),
            pruned = iter.pruned,
            timed_out = iter.timed_out,
            "Cycle search finished"
        );

        SearchOutcome {
            opportunities: ranked.into_iter().map(|(_, opp)| opp).collect(),
            cycles_found: found,
            pruned: iter.pruned,
            timed_out: iter.timed_out,
        }
    }

    fn build_opportunity(&self, path: &[&ExchangeEdge<'q>]) -> Option<ArbitrageOpportunity> {
        let hops = path.iter().map(|edge| edge.to_leg()).collect();
        ArbitrageOpportunity::from_route(OpportunitySource::Cycle, hops, self.config.network_fee_pct, self.detected_at)
            .map(|opp| opp.with_expiry(self.config.opportunity_ttl))
    }
}

#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub opportunities: Vec<ArbitrageOpportunity>,
    pub cycles_found: usize,
    pub pruned: usize,
    pub timed_out: bool,
}

pub struct CycleIter<'s, 'q> {
    search: &'s CycleSearch<'q>,
    stack: Vec<Frame>,
    path: Vec<&'s ExchangeEdge<'q>>,
    used_quotes: BTreeSet<usize>,
    visited: Vec<bool>,
    deadline: Option<Instant>,
    timed_out: bool,
    pruned: usize,
}

impl CycleIter<'_, '_> {
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn pruned(&self) -> usize {
        self.pruned
    }
}

impl<'s, 'q> Iterator for CycleIter<'s, 'q> {
    type Item = ArbitrageOpportunity;

    fn next(&mut self) -> Option<Self::Item> {
        let search = self.search;
        let start = search.start?;
        let max_hops = search.config.max_hops;
        let threshold = search.config.threshold_ratio();

        loop {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    self.timed_out = true;
                    self.stack.clear();
                    return None;
                }
            }

            let frame = self.stack.last_mut()?;
            let edges = search.graph.edges_from(frame.vertex);

            if frame.cursor >= edges.len() {
                // Exhausted this vertex: backtrack.
                let finished = self.stack.pop()?;
                if finished.vertex != start {
                    self.visited[finished.vertex] = false;
                }
                if let Some(edge) = self.path.pop() {
                    self.used_quotes.remove(&edge.quote_index);
                }
                continue;
            }

            let edge = &edges[frame.cursor];
            frame.cursor += 1;
            // Extreme quotes can overflow the product; such an edge is unusable.
            let Some(product) = frame.product.checked_mul(edge.effective_rate) else {
                continue;
            };

            // One venue may serve a given pair only once per cycle.
            if self.used_quotes.contains(&edge.quote_index) {
                continue;
            }

            let depth = self.path.len() + 1;

            if edge.to == start {
                if depth >= 2 && product > threshold {
                    let mut route = self.path.clone();
                    route.push(edge);
                    if let Some(opportunity) = search.build_opportunity(&route) {
                        return Some(opportunity);
                    }
                }
                continue;
            }

            if depth >= max_hops || self.visited[edge.to] {
                continue;
            }

            // Even with no further fees, can this prefix still clear the bar?
            let remaining = max_hops - depth;
            match search.bounds.get(remaining).and_then(|row| row[edge.to]) {
                Some(best) if product.checked_mul(best).unwrap_or(Decimal::MAX) > threshold => {}
                _ => {
                    self.pruned += 1;
                    continue;
                }
            }

            self.visited[edge.to] = true;
            self.used_quotes.insert(edge.quote_index);
            self.path.push(edge);
            self.stack.push(Frame {
                vertex: edge.to,
                cursor: 0,
                product,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Venue;

    fn config(min_profit_pct: Decimal) -> DetectionConfig {
        DetectionConfig {
            quote_token: "USDC".to_string(),
            max_hops: 3,
            min_profit_pct,
            network_fee_pct: Decimal::ZERO,
            max_quote_age: Duration::seconds(5),
            opportunity_ttl: Duration::seconds(2),
        }
    }

    fn quote(venue: Venue, pair: &str, bid: Decimal, ask: Decimal) -> PriceQuote {
        PriceQuote::new(venue, pair.parse().unwrap(), bid, ask, Utc::now())
    }

    #[test]
    fn finds_two_venue_cycle() {
        let quotes = vec![
            quote(Venue::Raydium, "SOL/USDC", dec!(99.9), dec!(100)),
            quote(Venue::Orca, "SOL/USDC", dec!(102), dec!(102.1)),
        ];
        let search = CycleSearch::new(&quotes, config(dec!(0.5)), Utc::now());
        let found: Vec<_> = search.iter().collect();

        assert_eq!(found.len(), 1);
        let opp = &found[0];
        assert_eq!(opp.buy_venue, Venue::Raydium);
        assert_eq!(opp.sell_venue, Venue::Orca);
        assert_eq!(opp.hop_count(), 2);
        assert!(opp.net_profit_pct > dec!(0.5));
    }

    #[test]
    fn same_venue_round_trip_is_never_a_cycle() {
        // A crossed-looking but single-venue market must not loop on itself.
        let quotes = vec![quote(Venue::Raydium, "SOL/USDC", dec!(100), dec!(100))];
        let search = CycleSearch::new(&quotes, config(Decimal::ZERO), Utc::now());
        assert_eq!(search.iter().count(), 0);
    }

    #[test]
    fn finds_triangle_through_intermediate_token() {
        // USDC -> SOL -> RAY -> USDC: 1/100 * 50 * 2.1 = 1.05 before fees.
        let quotes = vec![
            quote(Venue::Raydium, "SOL/USDC", dec!(99.9), dec!(100)),
            quote(Venue::Orca, "SOL/RAY", dec!(50), dec!(50.1)),
            quote(Venue::Meteora, "RAY/USDC", dec!(2.1), dec!(2.11)),
        ];
        let search = CycleSearch::new(&quotes, config(dec!(1)), Utc::now());
        let outcome = search.best_per_token_set(None);

        assert_eq!(outcome.opportunities.len(), 1);
        let opp = &outcome.opportunities[0];
        assert_eq!(opp.hop_count(), 3);
        assert_eq!(opp.route_description(), "USDC → [Raydium] SOL → [Orca] RAY → [Meteora] USDC");
        assert!(!outcome.timed_out);
    }

    #[test]
    fn respects_hop_limit() {
        let quotes = vec![
            quote(Venue::Raydium, "SOL/USDC", dec!(99.9), dec!(100)),
            quote(Venue::Orca, "SOL/RAY", dec!(50), dec!(50.1)),
            quote(Venue::Meteora, "RAY/USDC", dec!(2.1), dec!(2.11)),
        ];
        let mut cfg = config(dec!(1));
        cfg.max_hops = 2;
        let search = CycleSearch::new(&quotes, cfg, Utc::now());
        assert_eq!(search.iter().count(), 0);
    }

    #[test]
    fn keeps_best_cycle_per_token_set() {
        let quotes = vec![
            quote(Venue::Raydium, "SOL/USDC", dec!(99.9), dec!(100)),
            quote(Venue::Orca, "SOL/USDC", dec!(102), dec!(102.1)),
            quote(Venue::Jupiter, "SOL/USDC", dec!(103), dec!(103.1)),
        ];
        let search = CycleSearch::new(&quotes, config(dec!(0.5)), Utc::now());
        let outcome = search.best_per_token_set(None);

        assert!(outcome.cycles_found >= 2);
        assert_eq!(outcome.opportunities.len(), 1);
        assert_eq!(outcome.opportunities[0].buy_venue, Venue::Raydium);
        assert_eq!(outcome.opportunities[0].sell_venue, Venue::Jupiter);
    }

    #[test]
    fn expired_deadline_stops_search() {
        let quotes = vec![
            quote(Venue::Raydium, "SOL/USDC", dec!(99.9), dec!(100)),
            quote(Venue::Orca, "SOL/USDC", dec!(102), dec!(102.1)),
        ];
        let search = CycleSearch::new(&quotes, config(dec!(0.5)), Utc::now());
        let mut iter = search.iter_until(Some(Instant::now()));
        assert!(iter.next().is_none());
        assert!(iter.timed_out());
    }

    #[test]
    fn overflowing_rate_products_are_skipped() {
        // USDC -> X -> Y compounds to 1e40, beyond Decimal's range.
        let quotes = vec![
            quote(Venue::Raydium, "X/USDC", dec!(0.000000000000000000009), dec!(0.00000000000000000001)),
            quote(Venue::Orca, "Y/X", dec!(0.000000000000000000009), dec!(0.00000000000000000001)),
            quote(Venue::Meteora, "Y/USDC", dec!(1), dec!(2)),
        ];
        let search = CycleSearch::new(&quotes, config(Decimal::ZERO), Utc::now());
        let outcome = search.best_per_token_set(None);
        assert!(outcome.opportunities.iter().all(|opp| opp.hop_count() <= 3));
        assert!(!outcome.timed_out);
    }

    #[test]
    fn missing_quote_token_yields_nothing() {
        let quotes = vec![quote(Venue::Orca, "SOL/RAY", dec!(50), dec!(50.1))];
        let search = CycleSearch::new(&quotes, config(Decimal::ZERO), Utc::now());
        assert_eq!(search.iter().count(), 0);
    }
}
