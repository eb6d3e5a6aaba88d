//! Exchange-rate graph built from a quote snapshot

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeSet, HashMap};
use crate::types::{HopLeg, PriceQuote, TradeSide};

/// Directed edge: converting `from` into `to` through one venue quote.
#[derive(Debug, Clone)]
pub struct ExchangeEdge<'q> {
    pub from: usize,
    pub to: usize,
    pub side: TradeSide,
    /// Units of `to` per unit of `from`, before fees.
    pub rate: Decimal,
    /// `rate` net of the venue's trading fee.
    pub effective_rate: Decimal,
    /// Index of the source quote in the snapshot; also identifies the
    /// (venue, pair) leg.
    pub quote_index: usize,
    pub quote: &'q PriceQuote,
}

impl ExchangeEdge<'_> {
    pub fn to_leg(&self) -> HopLeg {
        match self.side {
            TradeSide::Buy => HopLeg::buy(self.quote.venue, self.quote.pair.clone(), self.quote.ask),
            TradeSide::Sell => HopLeg::sell(self.quote.venue, self.quote.pair.clone(), self.quote.bid),
        }
    }
}

/// Tokens are vertices, each quote contributes one edge per direction:
/// selling the base at the bid, and buying it at the ask.
#[derive(Debug)]
pub struct ExchangeGraph<'q> {
    tokens: Vec<String>,
    index: HashMap<String, usize>,
    adjacency: Vec<Vec<ExchangeEdge<'q>>>,
    edge_count: usize,
}

impl<'q> ExchangeGraph<'q> {
    /// Quotes are expected to be fresh already; malformed ones are skipped
    /// so no synthetic or undefined rate ever enters the graph.
    pub fn build(quotes: &'q [PriceQuote]) -> Self {
        let tokens: Vec<String> = quotes
            .iter()
            .filter(|quote| quote.is_well_formed())
            .flat_map(|quote| [quote.pair.base().to_string(), quote.pair.quote().to_string()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: HashMap<String, usize> = tokens.iter().enumerate().map(|(i, t)| (t.clone(), i)).collect();

        let mut adjacency: Vec<Vec<ExchangeEdge<'q>>> = vec![Vec::new(); tokens.len()];
        let mut edge_count = 0;

        for (quote_index, quote) in quotes.iter().enumerate() {
            if !quote.is_well_formed() {
                continue;
            }
            let (Some(&base), Some(&quote_token)) = (index.get(quote.pair.base()), index.get(quote.pair.quote())) else {
                continue;
            };
            let fee_factor = Decimal::ONE - quote.venue.fee_percentage() / dec!(100);

            let sell_rate = quote.bid;
            adjacency[base].push(ExchangeEdge {
                from: base,
                to: quote_token,
                side: TradeSide::Sell,
                rate: sell_rate,
                effective_rate: sell_rate * fee_factor,
                quote_index,
                quote,
            });

            let buy_rate = Decimal::ONE / quote.ask;
            adjacency[quote_token].push(ExchangeEdge {
                from: quote_token,
                to: base,
                side: TradeSide::Buy,
                rate: buy_rate,
                effective_rate: buy_rate * fee_factor,
                quote_index,
                quote,
            });
            edge_count += 2;
        }

        Self {
            tokens,
            index,
            adjacency,
            edge_count,
        }
    }

    pub fn token_index(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    pub fn token(&self, index: usize) -> &str {
        &self.tokens[index]
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn edges_from(&self, vertex: usize) -> &[ExchangeEdge<'q>] {
        &self.adjacency[vertex]
    }

    /// `bounds[k][v]`: the largest fee-free rate product of any walk of at
    /// most `k` hops from `v` back to `target`. Walks may repeat edges, so
    /// this over-estimates what a simple path can achieve, which is what a
    /// pruning bound needs.
    pub fn best_return_bounds(&self, target: usize, max_hops: usize) -> Vec<Vec<Option<Decimal>>> {
        let n = self.tokens.len();
        let mut bounds = vec![vec![None; n]; max_hops + 1];
        if target >= n {
            return bounds;
        }
        bounds[0][target] = Some(Decimal::ONE);

        for k in 1..=max_hops {
            for v in 0..n {
                let mut best = bounds[k - 1][v];
                for edge in &self.adjacency[v] {
                    if let Some(rest) = bounds[k - 1][edge.to] {
                        let candidate = edge.rate.checked_mul(rest).unwrap_or(Decimal::MAX);
                        best = Some(best.map_or(candidate, |current: Decimal| current.max(candidate)));
                    }
                }
                bounds[k][v] = best;
            }
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::types::{TokenPair, Venue};

    #[test]
    fn each_quote_yields_two_directed_edges() {
        let now = Utc::now();
        let quotes = vec![
            PriceQuote::new(Venue::Raydium, TokenPair::new("SOL", "USDC"), dec!(100), dec!(100.5), now),
            PriceQuote::new(Venue::Orca, TokenPair::new("RAY", "SOL"), dec!(0.02), dec!(0.021), now),
        ];
        let graph = ExchangeGraph::build(&quotes);

        assert_eq!(graph.token_count(), 3);
        assert_eq!(graph.edge_count(), 4);

        let usdc = graph.token_index("USDC").unwrap();
        let sol = graph.token_index("SOL").unwrap();
        let buy = &graph.edges_from(usdc)[0];
        assert_eq!(buy.to, sol);
        assert_eq!(buy.side, TradeSide::Buy);
        assert_eq!(buy.rate, Decimal::ONE / dec!(100.5));
        assert_eq!(buy.effective_rate, buy.rate * dec!(0.9975));
    }

    #[test]
    fn malformed_quotes_are_absent() {
        let quotes = vec![PriceQuote::new(
            Venue::Raydium,
            TokenPair::new("SOL", "USDC"),
            dec!(0),
            dec!(100),
            Utc::now(),
        )];
        let graph = ExchangeGraph::build(&quotes);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.token_index("SOL").is_none());
    }

    #[test]
    fn return_bounds_cover_one_and_two_hops() {
        let now = Utc::now();
        let quotes = vec![PriceQuote::new(Venue::Raydium, TokenPair::new("SOL", "USDC"), dec!(100), dec!(101), now)];
        let graph = ExchangeGraph::build(&quotes);
        let usdc = graph.token_index("USDC").unwrap();
        let sol = graph.token_index("SOL").unwrap();

        let bounds = graph.best_return_bounds(usdc, 2);
        assert_eq!(bounds[0][sol], None);
        assert_eq!(bounds[1][sol], Some(dec!(100)));
        assert_eq!(bounds[1][usdc], Some(Decimal::ONE));
    }
}
