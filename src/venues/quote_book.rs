//! Latest-quote cache and per-tick snapshots

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::debug;
use crate::types::{PriceQuote, TokenPair, Venue};

/// Latest quote per (venue, pair). Duplicate and out-of-order updates are
/// ignored so a replayed or lagging feed never moves a price backwards.
#[derive(Debug, Default)]
pub struct QuoteBook {
    quotes: HashMap<(Venue, TokenPair), PriceQuote>,
}

/// Immutable view of the fresh quotes at one instant, shared read-only by
/// every detector in a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteSnapshot {
    pub taken_at: DateTime<Utc>,
    pub quotes: Vec<PriceQuote>,
}

impl QuoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the quote replaced an older one or filled a gap.
    pub fn upsert(&mut self, quote: PriceQuote) -> bool {
        let key = (quote.venue, quote.pair.clone());
        match self.quotes.get(&key) {
            Some(existing) if existing.observed_at >= quote.observed_at => {
                debug!(venue = %quote.venue, pair = %quote.pair, "Ignoring duplicate or older quote");
                false
            }
            _ => {
                self.quotes.insert(key, quote);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn get(&self, venue: Venue, pair: &TokenPair) -> Option<&PriceQuote> {
        self.quotes.get(&(venue, pair.clone()))
    }

    /// Well-formed quotes no older than `max_age`, in a stable order.
    pub fn fresh_snapshot(&self, now: DateTime<Utc>, max_age: Duration) -> QuoteSnapshot {
        let mut quotes: Vec<PriceQuote> = self
            .quotes
            .values()
            .filter(|quote| quote.is_well_formed() && !quote.is_stale(now, max_age))
            .cloned()
            .collect();
        quotes.sort_by(|a, b| a.pair.cmp(&b.pair).then(a.venue.cmp(&b.venue)));

        QuoteSnapshot { taken_at: now, quotes }
    }
}

impl QuoteSnapshot {
    pub fn new(taken_at: DateTime<Utc>, mut quotes: Vec<PriceQuote>) -> Self {
        quotes.sort_by(|a, b| a.pair.cmp(&b.pair).then(a.venue.cmp(&b.venue)));
        Self { taken_at, quotes }
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Quotes grouped by pair, preserving snapshot order inside each group.
    pub fn by_pair(&self) -> Vec<(&TokenPair, Vec<&PriceQuote>)> {
        let mut groups: Vec<(&TokenPair, Vec<&PriceQuote>)> = Vec::new();
        for quote in &self.quotes {
            match groups.last_mut() {
                Some((pair, group)) if *pair == &quote.pair => group.push(quote),
                _ => groups.push((&quote.pair, vec![quote])),
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(venue: Venue, bid: rust_decimal::Decimal, at: DateTime<Utc>) -> PriceQuote {
        PriceQuote::new(venue, TokenPair::new("SOL", "USDC"), bid, bid + dec!(0.1), at)
    }

    #[test]
    fn keeps_only_newest_quote() {
        let now = Utc::now();
        let mut book = QuoteBook::new();

        assert!(book.upsert(quote(Venue::Orca, dec!(100), now)));
        assert!(!book.upsert(quote(Venue::Orca, dec!(99), now)));
        assert!(!book.upsert(quote(Venue::Orca, dec!(98), now - Duration::seconds(1))));
        assert!(book.upsert(quote(Venue::Orca, dec!(101), now + Duration::milliseconds(5))));

        let pair = TokenPair::new("SOL", "USDC");
        assert_eq!(book.get(Venue::Orca, &pair).unwrap().bid, dec!(101));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn snapshot_drops_stale_and_crossed_quotes() {
        let now = Utc::now();
        let mut book = QuoteBook::new();
        book.upsert(quote(Venue::Orca, dec!(100), now));
        book.upsert(quote(Venue::Raydium, dec!(100), now - Duration::seconds(30)));
        book.upsert(PriceQuote::new(Venue::Jupiter, TokenPair::new("SOL", "USDC"), dec!(101), dec!(100), now));

        let snapshot = book.fresh_snapshot(now, Duration::seconds(5));
        assert_eq!(snapshot.quotes.len(), 1);
        assert_eq!(snapshot.quotes[0].venue, Venue::Orca);
    }

    #[test]
    fn groups_quotes_by_pair() {
        let now = Utc::now();
        let snapshot = QuoteSnapshot::new(
            now,
            vec![
                quote(Venue::Orca, dec!(100), now),
                PriceQuote::new(Venue::Orca, TokenPair::new("RAY", "USDC"), dec!(2), dec!(2.01), now),
                quote(Venue::Raydium, dec!(100), now),
            ],
        );
        let groups = snapshot.by_pair();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].1.len(), 2);
    }
}
