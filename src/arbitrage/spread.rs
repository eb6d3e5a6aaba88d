//! Two-venue spread detection

use chrono::{DateTime, Utc};
use crate::types::{ArbitrageOpportunity, OpportunitySource};
use crate::venues::QuoteSnapshot;
use super::DetectionConfig;

/// Buys at one venue's ask and sells at another's bid for every pair quoted
/// on at least two venues. Emits when net profit reaches the threshold.
pub fn detect_spreads(
    snapshot: &QuoteSnapshot,
    config: &DetectionConfig,
    now: DateTime<Utc>,
) -> Vec<ArbitrageOpportunity> {
    let mut opportunities = Vec::new();

    for (pair, quotes) in snapshot.by_pair() {
        if quotes.len() < 2 {
            continue;
        }

        for buy in &quotes {
            for sell in &quotes {
                if buy.venue == sell.venue {
                    continue;
                }

                let Some(opportunity) = ArbitrageOpportunity::two_venue(
                    OpportunitySource::Spread,
                    pair.clone(),
                    buy.venue,
                    buy.ask,
                    sell.venue,
                    sell.bid,
                    config.network_fee_pct,
                    now,
                ) else {
                    continue;
                };

                if opportunity.net_profit_pct >= config.min_profit_pct {
                    opportunities.push(opportunity.with_expiry(config.opportunity_ttl));
                }
            }
        }
    }

    opportunities
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use crate::types::{PriceQuote, TokenPair, Venue};

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

    #[test]
    fn buys_cheap_venue_and_sells_rich_one() {
        let now = Utc::now();
        let pair = TokenPair::new("SOL", "USDC");
        let snapshot = QuoteSnapshot::new(
            now,
            vec![
                PriceQuote::new(Venue::Raydium, pair.clone(), dec!(100.0), dec!(100.1), now),
                PriceQuote::new(Venue::Orca, pair, dec!(101.0), dec!(101.1), now),
            ],
        );

        let found = detect_spreads(&snapshot, &config(dec!(0.3)), now);
        assert_eq!(found.len(), 1);

        let opp = &found[0];
        assert_eq!(opp.buy_venue, Venue::Raydium);
        assert_eq!(opp.sell_venue, Venue::Orca);
        assert_eq!(opp.buy_price, dec!(100.1));
        assert_eq!(opp.sell_price, dec!(101.0));
        assert!((opp.gross_profit_pct - dec!(0.899)).abs() < dec!(0.001));
        assert!((opp.net_profit_pct - dec!(0.399)).abs() < dec!(0.001));
        assert_eq!(opp.expires_at, Some(now + Duration::seconds(2)));
    }

    #[test]
    fn single_venue_pairs_are_ignored() {
        let now = Utc::now();
        let snapshot = QuoteSnapshot::new(
            now,
            vec![PriceQuote::new(Venue::Raydium, TokenPair::new("SOL", "USDC"), dec!(100), dec!(100.1), now)],
        );
        assert!(detect_spreads(&snapshot, &config(Decimal::ZERO), now).is_empty());
    }

    #[test]
    fn fees_can_erase_a_spread() {
        let now = Utc::now();
        let pair = TokenPair::new("SOL", "USDC");
        let snapshot = QuoteSnapshot::new(
            now,
            vec![
                PriceQuote::new(Venue::Raydium, pair.clone(), dec!(100.0), dec!(100.1), now),
                PriceQuote::new(Venue::Orca, pair, dec!(100.4), dec!(100.5), now),
            ],
        );
        // 0.3% gross, 0.5% in fees.
        assert!(detect_spreads(&snapshot, &config(Decimal::ZERO), now).is_empty());
    }
}
