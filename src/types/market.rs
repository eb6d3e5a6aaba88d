//! Market primitives: token pairs, venues and price quotes

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered (base, quote) pair of token symbols.
///
/// Symbols are trimmed and upper-cased on construction so that `sol/usdc`,
/// ` SOL / USDC ` and `SOL/USDC` compare and hash identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenPair {
    base: String,
    quote: String,
}

impl TokenPair {
    pub fn new(base: impl AsRef<str>, quote: impl AsRef<str>) -> Self {
        Self {
            base: normalize_symbol(base.as_ref()),
            quote: normalize_symbol(quote.as_ref()),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    pub fn contains(&self, token: &str) -> bool {
        self.base == token || self.quote == token
    }
}

fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}

impl fmt::Display for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for TokenPair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .or_else(|| s.split_once('-'))
            .ok_or_else(|| format!("token pair '{}' must look like BASE/QUOTE", s))?;

        let pair = TokenPair::new(base, quote);
        if pair.base.is_empty() || pair.quote.is_empty() {
            return Err(format!("token pair '{}' has an empty side", s));
        }
        if pair.base == pair.quote {
            return Err(format!("token pair '{}' trades a token against itself", s));
        }
        Ok(pair)
    }
}

impl TryFrom<String> for TokenPair {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TokenPair> for String {
    fn from(pair: TokenPair) -> Self {
        pair.to_string()
    }
}

/// The closed set of venues the bot trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Venue {
    Raydium,
    Orca,
    Jupiter,
    Meteora,
    Phoenix,
    Lifinity,
}

impl Venue {
    pub const ALL: [Venue; 6] = [
        Venue::Raydium,
        Venue::Orca,
        Venue::Jupiter,
        Venue::Meteora,
        Venue::Phoenix,
        Venue::Lifinity,
    ];

    /// Taker fee charged by the venue, in percent.
    pub fn fee_percentage(&self) -> Decimal {
        match self {
            Venue::Raydium => dec!(0.25),
            Venue::Orca => dec!(0.25),
            Venue::Jupiter => dec!(0.10),
            Venue::Meteora => dec!(0.20),
            Venue::Phoenix => dec!(0.10),
            Venue::Lifinity => dec!(0.20),
        }
    }

    /// Path segment used by the quoting/instruction API.
    pub fn api_segment(&self) -> &'static str {
        match self {
            Venue::Raydium => "raydium",
            Venue::Orca => "orca",
            Venue::Jupiter => "jupiter",
            Venue::Meteora => "meteora",
            Venue::Phoenix => "phoenix",
            Venue::Lifinity => "lifinity",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Venue::Raydium => "Raydium",
            Venue::Orca => "Orca",
            Venue::Jupiter => "Jupiter",
            Venue::Meteora => "Meteora",
            Venue::Phoenix => "Phoenix",
            Venue::Lifinity => "Lifinity",
        };
        f.write_str(name)
    }
}

impl FromStr for Venue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Venue::ALL
            .into_iter()
            .find(|venue| venue.api_segment() == wanted)
            .ok_or_else(|| format!("unknown venue '{}'", s))
    }
}

/// One bid/ask observation for a pair on a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub venue: Venue,
    pub pair: TokenPair,
    pub bid: Decimal,
    pub ask: Decimal,
    pub mid: Decimal,
    pub liquidity: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub observed_at: DateTime<Utc>,
}

impl PriceQuote {
    pub fn new(
        venue: Venue,
        pair: TokenPair,
        bid: Decimal,
        ask: Decimal,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            venue,
            pair,
            bid,
            ask,
            mid: (bid + ask) / dec!(2),
            liquidity: None,
            volume_24h: None,
            observed_at,
        }
    }

    pub fn with_liquidity(mut self, liquidity: Decimal) -> Self {
        self.liquidity = Some(liquidity);
        self
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.observed_at
    }

    /// Quotes from the future are treated as stale too; a skewed clock
    /// should never make a quote look fresher than it is.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        let age = self.age(now);
        age > max_age || age < -max_age
    }

    pub fn is_well_formed(&self) -> bool {
        self.bid > Decimal::ZERO && self.ask > Decimal::ZERO && self.bid <= self.ask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_ignore_formatting() {
        let a = TokenPair::new(" sol ", "usdc");
        let b: TokenPair = "SOL/USDC".parse().unwrap();
        let c: TokenPair = "Sol-Usdc".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.to_string(), "SOL/USDC");
    }

    #[test]
    fn rejects_degenerate_pairs() {
        assert!("SOL".parse::<TokenPair>().is_err());
        assert!("SOL/".parse::<TokenPair>().is_err());
        assert!("usdc/USDC".parse::<TokenPair>().is_err());
    }

    #[test]
    fn venue_parses_from_api_segment() {
        assert_eq!("Orca".parse::<Venue>().unwrap(), Venue::Orca);
        assert_eq!(Venue::Jupiter.fee_percentage(), dec!(0.10));
        assert!("uniswap".parse::<Venue>().is_err());
    }

    #[test]
    fn staleness_uses_observation_age() {
        let now = Utc::now();
        let pair = TokenPair::new("SOL", "USDC");
        let quote = PriceQuote::new(Venue::Raydium, pair, dec!(100), dec!(101), now - Duration::seconds(6));
        assert_eq!(quote.mid, dec!(100.5));
        assert!(quote.is_stale(now, Duration::seconds(5)));
        assert!(!quote.is_stale(now, Duration::seconds(10)));
    }

    #[test]
    fn crossed_book_is_not_well_formed() {
        let pair = TokenPair::new("SOL", "USDC");
        let quote = PriceQuote::new(Venue::Orca, pair, dec!(101), dec!(100), Utc::now());
        assert!(!quote.is_well_formed());
    }
}
