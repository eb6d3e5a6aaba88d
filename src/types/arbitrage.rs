//! Arbitrage opportunity types

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use uuid::Uuid;
use super::{TokenPair, Venue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    /// Spend the quote token, receive the base token (fills at the ask).
    Buy,
    /// Spend the base token, receive the quote token (fills at the bid).
    Sell,
}

/// A single token-to-token conversion inside an opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopLeg {
    pub venue: Venue,
    pub pair: TokenPair,
    pub side: TradeSide,
    pub from_token: String,
    pub to_token: String,
    /// Quoted price for the side taken (ask for buys, bid for sells).
    pub price: Decimal,
    /// Units of `to_token` received per unit of `from_token`, before fees.
    pub rate: Decimal,
    pub fee_pct: Decimal,
}

impl HopLeg {
    pub fn buy(venue: Venue, pair: TokenPair, ask: Decimal) -> Self {
        Self {
            venue,
            from_token: pair.quote().to_string(),
            to_token: pair.base().to_string(),
            side: TradeSide::Buy,
            price: ask,
            rate: Decimal::ONE / ask,
            fee_pct: venue.fee_percentage(),
            pair,
        }
    }

    pub fn sell(venue: Venue, pair: TokenPair, bid: Decimal) -> Self {
        Self {
            venue,
            from_token: pair.base().to_string(),
            to_token: pair.quote().to_string(),
            side: TradeSide::Sell,
            price: bid,
            rate: bid,
            fee_pct: venue.fee_percentage(),
            pair,
        }
    }

    /// Rate after the venue fee is deducted.
    pub fn effective_rate(&self) -> Decimal {
        self.rate * (Decimal::ONE - self.fee_pct / dec!(100))
    }
}

/// Product of rates, or `None` if it leaves `Decimal`'s range.
fn checked_product(rates: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    rates.fold(Some(Decimal::ONE), |acc, rate| acc?.checked_mul(rate))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpportunitySource {
    Cycle,
    Spread,
    Statistical,
    LatencySpread,
}

impl fmt::Display for OpportunitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpportunitySource::Cycle => "cycle",
            OpportunitySource::Spread => "spread",
            OpportunitySource::Statistical => "statistical",
            OpportunitySource::LatencySpread => "latency-spread",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleStage {
    Detected = 0,
    Decided = 1,
    Executing = 2,
    Resolved = 3,
}

impl LifecycleStage {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LifecycleStage::Detected,
            1 => LifecycleStage::Decided,
            2 => LifecycleStage::Executing,
            _ => LifecycleStage::Resolved,
        }
    }
}

/// Shared lifecycle marker. Clones of an opportunity share one marker, so a
/// stage can be claimed exactly once no matter how many copies exist.
#[derive(Debug, Clone, Default)]
pub struct LifecycleMarker(Arc<AtomicU8>);

impl LifecycleMarker {
    pub fn stage(&self) -> LifecycleStage {
        LifecycleStage::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `from -> to`; returns false if another holder got there first.
    pub fn advance(&self, from: LifecycleStage, to: LifecycleStage) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn resolve(&self) {
        self.0.store(LifecycleStage::Resolved as u8, Ordering::Release);
    }
}

impl PartialEq for LifecycleMarker {
    fn eq(&self, other: &Self) -> bool {
        self.stage() == other.stage()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub id: Uuid,
    pub source: OpportunitySource,
    /// Pair of the first hop; the full route lives in `hops`.
    pub pair: TokenPair,
    pub hops: Vec<HopLeg>,
    pub buy_venue: Venue,
    pub sell_venue: Venue,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub gross_profit_pct: Decimal,
    pub net_profit_pct: Decimal,
    pub network_fee_pct: Decimal,
    pub estimated_profit_usd: Option<Decimal>,
    pub recommended_size: Option<Decimal>,
    pub detected_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    lifecycle: LifecycleMarker,
}

impl ArbitrageOpportunity {
    /// Builds an opportunity from an ordered route. Gross and net profit are
    /// derived from the hop rates so every detector reports them the same way.
    pub fn from_route(
        source: OpportunitySource,
        hops: Vec<HopLeg>,
        network_fee_pct: Decimal,
        detected_at: DateTime<Utc>,
    ) -> Option<Self> {
        let first = hops.first()?.clone();
        let last = hops.last()?.clone();

        let raw_product = checked_product(hops.iter().map(|hop| hop.rate))?;
        let effective_product = checked_product(hops.iter().map(HopLeg::effective_rate))?;
        let gross_profit_pct = (raw_product - Decimal::ONE).checked_mul(dec!(100))?;
        let net_profit_pct = (effective_product - Decimal::ONE)
            .checked_mul(dec!(100))?
            .checked_sub(network_fee_pct)?;

        Some(Self {
            id: Uuid::new_v4(),
            source,
            pair: first.pair.clone(),
            buy_venue: first.venue,
            sell_venue: last.venue,
            buy_price: first.price,
            sell_price: last.price,
            gross_profit_pct,
            net_profit_pct,
            network_fee_pct,
            estimated_profit_usd: None,
            recommended_size: None,
            detected_at,
            expires_at: None,
            hops,
            lifecycle: LifecycleMarker::default(),
        })
    }

    /// Two-leg trade quoted as prices rather than rates: buy at `buy_price`
    /// on one venue, sell at `sell_price` on another. Profit is additive in
    /// percent, the way spreads are usually quoted.
    pub fn two_venue(
        source: OpportunitySource,
        pair: TokenPair,
        buy_venue: Venue,
        buy_price: Decimal,
        sell_venue: Venue,
        sell_price: Decimal,
        network_fee_pct: Decimal,
        detected_at: DateTime<Utc>,
    ) -> Option<Self> {
        if buy_price <= Decimal::ZERO || sell_price <= Decimal::ZERO {
            return None;
        }

        let gross = (sell_price - buy_price).checked_div(buy_price)?.checked_mul(dec!(100))?;
        let net = gross - buy_venue.fee_percentage() - sell_venue.fee_percentage() - network_fee_pct;

        Some(Self {
            id: Uuid::new_v4(),
            source,
            hops: vec![
                HopLeg::buy(buy_venue, pair.clone(), buy_price),
                HopLeg::sell(sell_venue, pair.clone(), sell_price),
            ],
            pair,
            buy_venue,
            sell_venue,
            buy_price,
            sell_price,
            gross_profit_pct: gross,
            net_profit_pct: net,
            network_fee_pct,
            estimated_profit_usd: None,
            recommended_size: None,
            detected_at,
            expires_at: None,
            lifecycle: LifecycleMarker::default(),
        })
    }

    pub fn with_expiry(mut self, ttl: Duration) -> Self {
        self.expires_at = Some(self.detected_at + ttl);
        self
    }

    pub fn with_recommended_size(mut self, size: Decimal) -> Self {
        self.recommended_size = Some(size);
        self
    }

    /// Copy carrying a sized position; shares the lifecycle marker.
    pub fn sized(&self, size: Decimal) -> Self {
        let mut sized = self.clone();
        sized.recommended_size = Some(size);
        sized.estimated_profit_usd = Some(size * self.net_profit_pct / dec!(100));
        sized
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    pub fn token_set(&self) -> BTreeSet<String> {
        self.hops
            .iter()
            .flat_map(|hop| [hop.from_token.clone(), hop.to_token.clone()])
            .collect()
    }

    /// Every pair touched by the route, deduplicated.
    pub fn traded_pairs(&self) -> BTreeSet<TokenPair> {
        self.hops.iter().map(|hop| hop.pair.clone()).collect()
    }

    /// Venue/pair legs in a canonical order, used to spot the same route
    /// reported by more than one detector.
    pub fn route_key(&self) -> String {
        let mut legs: Vec<String> = self
            .hops
            .iter()
            .map(|hop| format!("{}:{}:{:?}", hop.venue, hop.pair, hop.side))
            .collect();
        legs.sort();
        legs.join("|")
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|expiry| now >= expiry).unwrap_or(false)
    }

    pub fn lifecycle(&self) -> &LifecycleMarker {
        &self.lifecycle
    }

    pub fn route_description(&self) -> String {
        let mut parts = Vec::with_capacity(self.hops.len() + 1);
        if let Some(first) = self.hops.first() {
            parts.push(first.from_token.clone());
        }
        for hop in &self.hops {
            parts.push(format!("[{}] {}", hop.venue, hop.to_token));
        }
        parts.join(" → ")
    }
}
