//! Pure risk evaluation: one opportunity, one decision

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use crate::config::{RiskConfig, VAR_Z_SCORE_95};
use crate::types::{ArbitrageOpportunity, CircuitBreakerState, RejectReason, RiskDecision, TokenPair};
use super::{DailyLedger, VolatilityTracker, var_limit};

/// Read-only view of the gate's state at decision time.
pub struct RiskView<'a> {
    pub ledger: &'a DailyLedger,
    pub breaker: &'a CircuitBreakerState,
    pub probe_in_flight: bool,
    pub kill_engaged: bool,
    pub in_flight_pairs: &'a HashSet<TokenPair>,
    /// Notional currently committed to unresolved trades.
    pub exposure: Decimal,
    /// VaR of the in-flight trades.
    pub current_var: Decimal,
    pub volatility: &'a VolatilityTracker,
}

/// Decides a single opportunity against the current state. Performs no I/O
/// and mutates nothing; the caller applies any reservation.
pub fn evaluate(
    opportunity: &ArbitrageOpportunity,
    view: &RiskView<'_>,
    config: &RiskConfig,
    now: DateTime<Utc>,
) -> RiskDecision {
    let reject = |reason| RiskDecision::rejected(opportunity, reason);

    if view.kill_engaged {
        return reject(RejectReason::KillSwitchEngaged);
    }
    match view.breaker {
        CircuitBreakerState::Open { .. } => return reject(RejectReason::CircuitBreakerOpen),
        CircuitBreakerState::HalfOpen { .. } if view.probe_in_flight => return reject(RejectReason::ProbeInFlight),
        _ => {}
    }
    if opportunity.is_expired(now) {
        return reject(RejectReason::Expired);
    }
    if opportunity.net_profit_pct <= config.min_profit_threshold {
        return reject(RejectReason::BelowMinimumProfit {
            net_profit_pct: opportunity.net_profit_pct,
            threshold_pct: config.min_profit_threshold,
        });
    }
    let loss = view.ledger.daily_loss();
    if loss >= config.max_daily_loss {
        return reject(RejectReason::DailyLossLimit {
            loss,
            limit: config.max_daily_loss,
        });
    }

    let pairs = opportunity.traded_pairs();
    if let Some(pair) = pairs.iter().find(|pair| view.in_flight_pairs.contains(*pair)) {
        return reject(RejectReason::PairInFlight { pair: pair.clone() });
    }
    if let Some((pair, until)) = pairs
        .iter()
        .find_map(|pair| view.ledger.cooldown_until(pair, now).map(|until| (pair, until)))
    {
        return reject(RejectReason::PairCooldown { pair: pair.clone(), until });
    }

    let volatility = view.volatility.worst_of(&pairs);
    let sizing = size_position(opportunity, volatility, view, config);

    if sizing.size < config.min_position_size {
        return reject(RejectReason::BelowMinimumSize {
            size: sizing.size,
            minimum: config.min_position_size,
        });
    }

    let sized = opportunity.sized(sizing.size);
    if sizing.size < sizing.requested {
        RiskDecision::Reduced {
            opportunity: sized,
            requested: sizing.requested,
            size: sizing.size,
            reason: format!(
                "reduced from {:.2} to {:.2} by {}",
                sizing.requested, sizing.size, sizing.limited_by
            ),
        }
    } else {
        RiskDecision::Approved {
            opportunity: sized,
            size: sizing.size,
            reason: format!(
                "net profit {:.4}% clears {}% threshold, sized {:.2}",
                opportunity.net_profit_pct, config.min_profit_threshold, sizing.size
            ),
        }
    }
}

struct Sizing {
    requested: Decimal,
    size: Decimal,
    limited_by: &'static str,
}

/// Size grows with net profit up to the position limit, shrinks with
/// volatility above the reference level, then is clipped to the remaining
/// exposure and VaR headroom.
fn size_position(
    opportunity: &ArbitrageOpportunity,
    volatility_pct: Option<Decimal>,
    view: &RiskView<'_>,
    config: &RiskConfig,
) -> Sizing {
    let max_position = config.max_position_size;
    let profit_scaled = max_position * (opportunity.net_profit_pct / config.full_size_profit_pct).min(Decimal::ONE);
    let requested = opportunity
        .recommended_size
        .unwrap_or(profit_scaled)
        .min(max_position)
        .max(Decimal::ZERO);

    let mut size = requested;
    let mut limited_by = "position limit";

    if let Some(vol) = volatility_pct.filter(|v| *v > config.volatility_reference_pct) {
        size = size * config.volatility_reference_pct / vol;
        limited_by = "recent volatility";
    }

    let exposure_headroom = (config.max_total_exposure - view.exposure).max(Decimal::ZERO);
    if exposure_headroom < size {
        size = exposure_headroom;
        limited_by = "total exposure limit";
    }

    let unit_var = volatility_pct.unwrap_or(config.volatility_reference_pct) / Decimal::ONE_HUNDRED * VAR_Z_SCORE_95;
    if unit_var > Decimal::ZERO {
        let var_headroom =
            ((var_limit(config.capital, config.var_limit_percent) - view.current_var) / unit_var).max(Decimal::ZERO);
        if var_headroom < size {
            size = var_headroom;
            limited_by = "value-at-risk limit";
        }
    }

    Sizing {
        requested,
        size: size.round_dp(2),
        limited_by,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use crate::types::{OpportunitySource, TripReason, Venue};

    struct Fixture {
        ledger: DailyLedger,
        breaker: CircuitBreakerState,
        in_flight: HashSet<TokenPair>,
        volatility: VolatilityTracker,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                ledger: DailyLedger::new(Utc::now()),
                breaker: CircuitBreakerState::Closed,
                in_flight: HashSet::new(),
                volatility: VolatilityTracker::new(Duration::minutes(10)),
            }
        }

        fn view(&self) -> RiskView<'_> {
            RiskView {
                ledger: &self.ledger,
                breaker: &self.breaker,
                probe_in_flight: false,
                kill_engaged: false,
                in_flight_pairs: &self.in_flight,
                exposure: Decimal::ZERO,
                current_var: Decimal::ZERO,
                volatility: &self.volatility,
            }
        }
    }

    fn opportunity(net_target_sell: Decimal) -> ArbitrageOpportunity {
        ArbitrageOpportunity::two_venue(
            OpportunitySource::Spread,
            TokenPair::new("SOL", "USDC"),
            Venue::Raydium,
            dec!(100),
            Venue::Orca,
            net_target_sell,
            Decimal::ZERO,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn open_breaker_rejects_everything() {
        let mut fixture = Fixture::new();
        fixture.breaker = CircuitBreakerState::Open {
            reason: TripReason::ConsecutiveFailures { count: 3 },
            opened_at: Utc::now(),
        };
        let decision = evaluate(&opportunity(dec!(105)), &fixture.view(), &RiskConfig::default(), Utc::now());
        assert_eq!(decision.reason(), "circuit breaker open");
    }

    #[test]
    fn profitable_opportunity_is_sized_by_profit() {
        let fixture = Fixture::new();
        // 1.5% gross, 1.0% net: half of the 2% full-size profit.
        let decision = evaluate(&opportunity(dec!(101.5)), &fixture.view(), &RiskConfig::default(), Utc::now());
        assert!(matches!(decision, RiskDecision::Approved { .. }));
        assert_eq!(decision.size(), Some(dec!(500)));
    }

    #[test]
    fn exposure_headroom_reduces_size() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        view.exposure = dec!(2800);
        let decision = evaluate(&opportunity(dec!(103)), &view, &RiskConfig::default(), Utc::now());
        match decision {
            RiskDecision::Reduced { requested, size, .. } => {
                assert_eq!(requested, dec!(1000));
                assert_eq!(size, dec!(200));
            }
            other => panic!("expected reduced, got {:?}", other),
        }
    }

    #[test]
    fn tiny_headroom_rejects_instead_of_reducing_to_zero() {
        let fixture = Fixture::new();
        let mut view = fixture.view();
        view.exposure = dec!(2995);
        let decision = evaluate(&opportunity(dec!(103)), &view, &RiskConfig::default(), Utc::now());
        assert!(matches!(
            decision.reject_reason(),
            Some(RejectReason::BelowMinimumSize { .. })
        ));
    }

    #[test]
    fn below_threshold_and_expired_are_rejected() {
        let fixture = Fixture::new();
        let thin = opportunity(dec!(100.8));
        let decision = evaluate(&thin, &fixture.view(), &RiskConfig::default(), Utc::now());
        assert!(matches!(decision.reject_reason(), Some(RejectReason::BelowMinimumProfit { .. })));

        let stale = opportunity(dec!(103)).with_expiry(Duration::milliseconds(1));
        let later = Utc::now() + Duration::seconds(1);
        let decision = evaluate(&stale, &fixture.view(), &RiskConfig::default(), later);
        assert_eq!(decision.reject_reason(), Some(&RejectReason::Expired));
    }

    #[test]
    fn pair_in_flight_is_skipped() {
        let mut fixture = Fixture::new();
        fixture.in_flight.insert(TokenPair::new("SOL", "USDC"));
        let decision = evaluate(&opportunity(dec!(103)), &fixture.view(), &RiskConfig::default(), Utc::now());
        assert!(matches!(decision.reject_reason(), Some(RejectReason::PairInFlight { .. })));
    }
}
