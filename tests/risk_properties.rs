//! Risk gate invariants over arbitrary opportunity streams.

mod common;

use chrono::Utc;
use common::risk_config;
use cycle_arb_bot::errors::ErrorKind;
use cycle_arb_bot::events::EventBus;
use cycle_arb_bot::risk::{Redemption, RiskGate};
use cycle_arb_bot::types::{
    ArbitrageOpportunity, OpportunitySource, RejectReason, TokenPair, TradeOutcome, TradeResult, Venue,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;

const BASES: [&str; 4] = ["SOL", "RAY", "ORCA", "JUP"];

fn opportunity(base: &str, sell_cents: u32) -> ArbitrageOpportunity {
    ArbitrageOpportunity::two_venue(
        OpportunitySource::Spread,
        TokenPair::new(base, "USDC"),
        Venue::Raydium,
        dec!(100),
        Venue::Orca,
        Decimal::new(sell_cents as i64, 2),
        dec!(0.01),
        Utc::now(),
    )
    .unwrap()
}

fn failure(opportunity: &ArbitrageOpportunity, size: Decimal) -> TradeResult {
    TradeResult {
        opportunity_id: opportunity.id,
        pair: opportunity.pair.clone(),
        path: None,
        outcome: TradeOutcome::Failed {
            kind: ErrorKind::SimulationFailed,
            reason: "simulation failed".to_string(),
        },
        size,
        realized_pnl: Decimal::ZERO,
        signature: None,
        latency_ms: 1,
        attempts: 1,
        completed_at: Utc::now(),
    }
}

fn stream() -> impl Strategy<Value = Vec<(usize, u32)>> {
    prop::collection::vec((0..BASES.len(), 9_950u32..10_500), 1..30)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn no_pair_is_approved_twice_while_in_flight(stream in stream()) {
        tokio_test::block_on(async {
            let now = Utc::now();
            let config = risk_config();
            let gate = RiskGate::new(config.clone(), EventBus::default(), now);

            let mut held = HashSet::new();
            let mut committed = Decimal::ZERO;
            for (base, sell) in stream {
                let decided = gate.decide(&opportunity(BASES[base], sell), now).await;
                if let Some(size) = decided.decision.size() {
                    prop_assert!(held.insert(BASES[base]), "{} approved twice", BASES[base]);
                    prop_assert!(size >= config.min_position_size);
                    prop_assert!(size <= config.max_position_size);
                    committed += size;
                }
            }
            prop_assert!(committed <= config.max_total_exposure);
            prop_assert_eq!(gate.snapshot(now).await.in_flight, held.len());
            Ok(())
        })?;
    }

    #[test]
    fn open_breaker_approves_nothing(stream in stream()) {
        tokio_test::block_on(async {
            let now = Utc::now();
            let gate = RiskGate::new(risk_config(), EventBus::default(), now);

            for base in ["BONK", "WIF", "PYTH"] {
                let opp = opportunity(base, 10_300);
                let decided = gate.decide(&opp, now).await;
                let permit = decided.permit.expect("fresh gate approves");
                let trade = match gate.redeem(permit).await {
                    Redemption::Proceed(trade) => trade,
                    Redemption::Revoked(decision) => panic!("revoked: {:?}", decision),
                };
                gate.record_outcome(&trade, &failure(&opp, trade.size()), now).await;
            }
            prop_assert!(gate.breaker_state().await.is_open());

            for (base, sell) in stream {
                let decided = gate.decide(&opportunity(BASES[base], sell), now).await;
                prop_assert!(decided.permit.is_none());
                prop_assert_eq!(decided.decision.reject_reason(), Some(&RejectReason::CircuitBreakerOpen));
            }
            Ok(())
        })?;
    }
}
