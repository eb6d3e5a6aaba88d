//! The risk gate: the only component that can authorize an execution

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::config::{RiskConfig, VAR_Z_SCORE_95};
use crate::errors::{BreakerTransition, CircuitBreaker};
use crate::events::{BotEvent, EventBus};
use crate::types::{
    ArbitrageOpportunity, CircuitBreakerState, LifecycleStage, RejectReason, RiskDecision, TokenPair, TradeResult,
    TripReason,
};
use crate::venues::QuoteSnapshot;
use super::{DailyLedger, LedgerSummary, RiskView, VolatilityTracker, evaluate, portfolio_var, var_limit};

/// Proof that the gate approved an opportunity. Only the gate can mint one,
/// and it must be redeemed through [`RiskGate::redeem`] before execution.
#[derive(Debug)]
pub struct ExecutionPermit {
    opportunity: ArbitrageOpportunity,
    size: Decimal,
    probe: bool,
}

impl ExecutionPermit {
    pub fn opportunity(&self) -> &ArbitrageOpportunity {
        &self.opportunity
    }

    pub fn size(&self) -> Decimal {
        self.size
    }
}

/// A redeemed permit: the opportunity is now executing and its reservation
/// stays held until [`RiskGate::record_outcome`].
#[derive(Debug)]
pub struct ApprovedTrade {
    opportunity: ArbitrageOpportunity,
    size: Decimal,
    probe: bool,
}

impl ApprovedTrade {
    pub fn opportunity(&self) -> &ArbitrageOpportunity {
        &self.opportunity
    }

    pub fn size(&self) -> Decimal {
        self.size
    }

    pub fn is_probe(&self) -> bool {
        self.probe
    }
}

#[derive(Debug)]
pub struct GateDecision {
    pub decision: RiskDecision,
    pub permit: Option<ExecutionPermit>,
}

#[derive(Debug)]
pub enum Redemption {
    Proceed(ApprovedTrade),
    /// The permit no longer authorizes anything; carries the final decision.
    Revoked(RiskDecision),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSnapshot {
    pub breaker: CircuitBreakerState,
    pub kill_engaged: bool,
    pub exposure: Decimal,
    pub value_at_risk: Decimal,
    pub in_flight: usize,
    pub ledger: LedgerSummary,
}

struct Reservation {
    pairs: Vec<TokenPair>,
    size: Decimal,
}

struct GateState {
    config: RiskConfig,
    breaker: CircuitBreaker,
    ledger: DailyLedger,
    volatility: VolatilityTracker,
    in_flight_pairs: HashSet<TokenPair>,
    reservations: HashMap<Uuid, Reservation>,
    exposure: Decimal,
    kill_engaged: bool,
}

impl GateState {
    /// Sum of per-trade VaR over everything currently reserved.
    fn current_var(&self) -> Decimal {
        let reference = self.config.volatility_reference_pct;
        portfolio_var(
            self.reservations.values().map(|reservation| {
                let vol = self.volatility.worst_of(&reservation.pairs).unwrap_or(reference);
                (reservation.size, vol)
            }),
            VAR_Z_SCORE_95,
        )
    }

    fn release(&mut self, id: Uuid) {
        if let Some(reservation) = self.reservations.remove(&id) {
            for pair in &reservation.pairs {
                self.in_flight_pairs.remove(pair);
            }
            self.exposure = (self.exposure - reservation.size).max(Decimal::ZERO);
        }
    }
}

/// Serializes every risk decision and outcome behind one lock so sizing
/// always sees the capital already committed in the same tick.
pub struct RiskGate {
    state: Mutex<GateState>,
    events: EventBus,
}

impl RiskGate {
    pub fn new(config: RiskConfig, events: EventBus, now: DateTime<Utc>) -> Self {
        let breaker = CircuitBreaker::new(config.circuit_breaker_cooldown_secs);
        Self {
            state: Mutex::new(GateState {
                config,
                breaker,
                ledger: DailyLedger::new(now),
                volatility: VolatilityTracker::new(Duration::minutes(15)),
                in_flight_pairs: HashSet::new(),
                reservations: HashMap::new(),
                exposure: Decimal::ZERO,
                kill_engaged: false,
            }),
            events,
        }
    }

    /// Evaluates one opportunity. Each opportunity can be decided once; a
    /// second attempt is rejected without touching any state.
    pub async fn decide(&self, opportunity: &ArbitrageOpportunity, now: DateTime<Utc>) -> GateDecision {
        let mut state = self.state.lock().await;
        state.ledger.roll_if_new_day(now);
        if let Some(transition) = state.breaker.poll(now) {
            self.emit_transition(transition);
        }

        if !opportunity.lifecycle().advance(LifecycleStage::Detected, LifecycleStage::Decided) {
            let decision = RiskDecision::rejected(opportunity, RejectReason::AlreadyDecided);
            debug!(id = %opportunity.id, "Opportunity already decided");
            return GateDecision { decision, permit: None };
        }

        let current_var = state.current_var();
        let decision = {
            let view = RiskView {
                ledger: &state.ledger,
                breaker: state.breaker.state(),
                probe_in_flight: state.breaker.probe_in_flight(),
                kill_engaged: state.kill_engaged,
                in_flight_pairs: &state.in_flight_pairs,
                exposure: state.exposure,
                current_var,
                volatility: &state.volatility,
            };
            evaluate(opportunity, &view, &state.config, now)
        };

        let permit = match &decision {
            RiskDecision::Approved { opportunity: sized, size, .. }
            | RiskDecision::Reduced { opportunity: sized, size, .. } => {
                let pairs: Vec<TokenPair> = sized.traded_pairs().into_iter().collect();
                for pair in &pairs {
                    state.in_flight_pairs.insert(pair.clone());
                }
                state.exposure += *size;
                state.reservations.insert(sized.id, Reservation { pairs, size: *size });

                let probe = matches!(state.breaker.state(), CircuitBreakerState::HalfOpen { .. });
                if probe {
                    state.breaker.begin_probe();
                    info!(id = %sized.id, "🧪 Half-open probe trade approved");
                }

                info!(
                    id = %sized.id,
                    pair = %sized.pair,
                    decision = decision.label(),
                    size = %size,
                    reason = %decision.reason(),
                    "✅ Risk gate permitted trade"
                );
                Some(ExecutionPermit {
                    opportunity: sized.clone(),
                    size: *size,
                    probe,
                })
            }
            RiskDecision::Rejected { reason, .. } => {
                opportunity.lifecycle().resolve();
                debug!(id = %opportunity.id, reason = %reason, "Risk gate rejected opportunity");
                None
            }
        };
        drop(state);

        self.events.publish(BotEvent::RiskDecisionMade {
            opportunity_id: opportunity.id,
            decision: decision.clone(),
        });
        GateDecision { decision, permit }
    }

    /// Converts a permit into a trade ready for execution, unless a kill
    /// signal arrived since it was issued.
    pub async fn redeem(&self, permit: ExecutionPermit) -> Redemption {
        let mut state = self.state.lock().await;
        let ExecutionPermit { opportunity, size, probe } = permit;

        if state.kill_engaged {
            state.release(opportunity.id);
            if probe {
                state.breaker.abandon_probe();
            }
            opportunity.lifecycle().resolve();
            drop(state);

            let decision = RiskDecision::rejected(&opportunity, RejectReason::KillSwitchEngaged);
            warn!(id = %opportunity.id, "🛑 Permit revoked: kill switch engaged");
            self.events.publish(BotEvent::RiskDecisionMade {
                opportunity_id: opportunity.id,
                decision: decision.clone(),
            });
            return Redemption::Revoked(decision);
        }

        if !opportunity.lifecycle().advance(LifecycleStage::Decided, LifecycleStage::Executing) {
            state.release(opportunity.id);
            return Redemption::Revoked(RiskDecision::rejected(&opportunity, RejectReason::AlreadyExecuted));
        }

        Redemption::Proceed(ApprovedTrade { opportunity, size, probe })
    }

    /// Books the outcome of an executed trade: ledger, reservations, and any
    /// breaker transition the result causes.
    pub async fn record_outcome(&self, trade: &ApprovedTrade, result: &TradeResult, now: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        let pairs: Vec<TokenPair> = trade.opportunity.traded_pairs().into_iter().collect();
        let cooldown = Duration::seconds(state.config.pair_cooldown_secs as i64);

        state.ledger.record(result, &pairs, cooldown, now);
        state.release(trade.opportunity.id);
        trade.opportunity.lifecycle().resolve();

        let mut transitions = Vec::new();
        if trade.probe {
            let transition = if result.is_failure() {
                state.breaker.record_failure(now)
            } else {
                state.breaker.record_success(now)
            };
            transitions.extend(transition);
        }

        let config = state.config.clone();
        let consecutive = state.ledger.consecutive_losses();
        if consecutive >= config.max_consecutive_losses {
            transitions.extend(state.breaker.trip(TripReason::ConsecutiveFailures { count: consecutive }, now));
        }
        let loss = state.ledger.daily_loss();
        if loss >= config.max_daily_loss {
            transitions.extend(state.breaker.trip(TripReason::DailyLoss { loss }, now));
        }
        drop(state);

        for transition in transitions {
            self.emit_transition(transition);
        }
    }

    /// Feeds the tick's snapshot into the volatility estimate and trips the
    /// breaker if in-flight VaR now exceeds its limit.
    pub async fn observe_quotes(&self, snapshot: &QuoteSnapshot, now: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        state.volatility.observe_snapshot(snapshot);
        if let Some(transition) = state.breaker.poll(now) {
            self.emit_transition(transition);
        }

        let var = state.current_var();
        let limit = var_limit(state.config.capital, state.config.var_limit_percent);
        if var > limit {
            if let Some(transition) = state.breaker.trip(TripReason::ValueAtRisk { var, limit }, now) {
                self.emit_transition(transition);
            }
        }
    }

    /// Forces the breaker open for good and invalidates every permit that
    /// has not been redeemed yet. Returns false if already engaged.
    pub async fn engage_kill(&self, source: &str, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().await;
        if state.kill_engaged {
            return false;
        }
        state.kill_engaged = true;
        let transition = state.breaker.trip(TripReason::KillSwitch, now);
        drop(state);

        warn!(source, "🛑 Kill switch engaged");
        self.events.publish(BotEvent::KillSwitchEngaged {
            source: source.to_string(),
            at: now,
        });
        if let Some(transition) = transition {
            self.emit_transition(transition);
        }
        true
    }

    pub async fn update_config(&self, config: RiskConfig) {
        let mut state = self.state.lock().await;
        state.breaker.set_cooldown(config.circuit_breaker_cooldown_secs);
        state.config = config;
    }

    pub async fn breaker_state(&self) -> CircuitBreakerState {
        self.state.lock().await.breaker.state().clone()
    }

    pub async fn snapshot(&self, now: DateTime<Utc>) -> RiskSnapshot {
        let state = self.state.lock().await;
        RiskSnapshot {
            breaker: state.breaker.state().clone(),
            kill_engaged: state.kill_engaged,
            exposure: state.exposure,
            value_at_risk: state.current_var(),
            in_flight: state.reservations.len(),
            ledger: state.ledger.summary(now),
        }
    }

    fn emit_transition(&self, transition: BreakerTransition) {
        info!(from = %transition.from, to = %transition.to, "Circuit breaker state changed");
        self.events.publish(BotEvent::CircuitBreakerStateChanged {
            from: transition.from,
            to: transition.to,
            at: transition.at,
        });
    }
}
