//! Circuit breaker state machine
//!
//! Pure transitions over an explicit clock so the risk gate (its only
//! writer) and tests drive it deterministically.

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};
use crate::types::{CircuitBreakerState, TripReason};

#[derive(Debug, Clone, PartialEq)]
pub struct BreakerTransition {
    pub from: CircuitBreakerState,
    pub to: CircuitBreakerState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitBreakerState,
    cooldown: Duration,
    probe_in_flight: bool,
}

impl CircuitBreaker {
    pub fn new(cooldown_secs: u64) -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            cooldown: Duration::seconds(cooldown_secs as i64),
            probe_in_flight: false,
        }
    }

    pub fn state(&self) -> &CircuitBreakerState {
        &self.state
    }

    pub fn set_cooldown(&mut self, cooldown_secs: u64) {
        self.cooldown = Duration::seconds(cooldown_secs as i64);
    }

    pub fn probe_in_flight(&self) -> bool {
        self.probe_in_flight
    }

    /// Open -> HalfOpen once the cooldown has elapsed. A kill-switch trip
    /// never cools down on its own.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<BreakerTransition> {
        if let CircuitBreakerState::Open { reason, opened_at } = &self.state {
            if *reason != TripReason::KillSwitch && now - *opened_at >= self.cooldown {
                info!("Circuit breaker cooldown complete, entering half-open");
                return Some(self.transition(CircuitBreakerState::HalfOpen { probes: 0 }, now));
            }
        }
        None
    }

    pub fn cooldown_remaining(&self, now: DateTime<Utc>) -> Duration {
        match &self.state {
            CircuitBreakerState::Open { opened_at, .. } => (self.cooldown - (now - *opened_at)).max(Duration::zero()),
            _ => Duration::zero(),
        }
    }

    /// Closed always permits; HalfOpen permits a single probe at a time.
    pub fn permits_trade(&self) -> bool {
        match self.state {
            CircuitBreakerState::Closed => true,
            CircuitBreakerState::HalfOpen { .. } => !self.probe_in_flight,
            CircuitBreakerState::Open { .. } => false,
        }
    }

    pub fn begin_probe(&mut self) {
        if let CircuitBreakerState::HalfOpen { probes } = &mut self.state {
            *probes += 1;
            self.probe_in_flight = true;
        }
    }

    /// Releases a probe slot whose trade never reached execution.
    pub fn abandon_probe(&mut self) {
        self.probe_in_flight = false;
    }

    pub fn trip(&mut self, reason: TripReason, now: DateTime<Utc>) -> Option<BreakerTransition> {
        if let CircuitBreakerState::Open { reason: current, .. } = &self.state {
            // Only a kill may replace an existing trip reason.
            if *current == TripReason::KillSwitch || reason != TripReason::KillSwitch {
                return None;
            }
        }
        error!(reason = %reason, "Circuit breaker OPEN");
        self.probe_in_flight = false;
        Some(self.transition(CircuitBreakerState::Open { reason, opened_at: now }, now))
    }

    pub fn record_success(&mut self, now: DateTime<Utc>) -> Option<BreakerTransition> {
        if let CircuitBreakerState::HalfOpen { .. } = self.state {
            info!("Half-open probe succeeded, closing circuit breaker");
            self.probe_in_flight = false;
            return Some(self.transition(CircuitBreakerState::Closed, now));
        }
        None
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>) -> Option<BreakerTransition> {
        if let CircuitBreakerState::HalfOpen { .. } = self.state {
            warn!("Half-open probe failed, reopening circuit breaker");
            return self.trip(TripReason::ProbeFailed, now);
        }
        None
    }

    fn transition(&mut self, to: CircuitBreakerState, at: DateTime<Utc>) -> BreakerTransition {
        let from = std::mem::replace(&mut self.state, to.clone());
        BreakerTransition { from, to, at }
    }
}
