//! Risk gate decision and circuit breaker types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use super::{ArbitrageOpportunity, TokenPair};

/// Why the risk gate refused an opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    CircuitBreakerOpen,
    ProbeInFlight,
    KillSwitchEngaged,
    Expired,
    AlreadyDecided,
    AlreadyExecuted,
    BelowMinimumProfit { net_profit_pct: Decimal, threshold_pct: Decimal },
    BelowMinimumSize { size: Decimal, minimum: Decimal },
    DailyLossLimit { loss: Decimal, limit: Decimal },
    PairInFlight { pair: TokenPair },
    PairCooldown { pair: TokenPair, until: DateTime<Utc> },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::CircuitBreakerOpen => write!(f, "circuit breaker open"),
            RejectReason::ProbeInFlight => write!(f, "circuit breaker half-open with probe in flight"),
            RejectReason::KillSwitchEngaged => write!(f, "kill switch engaged"),
            RejectReason::Expired => write!(f, "opportunity expired"),
            RejectReason::AlreadyDecided => write!(f, "opportunity already decided"),
            RejectReason::AlreadyExecuted => write!(f, "opportunity already executed"),
            RejectReason::BelowMinimumProfit { net_profit_pct, threshold_pct } => write!(
                f,
                "net profit {:.4}% does not exceed threshold {}%",
                net_profit_pct, threshold_pct
            ),
            RejectReason::BelowMinimumSize { size, minimum } => {
                write!(f, "size {:.2} below minimum viable size {}", size, minimum)
            }
            RejectReason::DailyLossLimit { loss, limit } => {
                write!(f, "daily loss {:.2} reached limit {}", loss, limit)
            }
            RejectReason::PairInFlight { pair } => write!(f, "{} already has an execution in flight", pair),
            RejectReason::PairCooldown { pair, until } => {
                write!(f, "{} cooling down until {}", pair, until.format("%H:%M:%S"))
            }
        }
    }
}

/// Exactly one of these is produced per opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RiskDecision {
    Approved {
        opportunity: ArbitrageOpportunity,
        size: Decimal,
        reason: String,
    },
    Reduced {
        opportunity: ArbitrageOpportunity,
        requested: Decimal,
        size: Decimal,
        reason: String,
    },
    Rejected {
        opportunity_id: Uuid,
        reason: RejectReason,
    },
}

impl RiskDecision {
    pub fn rejected(opportunity: &ArbitrageOpportunity, reason: RejectReason) -> Self {
        RiskDecision::Rejected {
            opportunity_id: opportunity.id,
            reason,
        }
    }

    pub fn opportunity_id(&self) -> Uuid {
        match self {
            RiskDecision::Approved { opportunity, .. } | RiskDecision::Reduced { opportunity, .. } => {
                opportunity.id
            }
            RiskDecision::Rejected { opportunity_id, .. } => *opportunity_id,
        }
    }

    pub fn is_permitted(&self) -> bool {
        !matches!(self, RiskDecision::Rejected { .. })
    }

    pub fn size(&self) -> Option<Decimal> {
        match self {
            RiskDecision::Approved { size, .. } | RiskDecision::Reduced { size, .. } => Some(*size),
            RiskDecision::Rejected { .. } => None,
        }
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            RiskDecision::Rejected { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Human-readable reason, present for every variant.
    pub fn reason(&self) -> String {
        match self {
            RiskDecision::Approved { reason, .. } | RiskDecision::Reduced { reason, .. } => reason.clone(),
            RiskDecision::Rejected { reason, .. } => reason.to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskDecision::Approved { .. } => "approved",
            RiskDecision::Reduced { .. } => "reduced",
            RiskDecision::Rejected { .. } => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TripReason {
    ConsecutiveFailures { count: u32 },
    DailyLoss { loss: Decimal },
    ValueAtRisk { var: Decimal, limit: Decimal },
    ProbeFailed,
    KillSwitch,
}

impl fmt::Display for TripReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripReason::ConsecutiveFailures { count } => write!(f, "{} consecutive failed trades", count),
            TripReason::DailyLoss { loss } => write!(f, "daily realized loss {:.2}", loss),
            TripReason::ValueAtRisk { var, limit } => write!(f, "value at risk {:.2} above limit {:.2}", var, limit),
            TripReason::ProbeFailed => write!(f, "half-open probe trade failed"),
            TripReason::KillSwitch => write!(f, "kill switch engaged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CircuitBreakerState {
    Closed,
    Open {
        reason: TripReason,
        opened_at: DateTime<Utc>,
    },
    HalfOpen {
        probes: u32,
    },
}

impl CircuitBreakerState {
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerState::Open { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            CircuitBreakerState::Closed => "CLOSED",
            CircuitBreakerState::Open { .. } => "OPEN",
            CircuitBreakerState::HalfOpen { .. } => "HALF-OPEN",
        }
    }
}

impl fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitBreakerState::Open { reason, .. } => write!(f, "OPEN ({})", reason),
            CircuitBreakerState::HalfOpen { probes } => write!(f, "HALF-OPEN ({} probes)", probes),
            CircuitBreakerState::Closed => write!(f, "CLOSED"),
        }
    }
}
