//! Pipeline events and the broadcast bus that fans them out

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;
use crate::types::{ArbitrageOpportunity, CircuitBreakerState, ExecutionPath, RiskDecision, TradeResult};

/// One event per significant transition in an opportunity's life or the
/// gate's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BotEvent {
    OpportunityDetected(ArbitrageOpportunity),
    RiskDecisionMade {
        opportunity_id: Uuid,
        decision: RiskDecision,
    },
    TradeSubmitted {
        opportunity_id: Uuid,
        signature: String,
        path: ExecutionPath,
        via_relay: bool,
        at: DateTime<Utc>,
    },
    /// Confirmed on chain, or a simulated fill in dry-run mode.
    TradeConfirmed(TradeResult),
    TradeFailed(TradeResult),
    CircuitBreakerStateChanged {
        from: CircuitBreakerState,
        to: CircuitBreakerState,
        at: DateTime<Utc>,
    },
    KillSwitchEngaged {
        source: String,
        at: DateTime<Utc>,
    },
    TickSkipped {
        tick: u64,
        reason: String,
        at: DateTime<Utc>,
    },
    ConfigReloaded {
        accepted: bool,
        reason: Option<String>,
        at: DateTime<Utc>,
    },
}

impl BotEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BotEvent::OpportunityDetected(_) => "OpportunityDetected",
            BotEvent::RiskDecisionMade { .. } => "RiskDecisionMade",
            BotEvent::TradeSubmitted { .. } => "TradeSubmitted",
            BotEvent::TradeConfirmed(_) => "TradeConfirmed",
            BotEvent::TradeFailed(_) => "TradeFailed",
            BotEvent::CircuitBreakerStateChanged { .. } => "CircuitBreakerStateChanged",
            BotEvent::KillSwitchEngaged { .. } => "KillSwitchEngaged",
            BotEvent::TickSkipped { .. } => "TickSkipped",
            BotEvent::ConfigReloaded { .. } => "ConfigReloaded",
        }
    }

    pub fn trade_outcome(result: TradeResult) -> Self {
        if result.is_failure() {
            BotEvent::TradeFailed(result)
        } else {
            BotEvent::TradeConfirmed(result)
        }
    }
}

/// Best-effort fan-out: publishing never blocks, and an event with no
/// subscribers is simply dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BotEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: BotEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_every_subscriber() {
        let bus = EventBus::new(16);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let event = BotEvent::TickSkipped {
            tick: 7,
            reason: "search budget exceeded".to_string(),
            at: Utc::now(),
        };
        assert_eq!(bus.publish(event.clone()), 2);
        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap().name(), "TickSkipped");
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let bus = EventBus::default();
        let sent = bus.publish(BotEvent::KillSwitchEngaged {
            source: "test".to_string(),
            at: Utc::now(),
        });
        assert_eq!(sent, 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn serializes_with_type_tag() {
        let event = BotEvent::ConfigReloaded {
            accepted: false,
            reason: Some("max_position_size must be positive".to_string()),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ConfigReloaded");
        assert_eq!(json["data"]["accepted"], false);
    }
}
