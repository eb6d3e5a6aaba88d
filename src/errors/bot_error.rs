//! Custom error types for the bot

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
        retry_count: u32,
    },

    #[error("Timed out after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Rate limited by {service}")]
    RateLimited { service: String },

    #[error("RPC unavailable: {message}")]
    RpcUnavailable { message: String },

    #[error("Stale quote: {context} is {age_ms}ms old")]
    StaleQuote { context: String, age_ms: i64 },

    #[error("Slippage exceeded: {message}")]
    SlippageExceeded { message: String },

    #[error("Below minimum profit: {net_profit_pct}% after fees")]
    BelowMinimumProfit { net_profit_pct: Decimal },

    #[error("Opportunity expired: {id}")]
    OpportunityExpired { id: String },

    #[error("Insufficient funds: {message}")]
    InsufficientFunds { message: String },

    #[error("Position limit breached: {exposure} exceeds {limit}")]
    PositionLimit { exposure: Decimal, limit: Decimal },

    #[error("Simulation failed: {message}")]
    SimulationFailed { message: String, logs: Vec<String> },

    #[error("compute unit overflow: {used} units exceeds cap of {limit}")]
    ComputeUnitOverflow { used: u64, limit: u64 },

    #[error("Malformed instruction data: {context}")]
    MalformedInstruction {
        context: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Data parsing error: {context}")]
    DataParsing {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Transaction signing failed: {message}")]
    Signing { message: String },

    #[error("{method} rejected by node ({code}): {message}")]
    RpcRejected { method: String, code: i64, message: String },

    #[error("Circuit breaker active: {reason}")]
    CircuitBreakerOpen {
        reason: String,
        cooldown_remaining: Duration,
    },

    #[error("kill switch engaged")]
    KillSwitchEngaged,

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

pub type BotResult<T> = Result<T, BotError>;

/// Serializable discriminant of [`BotError`], carried in trade results and
/// events so consumers branch on kind instead of message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Timeout,
    RateLimited,
    RpcUnavailable,
    StaleQuote,
    SlippageExceeded,
    BelowMinimumProfit,
    OpportunityExpired,
    DataParsing,
    InsufficientFunds,
    PositionLimit,
    SimulationFailed,
    ComputeUnitOverflow,
    MalformedInstruction,
    Signing,
    RpcRejected,
    CircuitBreakerOpen,
    KillSwitchEngaged,
    InvalidConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Retried locally with backoff.
    Transient,
    OpportunityInvalid,
    Capital,
    ExecutionFatal,
    /// Blocks new executions; not a fault of any single trade.
    Systemic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Warning,
    Error,
    Critical,
}

impl ErrorKind {
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::RateLimited | ErrorKind::RpcUnavailable => {
                ErrorClass::Transient
            }
            ErrorKind::StaleQuote
            | ErrorKind::SlippageExceeded
            | ErrorKind::BelowMinimumProfit
            | ErrorKind::OpportunityExpired
            | ErrorKind::DataParsing => ErrorClass::OpportunityInvalid,
            ErrorKind::InsufficientFunds | ErrorKind::PositionLimit => ErrorClass::Capital,
            ErrorKind::SimulationFailed
            | ErrorKind::ComputeUnitOverflow
            | ErrorKind::MalformedInstruction
            | ErrorKind::Signing
            | ErrorKind::RpcRejected => ErrorClass::ExecutionFatal,
            ErrorKind::CircuitBreakerOpen | ErrorKind::KillSwitchEngaged | ErrorKind::InvalidConfig => {
                ErrorClass::Systemic
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.class() {
            ErrorClass::Transient | ErrorClass::OpportunityInvalid => ErrorSeverity::Warning,
            ErrorClass::Capital | ErrorClass::ExecutionFatal => ErrorSeverity::Error,
            ErrorClass::Systemic => ErrorSeverity::Critical,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

impl BotError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BotError::Network { .. } => ErrorKind::Network,
            BotError::Timeout { .. } => ErrorKind::Timeout,
            BotError::RateLimited { .. } => ErrorKind::RateLimited,
            BotError::RpcUnavailable { .. } => ErrorKind::RpcUnavailable,
            BotError::StaleQuote { .. } => ErrorKind::StaleQuote,
            BotError::SlippageExceeded { .. } => ErrorKind::SlippageExceeded,
            BotError::BelowMinimumProfit { .. } => ErrorKind::BelowMinimumProfit,
            BotError::OpportunityExpired { .. } => ErrorKind::OpportunityExpired,
            BotError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            BotError::PositionLimit { .. } => ErrorKind::PositionLimit,
            BotError::SimulationFailed { .. } => ErrorKind::SimulationFailed,
            BotError::ComputeUnitOverflow { .. } => ErrorKind::ComputeUnitOverflow,
            BotError::MalformedInstruction { .. } => ErrorKind::MalformedInstruction,
            BotError::DataParsing { .. } => ErrorKind::DataParsing,
            BotError::Signing { .. } => ErrorKind::Signing,
            BotError::RpcRejected { .. } => ErrorKind::RpcRejected,
            BotError::CircuitBreakerOpen { .. } => ErrorKind::CircuitBreakerOpen,
            BotError::KillSwitchEngaged => ErrorKind::KillSwitchEngaged,
            BotError::InvalidConfig { .. } => ErrorKind::InvalidConfig,
        }
    }

    pub fn class(&self) -> ErrorClass {
        self.kind().class()
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.kind().severity()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn network(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        BotError::Network {
            message: message.into(),
            source: Some(source.into()),
            retry_count: 0,
        }
    }

    pub fn malformed(context: impl Into<String>) -> Self {
        BotError::MalformedInstruction {
            context: context.into(),
            source: None,
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        BotError::InvalidConfig { reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_retry() {
        let timeout = BotError::Timeout {
            operation: "sendTransaction".to_string(),
            timeout_ms: 3000,
        };
        assert!(timeout.is_retryable());
        assert!(BotError::RateLimited { service: "rpc".to_string() }.is_retryable());

        let overflow = BotError::ComputeUnitOverflow { used: 1_500_000, limit: 1_400_000 };
        assert!(!overflow.is_retryable());
        assert_eq!(overflow.class(), ErrorClass::ExecutionFatal);

        let slippage = BotError::SlippageExceeded { message: "0x1771".to_string() };
        assert!(!slippage.is_retryable());
        assert_eq!(slippage.class(), ErrorClass::OpportunityInvalid);

        let funds = BotError::InsufficientFunds { message: "payer".to_string() };
        assert_eq!(funds.class(), ErrorClass::Capital);
    }

    #[test]
    fn systemic_errors_are_critical() {
        assert_eq!(BotError::KillSwitchEngaged.severity(), ErrorSeverity::Critical);
        assert_eq!(
            BotError::CircuitBreakerOpen {
                reason: "3 consecutive failed trades".to_string(),
                cooldown_remaining: Duration::from_secs(60),
            }
            .class(),
            ErrorClass::Systemic
        );
        assert_eq!(ErrorKind::Timeout.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn overflow_message_leads_with_kind() {
        let overflow = BotError::ComputeUnitOverflow { used: 1_500_000, limit: 1_400_000 };
        assert!(overflow.to_string().starts_with("compute unit overflow"));
    }
}
