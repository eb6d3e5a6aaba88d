//! Cycle Arbitrage Bot - multi-venue DEX arbitrage pipeline
//!
//! Polls quotes from several venues, searches the exchange-rate graph for
//! profitable cycles and spreads, runs statistical and latency strategies
//! over the same snapshot, passes every candidate through a single risk gate
//! and executes approved trades as signed transactions.

pub mod config;
pub mod types;
pub mod errors;
pub mod network;
pub mod venues;
pub mod arbitrage;
pub mod strategies;
pub mod risk;
pub mod execution;
pub mod events;
pub mod storage;
pub mod bot;
pub mod utils;

// Re-export commonly used items
pub use config::{Config, CONFIG};
pub use errors::{BotError, BotResult};
pub use types::*;
