//! Configuration management for the arbitrage bot

pub mod settings;
pub mod risk_snapshot;

pub use settings::*;
pub use risk_snapshot::*;

use lazy_static::lazy_static;

lazy_static! {
    pub static ref CONFIG: Config = Config::load();
}
