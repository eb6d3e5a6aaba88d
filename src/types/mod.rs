//! Core data types and structures

pub mod market;
pub mod arbitrage;
pub mod risk;
pub mod execution;

pub use market::*;
pub use arbitrage::*;
pub use risk::*;
pub use execution::*;
