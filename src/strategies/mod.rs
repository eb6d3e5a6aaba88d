//! Auxiliary signal generators that run beside the cycle search

pub mod generator;
pub mod latency;
pub mod statistical;

pub use generator::*;
pub use latency::*;
pub use statistical::*;
