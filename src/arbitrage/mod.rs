//! Opportunity graph engine: cycle search and two-venue spreads

pub mod cycles;
pub mod graph;
pub mod spread;

pub use cycles::*;
pub use graph::*;
pub use spread::*;
