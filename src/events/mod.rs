//! Structured events emitted by the pipeline

pub mod bus;

pub use bus::*;
