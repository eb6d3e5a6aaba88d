//! Tick orchestration, startup checks, kill switch and session statistics

pub mod pipeline;
pub mod preflight;
pub mod shutdown;
pub mod stats;

pub use pipeline::*;
pub use preflight::*;
pub use shutdown::*;
pub use stats::*;
