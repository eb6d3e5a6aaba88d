//! Risk gate: sizing, limits, and the circuit breaker's single writer

pub mod evaluate;
pub mod gate;
pub mod ledger;
pub mod var;
pub mod volatility;

pub use evaluate::*;
pub use gate::*;
pub use ledger::*;
pub use var::*;
pub use volatility::*;
