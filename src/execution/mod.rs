//! Transaction construction, submission and dry-run simulation

pub mod builder;
pub mod engine;
pub mod instructions;
pub mod simulation;
pub mod transaction;

pub use builder::*;
pub use engine::*;
pub use instructions::*;
pub use simulation::*;
pub use transaction::*;
