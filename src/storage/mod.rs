//! Data persistence and file operations

pub mod audit;
pub mod trades;

pub use audit::*;
pub use trades::*;
