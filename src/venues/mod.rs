//! Venue integrations and the quote cache

pub mod gateway;
pub mod quote_book;

pub use gateway::*;
pub use quote_book::*;
