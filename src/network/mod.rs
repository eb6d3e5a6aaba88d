//! Outbound network plumbing: retries, rate limits, RPC and relay clients

pub mod retry;
pub mod rate_limiter;
pub mod rpc;
pub mod relay;

pub use retry::*;
pub use rate_limiter::*;
pub use rpc::*;
pub use relay::*;
