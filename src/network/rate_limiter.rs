//! Per-API rate limiting for outbound calls

use governor::{DefaultDirectRateLimiter, Quota};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;
use crate::types::Venue;

/// Shared limiter for one API. Callers wait for capacity instead of having
/// their request dropped.
pub type ApiLimiter = Arc<DefaultDirectRateLimiter>;

/// Limiter allowing `calls_per_sec` calls per second, bursting to the same
/// number. A zero rate is treated as one call per second.
pub fn per_second(calls_per_sec: u32) -> ApiLimiter {
    let rate = NonZeroU32::new(calls_per_sec).unwrap_or(NonZeroU32::MIN);
    Arc::new(DefaultDirectRateLimiter::direct(Quota::per_second(rate)))
}

/// One quota per venue, so a slow or chatty venue never eats another's budget.
#[derive(Clone)]
pub struct VenueRateLimiter {
    limiters: HashMap<Venue, ApiLimiter>,
}

impl VenueRateLimiter {
    pub fn new(venues: &[Venue], calls_per_sec: u32) -> Self {
        Self {
            limiters: venues.iter().map(|&venue| (venue, per_second(calls_per_sec))).collect(),
        }
    }

    /// Non-blocking check. Venues without a quota are never throttled.
    pub fn check(&self, venue: Venue) -> bool {
        self.limiters
            .get(&venue)
            .map(|limiter| limiter.check().is_ok())
            .unwrap_or(true)
    }

    pub async fn wait(&self, venue: Venue) {
        if let Some(limiter) = self.limiters.get(&venue) {
            if limiter.check().is_err() {
                debug!(venue = %venue, "Rate limited, waiting for capacity");
                limiter.until_ready().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn burst_then_empty() {
        let limiter = per_second(2);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[tokio::test]
    async fn wait_blocks_until_capacity_returns() {
        let limits = VenueRateLimiter::new(&[Venue::Orca], 20);
        for _ in 0..20 {
            assert!(limits.check(Venue::Orca));
        }

        let started = Instant::now();
        limits.wait(Venue::Orca).await;
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn venues_have_independent_quotas() {
        let limits = VenueRateLimiter::new(&[Venue::Raydium, Venue::Orca], 1);
        assert!(limits.check(Venue::Raydium));
        assert!(!limits.check(Venue::Raydium));
        assert!(limits.check(Venue::Orca));
        assert!(limits.check(Venue::Jupiter));
    }
}
