//! Proactive request pacing.
//!
//! The quota guard budgets how many calls may happen; the pacer spaces them
//! out so bursts do not trip the provider's secondary rate limits. Attaching
//! a pacer to a client is optional.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Conservative default: GitHub allows 5000 requests/hour authenticated, but
/// sustained bursts above ~10/sec start drawing secondary limits.
pub const DEFAULT_RPS: u32 = 10;

/// A standalone API rate limiter using the governor crate.
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Create a limiter allowing `requests_per_second` (0 is treated as 1).
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            inner: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        }
    }

    /// Wait (asynchronously) until the next request is allowed.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl Default for ApiRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RPS)
    }
}
