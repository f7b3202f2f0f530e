//! Consume request throttle
//!
//! Uses the governor crate for token bucket rate limiting. The mirror loop
//! never waits on it: a tick without a permit simply schedules nothing.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Token bucket limiting how often the scheduler may issue consume requests
#[derive(Clone)]
pub struct ConsumeThrottle {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
    per_second: NonZeroU32,
}

impl ConsumeThrottle {
    /// Allow `per_second` requests per second, with a burst of the same size
    pub fn new(per_second: NonZeroU32) -> Self {
        Self {
            limiter: Arc::new(Governor::direct(Quota::per_second(per_second))),
            per_second,
        }
    }

    /// Throttle for an optional configured rate; `None` or 0 means unthrottled
    pub fn from_rate(per_second: Option<u32>) -> Option<Self> {
        per_second.and_then(NonZeroU32::new).map(Self::new)
    }

    /// Configured rate
    pub fn per_second(&self) -> u32 {
        self.per_second.get()
    }

    /// Take a permit if one is available right now
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for ConsumeThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumeThrottle")
            .field("per_second", &self.per_second)
            .finish()
    }
}
