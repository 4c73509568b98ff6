use crate::core::config::RateLimitConfig;
use crate::core::deadline::Deadline;
use crate::core::errors::ClassifyError;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Maximum time a caller will block waiting for a token.
const MAX_WAIT: Duration = Duration::from_secs(2);

/// Token-bucket limiter guarding one external service.
pub struct ServiceRateLimiter {
    service: &'static str,
    limiter: DirectRateLimiter,
}

impl ServiceRateLimiter {
    pub fn new(service: &'static str, config: &RateLimitConfig) -> Self {
        let per_second = NonZeroU32::new(config.per_second.max(1))
            .unwrap_or_else(|| NonZeroU32::new(1).unwrap());
        let burst =
            NonZeroU32::new(config.burst.max(1)).unwrap_or_else(|| NonZeroU32::new(1).unwrap());
        let quota = Quota::per_second(per_second).allow_burst(burst);
        Self {
            service,
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Acquire a token, waiting at most `min(remaining_deadline, 2s)`.
    pub async fn acquire(&self, deadline: Deadline) -> Result<(), ClassifyError> {
        if self.limiter.check().is_ok() {
            return Ok(());
        }
        let wait = deadline.remaining().min(MAX_WAIT);
        if wait.is_zero() {
            return Err(ClassifyError::RateLimited(self.service.to_string()));
        }
        match tokio::time::timeout(wait, self.limiter.until_ready()).await {
            Ok(()) => Ok(()),
            Err(_) => Err(ClassifyError::RateLimited(self.service.to_string())),
        }
    }
}
