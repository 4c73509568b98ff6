pub mod breaker;
pub mod inflight;
pub mod rate_limit;
pub mod retry;

pub use breaker::{Admission, BreakerState, CircuitBreaker, CircuitBreakerConfig};
pub use inflight::{await_outcome, Flight, FlightGuard, InFlightRegistry, SharedFailure};
pub use rate_limit::ServiceRateLimiter;
pub use retry::{
    classify_reqwest, classify_status, retry_with_policy, RetryClass, RetryPolicy, RetryableError,
};
