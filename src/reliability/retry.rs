use crate::core::deadline::Deadline;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Transport error classification. Every error is classified exactly once,
/// at the call site that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// DNS, connection refused, read timeout, 5xx, 408.
    Transient,
    /// HTTP 429; retried honoring `Retry-After` when present.
    RateLimited,
    /// 4xx (except 408/429), invalid URL, content-type mismatch.
    Permanent,
}

/// Classified failure handed back by a retried operation.
#[derive(Debug)]
pub struct RetryableError<E> {
    pub class: RetryClass,
    pub retry_after: Option<Duration>,
    pub error: E,
}

impl<E> RetryableError<E> {
    pub fn transient(error: E) -> Self {
        Self {
            class: RetryClass::Transient,
            retry_after: None,
            error,
        }
    }

    pub fn rate_limited(error: E, retry_after: Option<Duration>) -> Self {
        Self {
            class: RetryClass::RateLimited,
            retry_after,
            error,
        }
    }

    pub fn permanent(error: E) -> Self {
        Self {
            class: RetryClass::Permanent,
            retry_after: None,
            error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_transient_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_rate_limit_attempts: u32,
    pub rate_limit_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_transient_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
            max_rate_limit_attempts: 5,
            rate_limit_cap: Duration::from_secs(10),
        }
    }
}

/// Classify an HTTP status for retry purposes. `None` means success-range.
pub fn classify_status(status: u16) -> Option<RetryClass> {
    match status {
        200..=399 => None,
        408 => Some(RetryClass::Transient),
        429 => Some(RetryClass::RateLimited),
        400..=499 => Some(RetryClass::Permanent),
        _ => Some(RetryClass::Transient),
    }
}

/// Classify a reqwest transport error (no HTTP status available).
pub fn classify_reqwest(err: &reqwest::Error) -> RetryClass {
    if err.is_timeout() || err.is_connect() {
        RetryClass::Transient
    } else if err.is_builder() || err.is_request() {
        RetryClass::Permanent
    } else {
        // Body/decode/redirect errors: the response was damaged in flight.
        RetryClass::Transient
    }
}

/// Run `op` under the adaptive retry policy, bounded by `deadline`.
///
/// Transient errors back off exponentially with full jitter; 429s honor
/// `Retry-After` up to the policy cap; permanent errors return immediately.
pub async fn retry_with_policy<T, E, F, Fut>(
    deadline: Deadline,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, RetryableError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, RetryableError<E>>>,
{
    let mut backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.base_delay)
        .with_max_interval(policy.max_delay)
        .with_randomization_factor(0.0)
        .with_max_elapsed_time(None)
        .build();

    let mut transient_attempts = 0u32;
    let mut rate_limit_attempts = 0u32;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let err = match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };

        let delay = match err.class {
            RetryClass::Permanent => return Err(err),
            RetryClass::Transient => {
                transient_attempts += 1;
                if transient_attempts >= policy.max_transient_attempts {
                    return Err(err);
                }
                let interval = backoff.next_backoff().unwrap_or(policy.max_delay);
                full_jitter(interval)
            }
            RetryClass::RateLimited => {
                rate_limit_attempts += 1;
                if rate_limit_attempts >= policy.max_rate_limit_attempts {
                    return Err(err);
                }
                match err.retry_after {
                    Some(after) => after.min(policy.rate_limit_cap),
                    None => {
                        let interval = backoff.next_backoff().unwrap_or(policy.max_delay);
                        full_jitter(interval).min(policy.rate_limit_cap)
                    }
                }
            }
        };

        if deadline.remaining() <= delay {
            return Err(err);
        }
        tokio::time::sleep(delay).await;
    }
}

fn full_jitter(interval: Duration) -> Duration {
    if interval.is_zero() {
        return interval;
    }
    let nanos = interval.as_nanos() as u64;
    let jittered = rand::thread_rng().gen_range(0..=nanos);
    Duration::from_nanos(jittered)
}
