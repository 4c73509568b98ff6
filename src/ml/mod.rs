use crate::core::config::{BreakerConfig, RateLimitConfig, ServicesConfig};
use crate::core::deadline::Deadline;
use crate::core::types::*;
use crate::reliability::{
    classify_status, Admission, CircuitBreaker, CircuitBreakerConfig, ServiceRateLimiter,
};
use anyhow::{anyhow, Result};
use std::time::Duration;
use tracing::debug;

/// ML confidence must beat the current confidence by this margin before its
/// primary industry is adopted.
pub const OVERRIDE_MARGIN: f64 = 0.10;

/// Why a Layer 3 call did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MlSkipReason {
    CircuitOpen,
    RateLimited,
    NotConfigured,
}

impl MlSkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MlSkipReason::CircuitOpen => "circuit_open",
            MlSkipReason::RateLimited => "rate_limited",
            MlSkipReason::NotConfigured => "not_configured",
        }
    }
}

/// Last-resort client for the external deep-NLP classifier, behind its own
/// circuit breaker.
pub struct MlClient {
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
    breaker: CircuitBreaker,
    limiter: ServiceRateLimiter,
}

impl MlClient {
    pub fn new(
        services: &ServicesConfig,
        breaker_config: &BreakerConfig,
        rate_config: &RateLimitConfig,
    ) -> Result<Option<Self>> {
        let Some(endpoint) = services.ml_url.clone() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .build()
            .map_err(|e| anyhow!("ml client build failed: {e}"))?;
        Ok(Some(Self {
            endpoint,
            client,
            timeout: services.ml_timeout(),
            breaker: CircuitBreaker::new(
                "ml",
                CircuitBreakerConfig {
                    failure_threshold: breaker_config.consecutive_failures,
                    open_duration: breaker_config.open_duration(),
                    window: breaker_config.window(),
                },
            ),
            limiter: ServiceRateLimiter::new("ml", rate_config),
        }))
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// One classification call. Breaker and rate-limit skips surface as
    /// `MlOutcome::Skipped`, not as faults.
    pub async fn classify(
        &self,
        business_name: &str,
        description: Option<&str>,
        scraped_text: Option<&str>,
        deadline: Deadline,
    ) -> MlOutcome {
        match self.breaker.admit() {
            Admission::Reject => return MlOutcome::Skipped(MlSkipReason::CircuitOpen),
            Admission::Allow | Admission::Probe => {}
        }
        if self.limiter.acquire(deadline).await.is_err() {
            return MlOutcome::Skipped(MlSkipReason::RateLimited);
        }

        let timeout = deadline.clamp(self.timeout);
        if timeout.is_zero() {
            return MlOutcome::Failed("deadline exhausted before ML call".to_string());
        }

        let request = MlClassifyRequest {
            business_name: business_name.to_string(),
            description: description.map(|s| s.to_string()),
            scraped_text: scraped_text.map(|s| s.to_string()),
        };

        let outcome = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&request)
            .send()
            .await;

        let response = match outcome {
            Ok(r) => r,
            Err(e) => {
                self.breaker.record_failure();
                return MlOutcome::Failed(format!("ml request failed: {e}"));
            }
        };

        let status = response.status().as_u16();
        if let Some(class) = classify_status(status) {
            if class == crate::reliability::RetryClass::Transient {
                self.breaker.record_failure();
            }
            return MlOutcome::Failed(format!("ml service returned HTTP {status}"));
        }

        match response.json::<MlClassifyResponse>().await {
            Ok(parsed) => {
                self.breaker.record_success();
                debug!(
                    industry = %parsed.primary_industry,
                    confidence = parsed.confidence,
                    codes = parsed.codes.len(),
                    "ml classification received"
                );
                MlOutcome::Classified(parsed)
            }
            Err(e) => {
                self.breaker.record_failure();
                MlOutcome::Failed(format!("ml payload decode failed: {e}"))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum MlOutcome {
    Classified(MlClassifyResponse),
    Skipped(MlSkipReason),
    Failed(String),
}

/// Whether the ML verdict displaces the current primary industry.
pub fn should_override(current_confidence: f64, ml_confidence: f64) -> bool {
    ml_confidence > current_confidence + OVERRIDE_MARGIN
}
