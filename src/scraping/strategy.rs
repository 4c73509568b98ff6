use crate::core::config::{BreakerConfig, RateLimitConfig, ScrapeConfig};
use crate::core::deadline::Deadline;
use crate::core::types::ScrapeServicePayload;
use crate::reliability::{
    classify_reqwest, classify_status, Admission, CircuitBreaker, CircuitBreakerConfig,
    RetryableError, ServiceRateLimiter,
};
use crate::scraping::headers;
use anyhow::anyhow;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use url::Url;

/// Which of the two in-process HTTP strategies to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpKind {
    /// Plain HTTPS GET with a desktop user agent.
    Fast,
    /// Same, plus the full realistic browser header set.
    Browser,
}

/// HTTP fetchers for strategies 1 and 2.
pub struct HttpFetcher {
    fast: reqwest::Client,
    browser: reqwest::Client,
    config: ScrapeConfig,
}

impl HttpFetcher {
    pub fn new(config: &ScrapeConfig) -> anyhow::Result<Self> {
        Ok(Self {
            fast: Self::build_client(config, HttpKind::Fast, None)?,
            browser: Self::build_client(config, HttpKind::Browser, None)?,
            config: config.clone(),
        })
    }

    fn build_client(
        config: &ScrapeConfig,
        kind: HttpKind,
        pinned: Option<(&str, Ipv4Addr)>,
    ) -> anyhow::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .connect_timeout(Duration::from_secs(5));

        if kind == HttpKind::Browser {
            let mut default_headers = reqwest::header::HeaderMap::new();
            for (name, value) in headers::browser_header_set() {
                let header_name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| anyhow!("invalid header name `{name}`: {e}"))?;
                default_headers.insert(
                    header_name,
                    value
                        .parse()
                        .map_err(|e| anyhow!("invalid header value for `{name}`: {e}"))?,
                );
            }
            builder = builder
                .default_headers(default_headers)
                .user_agent(headers::DESKTOP_USER_AGENTS[0]);
        }

        if let Some((host, addr)) = pinned {
            builder = builder.resolve(host, SocketAddr::new(IpAddr::V4(addr), 0));
        }

        builder.build().map_err(|e| anyhow!("http client build failed: {e}"))
    }

    /// Fetch one page as HTML text. `pinned` routes the host to an address
    /// obtained from the DNS fallback chain.
    pub async fn fetch(
        &self,
        kind: HttpKind,
        url: &Url,
        pinned: Option<Ipv4Addr>,
        deadline: Deadline,
    ) -> Result<String, RetryableError<anyhow::Error>> {
        let pinned_client;
        let client = match pinned {
            Some(addr) => {
                let host = url
                    .host_str()
                    .ok_or_else(|| RetryableError::permanent(anyhow!("URL has no host")))?;
                pinned_client = Self::build_client(&self.config, kind, Some((host, addr)))
                    .map_err(RetryableError::permanent)?;
                &pinned_client
            }
            None => match kind {
                HttpKind::Fast => &self.fast,
                HttpKind::Browser => &self.browser,
            },
        };

        let timeout = deadline.clamp(Duration::from_secs(self.config.fast_timeout_secs));
        if timeout.is_zero() {
            return Err(RetryableError::transient(anyhow!("deadline exhausted")));
        }

        let mut request = client.get(url.clone()).timeout(timeout);
        if kind == HttpKind::Fast {
            request = request.header("User-Agent", headers::random_desktop_user_agent());
        }

        let response = request.send().await.map_err(|e| {
            let class = classify_reqwest(&e);
            RetryableError {
                class,
                retry_after: None,
                error: anyhow!("request failed: {e}"),
            }
        })?;

        let status = response.status().as_u16();
        if let Some(class) = classify_status(status) {
            let retry_after = parse_retry_after(response.headers());
            return Err(RetryableError {
                class,
                retry_after,
                error: anyhow!("HTTP {status}"),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !content_type.is_empty() && !content_type.contains("html") && !content_type.contains("xml")
        {
            return Err(RetryableError::permanent(anyhow!(
                "unsupported content type `{content_type}`"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RetryableError::transient(anyhow!("body read failed: {e}")))?;
        let capped = &bytes[..bytes.len().min(self.config.max_body_bytes)];
        Ok(String::from_utf8_lossy(capped).into_owned())
    }
}

pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Client for one external scraping microservice (hrequests or playwright),
/// behind its own circuit breaker and rate limiter.
pub struct ScrapeServiceClient {
    name: &'static str,
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
    breaker: CircuitBreaker,
    limiter: ServiceRateLimiter,
}

#[derive(serde::Serialize)]
struct ScrapeServiceRequest<'a> {
    url: &'a str,
}

impl ScrapeServiceClient {
    pub fn new(
        name: &'static str,
        endpoint: String,
        timeout: Duration,
        breaker_config: &BreakerConfig,
        rate_config: &RateLimitConfig,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| anyhow!("scrape service client build failed: {e}"))?;
        Ok(Self {
            name,
            endpoint,
            client,
            timeout,
            breaker: CircuitBreaker::new(
                name,
                CircuitBreakerConfig {
                    failure_threshold: breaker_config.consecutive_failures,
                    open_duration: breaker_config.open_duration(),
                    window: breaker_config.window(),
                },
            ),
            limiter: ServiceRateLimiter::new(name, rate_config),
        })
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn scrape(
        &self,
        target: &Url,
        deadline: Deadline,
    ) -> Result<ScrapeServicePayload, RetryableError<anyhow::Error>> {
        match self.breaker.admit() {
            Admission::Reject => {
                return Err(RetryableError::permanent(anyhow!("circuit_open")));
            }
            Admission::Allow | Admission::Probe => {}
        }

        if let Err(e) = self.limiter.acquire(deadline).await {
            return Err(RetryableError::permanent(anyhow!("rate_limited: {e}")));
        }

        let timeout = deadline.clamp(self.timeout);
        if timeout.is_zero() {
            return Err(RetryableError::transient(anyhow!("deadline exhausted")));
        }

        let outcome = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&ScrapeServiceRequest {
                url: target.as_str(),
            })
            .send()
            .await;

        let response = match outcome {
            Ok(r) => r,
            Err(e) => {
                self.breaker.record_failure();
                let class = classify_reqwest(&e);
                return Err(RetryableError {
                    class,
                    retry_after: None,
                    error: anyhow!("{} request failed: {e}", self.name),
                });
            }
        };

        let status = response.status().as_u16();
        if let Some(class) = classify_status(status) {
            if class == crate::reliability::RetryClass::Transient {
                self.breaker.record_failure();
            }
            let retry_after = parse_retry_after(response.headers());
            return Err(RetryableError {
                class,
                retry_after,
                error: anyhow!("{} returned HTTP {status}", self.name),
            });
        }

        match response.json::<ScrapeServicePayload>().await {
            Ok(payload) => {
                self.breaker.record_success();
                Ok(payload)
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(RetryableError::transient(anyhow!(
                    "{} payload decode failed: {e}",
                    self.name
                )))
            }
        }
    }
}
