pub mod dns;
pub mod headers;
pub mod parse;
pub mod quality;
pub mod strategy;
pub mod urlnorm;

pub use urlnorm::normalize_website_url;

use crate::core::config::{
    BreakerConfig, DnsConfig, RateLimitConfig, ScrapeConfig, ServicesConfig,
};
use crate::core::deadline::Deadline;
use crate::core::types::{ScrapeAttempt, ScrapeServicePayload, ScrapeStrategy, ScrapedContent};
use crate::metrics;
use crate::reliability::{retry_with_policy, RetryPolicy};
use chrono::Utc;
use dns::{FallbackResolver, ResolvedHost};
use parse::ParsedPage;
use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::OnceLock;
use strategy::{HttpFetcher, HttpKind, ScrapeServiceClient};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Result of the tiered scrape: the best content found plus the full
/// attempt chain.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub content: ScrapedContent,
    pub attempts: Vec<ScrapeAttempt>,
}

/// All strategies failed; the attempt chain carries the causes.
#[derive(Debug, Clone)]
pub struct ScrapeFailure {
    pub attempts: Vec<ScrapeAttempt>,
}

impl ScrapeFailure {
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| format!("{}={}", a.strategy.as_str(), a.outcome))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn subpage_priority_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(about|company|services|products|solutions)")
            .unwrap_or_else(|_| Regex::new("$^").unwrap())
    })
}

struct FetchedPage {
    content: ScrapedContent,
    links: Vec<(Url, String)>,
}

/// Tiered website scraper: fast HTTP → browser-header HTTP → external
/// hrequests service → external playwright service, with DNS fallback,
/// per-strategy adaptive retry, and a single-depth subpage crawl when the
/// homepage lands in the mid-quality band.
pub struct ScraperPipeline {
    http: HttpFetcher,
    hrequests: Option<ScrapeServiceClient>,
    playwright: Option<ScrapeServiceClient>,
    resolver: FallbackResolver,
    config: ScrapeConfig,
    retry_policy: RetryPolicy,
}

impl ScraperPipeline {
    pub fn new(
        scrape: &ScrapeConfig,
        dns: &DnsConfig,
        services: &ServicesConfig,
        breaker: &BreakerConfig,
        rate_limit: &RateLimitConfig,
    ) -> anyhow::Result<Self> {
        let hrequests = services
            .hrequests_url
            .as_ref()
            .map(|url| {
                ScrapeServiceClient::new(
                    "hrequests",
                    url.clone(),
                    std::time::Duration::from_secs(scrape.hrequests_timeout_secs),
                    breaker,
                    rate_limit,
                )
            })
            .transpose()?;
        let playwright = services
            .playwright_url
            .as_ref()
            .map(|url| {
                ScrapeServiceClient::new(
                    "playwright",
                    url.clone(),
                    std::time::Duration::from_secs(scrape.playwright_timeout_secs),
                    breaker,
                    rate_limit,
                )
            })
            .transpose()?;

        Ok(Self {
            http: HttpFetcher::new(scrape)?,
            hrequests,
            playwright,
            resolver: FallbackResolver::new(dns),
            config: scrape.clone(),
            retry_policy: RetryPolicy::default(),
        })
    }

    pub fn breaker_states(&self) -> Vec<(&'static str, crate::reliability::BreakerState)> {
        let mut states = Vec::new();
        if let Some(c) = &self.hrequests {
            states.push(("hrequests", c.breaker().state()));
        }
        if let Some(c) = &self.playwright {
            states.push(("playwright", c.breaker().state()));
        }
        states
    }

    pub async fn scrape(
        &self,
        url: &Url,
        deadline: Deadline,
    ) -> Result<ScrapeOutcome, ScrapeFailure> {
        let mut attempts: Vec<ScrapeAttempt> = Vec::new();
        let mut best: Option<FetchedPage> = None;
        let mut early = false;

        let host = url.host_str().unwrap_or_default().to_string();
        let mut resolution = self.resolver.resolve(&host).await;
        // DNS-rebinding guard: a public hostname must not resolve into a
        // private range.
        if let Ok(resolved) = &resolution {
            if !self.config.allow_private_hosts
                && urlnorm::is_private_ip(std::net::IpAddr::V4(resolved.addr))
            {
                resolution = Err(dns::DnsError::Failed(
                    host.clone(),
                    "resolved to private address".to_string(),
                ));
            }
        }
        let pinned = match &resolution {
            Ok(ResolvedHost {
                addr,
                via_fallback: true,
            }) => Some(*addr),
            _ => None,
        };

        let strategies = [
            ScrapeStrategy::FastHttpClient,
            ScrapeStrategy::BrowserHeadersClient,
            ScrapeStrategy::ExternalHrequestsService,
            ScrapeStrategy::ExternalPlaywrightService,
        ];

        for strategy in strategies {
            if deadline.expired() {
                break;
            }
            let service = match strategy {
                ScrapeStrategy::ExternalHrequestsService => match &self.hrequests {
                    Some(c) => Some(c),
                    None => continue, // not configured: skipped silently
                },
                ScrapeStrategy::ExternalPlaywrightService => match &self.playwright {
                    Some(c) => Some(c),
                    None => continue,
                },
                _ => None,
            };

            let start = Instant::now();
            let fetched = match (strategy, service) {
                (ScrapeStrategy::FastHttpClient, _) | (ScrapeStrategy::BrowserHeadersClient, _)
                    if resolution.is_err() =>
                {
                    Err(format!(
                        "dns_failure: {}",
                        resolution.as_ref().err().map(|e| e.to_string()).unwrap_or_default()
                    ))
                }
                (ScrapeStrategy::FastHttpClient, _) => {
                    self.fetch_http(HttpKind::Fast, url, pinned, deadline, strategy)
                        .await
                }
                (ScrapeStrategy::BrowserHeadersClient, _) => {
                    self.fetch_http(HttpKind::Browser, url, pinned, deadline, strategy)
                        .await
                }
                (_, Some(client)) => self.fetch_service(client, url, deadline, strategy).await,
                (_, None) => continue,
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            match fetched {
                Ok(page) => {
                    if quality::is_early_success(&page.content, &self.config) {
                        attempts.push(record(strategy, duration_ms, "early_success"));
                        best = Some(page);
                        early = true;
                        break;
                    } else if quality::is_success(&page.content, &self.config) {
                        attempts.push(record(strategy, duration_ms, "success"));
                        let better = best
                            .as_ref()
                            .map(|b| page.content.quality_score > b.content.quality_score)
                            .unwrap_or(true);
                        if better {
                            best = Some(page);
                        }
                    } else {
                        debug!(
                            strategy = strategy.as_str(),
                            quality = page.content.quality_score,
                            words = page.content.word_count,
                            "strategy returned low-quality content"
                        );
                        attempts.push(record(strategy, duration_ms, "low_quality"));
                    }
                }
                Err(outcome) => {
                    warn!(strategy = strategy.as_str(), %outcome, url = %url, "scrape strategy failed");
                    attempts.push(ScrapeAttempt {
                        strategy,
                        duration_ms,
                        outcome,
                    });
                    metrics::record_scrape_attempt(strategy.as_str(), "error");
                }
            }
        }

        let Some(mut winner) = best else {
            return Err(ScrapeFailure { attempts });
        };

        if !early && quality::wants_subpages(&winner.content) {
            winner = self
                .crawl_subpages(winner, url, pinned, deadline)
                .await;
        }

        info!(
            url = %url,
            strategy = winner.content.strategy_used.as_str(),
            quality = winner.content.quality_score,
            words = winner.content.word_count,
            "scrape complete"
        );
        Ok(ScrapeOutcome {
            content: winner.content,
            attempts,
        })
    }

    async fn fetch_http(
        &self,
        kind: HttpKind,
        url: &Url,
        pinned: Option<Ipv4Addr>,
        deadline: Deadline,
        strategy: ScrapeStrategy,
    ) -> Result<FetchedPage, String> {
        let html = retry_with_policy(deadline, &self.retry_policy, |_| {
            self.http.fetch(kind, url, pinned, deadline)
        })
        .await
        .map_err(|e| e.error.to_string())?;
        let page = parse::parse_page(&html, url);
        Ok(page_to_fetched(page, url, strategy))
    }

    async fn fetch_service(
        &self,
        client: &ScrapeServiceClient,
        url: &Url,
        deadline: Deadline,
        strategy: ScrapeStrategy,
    ) -> Result<FetchedPage, String> {
        let payload = retry_with_policy(deadline, &self.retry_policy, |_| {
            client.scrape(url, deadline)
        })
        .await
        .map_err(|e| e.error.to_string())?;
        Ok(payload_to_fetched(payload, url, strategy))
    }

    /// Fetch up to `subpage_limit` same-origin priority links through the
    /// winning strategy and merge their content into the homepage record.
    async fn crawl_subpages(
        &self,
        base: FetchedPage,
        base_url: &Url,
        pinned: Option<Ipv4Addr>,
        deadline: Deadline,
    ) -> FetchedPage {
        let re = subpage_priority_regex();
        let candidates: Vec<Url> = base
            .links
            .iter()
            .filter(|(link, text)| {
                link.host_str() == base_url.host_str()
                    && link.path() != base_url.path()
                    && (re.is_match(text) || re.is_match(link.path()))
            })
            .map(|(link, _)| link.clone())
            .take(self.config.subpage_limit)
            .collect();

        if candidates.is_empty() {
            return base;
        }

        let strategy = base.content.strategy_used;
        let mut subpages: Vec<ScrapedContent> = Vec::new();
        for link in candidates {
            if deadline.expired() {
                break;
            }
            let fetched = match strategy {
                ScrapeStrategy::FastHttpClient => {
                    self.http
                        .fetch(HttpKind::Fast, &link, pinned, deadline)
                        .await
                        .ok()
                        .map(|html| page_to_fetched(parse::parse_page(&html, &link), &link, strategy))
                }
                ScrapeStrategy::BrowserHeadersClient => {
                    self.http
                        .fetch(HttpKind::Browser, &link, pinned, deadline)
                        .await
                        .ok()
                        .map(|html| page_to_fetched(parse::parse_page(&html, &link), &link, strategy))
                }
                ScrapeStrategy::ExternalHrequestsService => match &self.hrequests {
                    Some(c) => c
                        .scrape(&link, deadline)
                        .await
                        .ok()
                        .map(|p| payload_to_fetched(p, &link, strategy)),
                    None => None,
                },
                ScrapeStrategy::ExternalPlaywrightService => match &self.playwright {
                    Some(c) => c
                        .scrape(&link, deadline)
                        .await
                        .ok()
                        .map(|p| payload_to_fetched(p, &link, strategy)),
                    None => None,
                },
            };
            if let Some(page) = fetched {
                debug!(subpage = %page.content.url, "merged subpage content");
                subpages.push(page.content);
            }
        }

        if subpages.is_empty() {
            return base;
        }
        FetchedPage {
            content: merge_content(base.content, subpages),
            links: base.links,
        }
    }
}

fn record(strategy: ScrapeStrategy, duration_ms: u64, outcome: &'static str) -> ScrapeAttempt {
    metrics::record_scrape_attempt(strategy.as_str(), outcome);
    ScrapeAttempt {
        strategy,
        duration_ms,
        outcome: outcome.to_string(),
    }
}

fn page_to_fetched(page: ParsedPage, url: &Url, strategy: ScrapeStrategy) -> FetchedPage {
    let word_count = quality::word_count(&page.plain_text);
    let mut content = ScrapedContent {
        url: url.to_string(),
        title: page.title,
        plain_text: page.plain_text,
        headings: page.headings,
        navigation: page.navigation,
        products: page.products,
        about_text: page.about_text,
        contact_text: page.contact_text,
        language: page.language,
        quality_score: 0.0,
        word_count,
        strategy_used: strategy,
        fetched_at: Utc::now(),
        merged: false,
    };
    content.quality_score = quality::score_content(&content);
    FetchedPage {
        content,
        links: page.links,
    }
}

fn payload_to_fetched(
    payload: ScrapeServicePayload,
    url: &Url,
    strategy: ScrapeStrategy,
) -> FetchedPage {
    let word_count = quality::word_count(&payload.plain_text);
    let language = if payload.language.trim().is_empty() {
        "en".to_string()
    } else {
        payload.language
    };
    let mut content = ScrapedContent {
        url: url.to_string(),
        title: payload.title,
        plain_text: payload.plain_text,
        headings: payload.headings,
        navigation: payload.navigation,
        products: payload.products,
        about_text: payload.about_text,
        contact_text: payload.contact_text,
        language,
        quality_score: 0.0,
        word_count,
        strategy_used: strategy,
        fetched_at: Utc::now(),
        merged: false,
    };
    content.quality_score = quality::score_content(&content);
    FetchedPage {
        content,
        links: Vec::new(),
    }
}

/// Merge subpage content into the homepage record: text concatenated,
/// structural fields unioned, quality recomputed on the merged text.
fn merge_content(mut base: ScrapedContent, subpages: Vec<ScrapedContent>) -> ScrapedContent {
    for sub in subpages {
        if !sub.plain_text.is_empty() {
            base.plain_text.push('\n');
            base.plain_text.push_str(&sub.plain_text);
        }
        for h in sub.headings {
            if !base.headings.contains(&h) {
                base.headings.push(h);
            }
        }
        for n in sub.navigation {
            if !base.navigation.contains(&n) {
                base.navigation.push(n);
            }
        }
        for p in sub.products {
            if !base.products.contains(&p) {
                base.products.push(p);
            }
        }
        if base.about_text.trim().is_empty() && !sub.about_text.trim().is_empty() {
            base.about_text = sub.about_text;
        }
    }
    base.word_count = quality::word_count(&base.plain_text);
    base.quality_score = quality::score_content(&base);
    base.merged = true;
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(words: usize) -> ScrapedContent {
        ScrapedContent {
            url: "https://example.com/".to_string(),
            title: "Title".to_string(),
            plain_text: vec!["word"; words].join(" "),
            headings: vec!["A".to_string()],
            navigation: vec!["Home".to_string()],
            products: vec![],
            about_text: String::new(),
            contact_text: String::new(),
            language: "en".to_string(),
            quality_score: 0.4,
            word_count: words,
            strategy_used: ScrapeStrategy::FastHttpClient,
            fetched_at: Utc::now(),
            merged: false,
        }
    }

    #[test]
    fn merge_unions_and_recomputes() {
        let base = content(100);
        let mut sub = content(150);
        sub.headings = vec!["A".to_string(), "B".to_string()];
        sub.about_text = "About us".to_string();
        let merged = merge_content(base, vec![sub]);
        assert!(merged.merged);
        assert_eq!(merged.word_count, 250);
        assert_eq!(merged.headings, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(merged.about_text, "About us");
        assert!(merged.quality_score > 0.0);
    }

    #[test]
    fn priority_regex_matches_path_and_text() {
        let re = subpage_priority_regex();
        assert!(re.is_match("/about-us"));
        assert!(re.is_match("Our Services"));
        assert!(re.is_match("/company/history"));
        assert!(!re.is_match("/blog/post-1"));
    }

    #[test]
    fn failure_summary_names_strategies() {
        let failure = ScrapeFailure {
            attempts: vec![
                ScrapeAttempt {
                    strategy: ScrapeStrategy::FastHttpClient,
                    duration_ms: 12,
                    outcome: "HTTP 403".to_string(),
                },
                ScrapeAttempt {
                    strategy: ScrapeStrategy::BrowserHeadersClient,
                    duration_ms: 20,
                    outcome: "HTTP 403".to_string(),
                },
            ],
        };
        let summary = failure.summary();
        assert!(summary.contains("fast_http=HTTP 403"));
        assert!(summary.contains("browser_headers=HTTP 403"));
    }
}
