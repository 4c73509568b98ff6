use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Config — file-based loader (veriscope.json) with env-var fallback.
// Defaults live in the `default_*` helpers below and nowhere else.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub classify: ClassifyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub services: ServicesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyConfig {
    /// Overall deadline when the caller supplies none.
    #[serde(default = "default_overall_timeout_secs")]
    pub overall_timeout_secs: u64,
    /// Layer-1 calibrated confidence at which Layers 2/3 are skipped.
    #[serde(default = "default_early_exit_threshold")]
    pub early_exit_threshold: f64,
    /// Layer-1 confidence below which the embedding layer is invoked.
    #[serde(default = "default_layer2_threshold")]
    pub layer2_threshold: f64,
    /// Blended confidence below which the external ML layer is invoked.
    #[serde(default = "default_ml_invocation_threshold")]
    pub ml_invocation_threshold: f64,
    /// Admission-control ceiling; requests beyond it are rejected.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            overall_timeout_secs: default_overall_timeout_secs(),
            early_exit_threshold: default_early_exit_threshold(),
            layer2_threshold: default_layer2_threshold(),
            ml_invocation_threshold: default_ml_invocation_threshold(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

impl ClassifyConfig {
    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.overall_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub l1_enabled: bool,
    #[serde(default = "default_l1_size")]
    pub l1_size: u64,
    /// Distributed cache TTL.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// Redis connection URL; L2 is disabled when unset.
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_l2_read_timeout_secs")]
    pub l2_read_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_enabled: default_true(),
            l1_size: default_l1_size(),
            ttl_secs: default_cache_ttl_secs(),
            redis_url: None,
            l2_read_timeout_secs: default_l2_read_timeout_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn l2_read_timeout(&self) -> Duration {
        Duration::from_secs(self.l2_read_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    /// Max share of the overall deadline spent scraping.
    #[serde(default = "default_scrape_budget_secs")]
    pub overall_budget_secs: u64,
    /// Content validation floor.
    #[serde(default = "default_min_word_count")]
    pub min_word_count: usize,
    /// Quality at which later strategies are skipped.
    #[serde(default = "default_min_quality_for_early_success")]
    pub min_quality_for_early_success: f64,
    /// Word count companion to the early-success quality gate.
    #[serde(default = "default_early_success_word_count")]
    pub early_success_word_count: usize,
    #[serde(default = "default_fast_timeout_secs")]
    pub fast_timeout_secs: u64,
    #[serde(default = "default_hrequests_timeout_secs")]
    pub hrequests_timeout_secs: u64,
    #[serde(default = "default_playwright_timeout_secs")]
    pub playwright_timeout_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_subpage_limit")]
    pub subpage_limit: usize,
    /// Permits loopback/RFC1918 targets. Staging/test hook; never enable in
    /// production.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            overall_budget_secs: default_scrape_budget_secs(),
            min_word_count: default_min_word_count(),
            min_quality_for_early_success: default_min_quality_for_early_success(),
            early_success_word_count: default_early_success_word_count(),
            fast_timeout_secs: default_fast_timeout_secs(),
            hrequests_timeout_secs: default_hrequests_timeout_secs(),
            playwright_timeout_secs: default_playwright_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
            max_redirects: default_max_redirects(),
            subpage_limit: default_subpage_limit(),
            allow_private_hosts: false,
        }
    }
}

impl ScrapeConfig {
    pub fn overall_budget(&self) -> Duration {
        Duration::from_secs(self.overall_budget_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "default_breaker_failures")]
    pub consecutive_failures: u32,
    #[serde(default = "default_breaker_open_secs")]
    pub open_duration_secs: u64,
    /// Rolling window within which consecutive failures count.
    #[serde(default = "default_breaker_window_secs")]
    pub window_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            consecutive_failures: default_breaker_failures(),
            open_duration_secs: default_breaker_open_secs(),
            window_secs: default_breaker_window_secs(),
        }
    }
}

impl BreakerConfig {
    pub fn open_duration(&self) -> Duration {
        Duration::from_secs(self.open_duration_secs)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_per_second")]
    pub per_second: u32,
    #[serde(default = "default_rate_burst")]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: default_rate_per_second(),
            burst: default_rate_burst(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DnsConfig {
    #[serde(default = "default_dns_fallback_servers")]
    pub fallback_servers: Vec<Ipv4Addr>,
    #[serde(default = "default_dns_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            fallback_servers: default_dns_fallback_servers(),
            timeout_secs: default_dns_timeout_secs(),
        }
    }
}

impl DnsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    /// Embedding service base URL (`POST /embed`). Unset disables Layer 2.
    #[serde(default)]
    pub embedding_url: Option<String>,
    /// External ML classifier base URL (`POST /classify`). Unset disables Layer 3.
    #[serde(default)]
    pub ml_url: Option<String>,
    /// Hrequests scraping microservice URL. Unset skips that strategy.
    #[serde(default)]
    pub hrequests_url: Option<String>,
    /// Playwright scraping microservice URL. Unset skips that strategy.
    #[serde(default)]
    pub playwright_url: Option<String>,
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,
    #[serde(default = "default_ml_timeout_secs")]
    pub ml_timeout_secs: u64,
    #[serde(default = "default_repo_query_timeout_secs")]
    pub repository_query_timeout_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            embedding_url: None,
            ml_url: None,
            hrequests_url: None,
            playwright_url: None,
            embed_timeout_secs: default_embed_timeout_secs(),
            ml_timeout_secs: default_ml_timeout_secs(),
            repository_query_timeout_secs: default_repo_query_timeout_secs(),
        }
    }
}

impl ServicesConfig {
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs)
    }

    pub fn ml_timeout(&self) -> Duration {
        Duration::from_secs(self.ml_timeout_secs)
    }

    pub fn repository_query_timeout(&self) -> Duration {
        Duration::from_secs(self.repository_query_timeout_secs)
    }
}

fn default_port() -> u16 {
    8080
}
fn default_overall_timeout_secs() -> u64 {
    60
}
fn default_early_exit_threshold() -> f64 {
    0.85
}
fn default_layer2_threshold() -> f64 {
    0.80
}
fn default_ml_invocation_threshold() -> f64 {
    0.70
}
fn default_max_concurrent_requests() -> usize {
    200
}
fn default_true() -> bool {
    true
}
fn default_l1_size() -> u64 {
    10_000
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_l2_read_timeout_secs() -> u64 {
    2
}
fn default_scrape_budget_secs() -> u64 {
    35
}
fn default_min_word_count() -> usize {
    50
}
fn default_min_quality_for_early_success() -> f64 {
    0.70
}
fn default_early_success_word_count() -> usize {
    150
}
fn default_fast_timeout_secs() -> u64 {
    8
}
fn default_hrequests_timeout_secs() -> u64 {
    15
}
fn default_playwright_timeout_secs() -> u64 {
    25
}
fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}
fn default_max_redirects() -> usize {
    2
}
fn default_subpage_limit() -> usize {
    3
}
fn default_breaker_failures() -> u32 {
    5
}
fn default_breaker_open_secs() -> u64 {
    30
}
fn default_breaker_window_secs() -> u64 {
    60
}
fn default_rate_per_second() -> u32 {
    20
}
fn default_rate_burst() -> u32 {
    40
}
fn default_dns_fallback_servers() -> Vec<Ipv4Addr> {
    vec![
        Ipv4Addr::new(8, 8, 8, 8),
        Ipv4Addr::new(1, 1, 1, 1),
        Ipv4Addr::new(8, 8, 4, 4),
    ]
}
fn default_dns_timeout_secs() -> u64 {
    2
}
fn default_embed_timeout_secs() -> u64 {
    5
}
fn default_ml_timeout_secs() -> u64 {
    12
}
fn default_repo_query_timeout_secs() -> u64 {
    1
}

/// Load `veriscope.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `VERISCOPE_CONFIG` env var path
/// 2. `./veriscope.json`
/// 3. `../veriscope.json`
///
/// Missing file → defaults. Parse error → log a warning, use defaults.
/// Service URLs and the redis URL can always be overridden by env vars.
pub fn load_config() -> Config {
    let mut candidates = vec![
        std::path::PathBuf::from("veriscope.json"),
        std::path::PathBuf::from("../veriscope.json"),
    ];
    if let Ok(env_path) = std::env::var("VERISCOPE_CONFIG") {
        candidates.insert(0, std::path::PathBuf::from(env_path));
    }

    let mut config = Config::default();
    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Config>(&contents) {
                Ok(cfg) => {
                    tracing::info!("veriscope.json loaded from {}", path.display());
                    config = cfg;
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        "veriscope.json parse error at {}: {} — using defaults",
                        path.display(),
                        e
                    );
                    break;
                }
            },
            Err(_) => continue,
        }
    }

    apply_env_overrides(&mut config);
    config
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn apply_env_overrides(config: &mut Config) {
    if let Some(v) = env_nonempty("EMBEDDING_SERVICE_URL") {
        config.services.embedding_url = Some(v);
    }
    if let Some(v) = env_nonempty("ML_SERVICE_URL") {
        config.services.ml_url = Some(v);
    }
    if let Some(v) = env_nonempty("HREQUESTS_SERVICE_URL") {
        config.services.hrequests_url = Some(v);
    }
    if let Some(v) = env_nonempty("PLAYWRIGHT_SERVICE_URL") {
        config.services.playwright_url = Some(v);
    }
    if let Some(v) = env_nonempty("REDIS_URL") {
        config.cache.redis_url = Some(v);
    }
    if let Some(p) = env_nonempty("VERISCOPE_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = p;
    }
    if let Some(n) = env_nonempty("VERISCOPE_OVERALL_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        config.classify.overall_timeout_secs = n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_enumerated_table() {
        let cfg = Config::default();
        assert_eq!(cfg.classify.overall_timeout_secs, 60);
        assert_eq!(cfg.classify.early_exit_threshold, 0.85);
        assert_eq!(cfg.classify.layer2_threshold, 0.80);
        assert_eq!(cfg.classify.ml_invocation_threshold, 0.70);
        assert_eq!(cfg.cache.ttl_secs, 300);
        assert_eq!(cfg.cache.l1_size, 10_000);
        assert_eq!(cfg.scrape.overall_budget_secs, 35);
        assert_eq!(cfg.scrape.min_word_count, 50);
        assert_eq!(cfg.scrape.min_quality_for_early_success, 0.70);
        assert_eq!(cfg.breaker.consecutive_failures, 5);
        assert_eq!(cfg.breaker.open_duration_secs, 30);
        assert_eq!(cfg.rate_limit.burst, 40);
        assert_eq!(
            cfg.dns.fallback_servers,
            vec![
                Ipv4Addr::new(8, 8, 8, 8),
                Ipv4Addr::new(1, 1, 1, 1),
                Ipv4Addr::new(8, 8, 4, 4),
            ]
        );
    }

    #[test]
    fn partial_file_keeps_defaults_elsewhere() {
        let cfg: Config =
            serde_json::from_str(r#"{"classify":{"early_exit_threshold":0.9}}"#).unwrap();
        assert_eq!(cfg.classify.early_exit_threshold, 0.9);
        assert_eq!(cfg.classify.overall_timeout_secs, 60);
        assert_eq!(cfg.cache.l1_size, 10_000);
    }
}
