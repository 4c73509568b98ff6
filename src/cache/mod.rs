pub mod fingerprint;

pub use fingerprint::fingerprint;

use crate::core::config::CacheConfig;
use crate::core::types::ClassificationResult;
use chrono::Utc;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    L1,
    L2,
}

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::L1 => "l1",
            CacheTier::L2 => "l2",
        }
    }
}

/// A served cache read. `result.metadata.from_cache` is already flipped to
/// `true` on this copy; the stored copy keeps its original flag.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub result: ClassificationResult,
    pub tier: CacheTier,
    /// Entry is within TTL but older than TTL/2: serve it and revalidate in
    /// the background.
    pub needs_refresh: bool,
}

#[derive(Debug, Clone)]
pub struct CacheHealth {
    pub cache_enabled: bool,
    pub redis_enabled: bool,
    pub redis_connected: bool,
    pub in_memory_size: u64,
}

impl CacheHealth {
    /// `l1_enabled AND (l2_connected OR l1_has_entries)`. The parentheses
    /// are load-bearing; see the regression test below.
    pub fn healthy(&self) -> bool {
        self.cache_enabled && (self.redis_connected || self.in_memory_size > 0)
    }
}

struct L2Store {
    conn: redis::aio::ConnectionManager,
    connected: AtomicBool,
}

/// Two-tier fingerprint cache: in-process moka LRU in front of a
/// redis-compatible distributed store. Failures are never cached.
pub struct ClassificationCache {
    l1: Option<moka::future::Cache<String, ClassificationResult>>,
    l2: Option<L2Store>,
    ttl: Duration,
    l2_read_timeout: Duration,
}

impl ClassificationCache {
    pub async fn new(config: &CacheConfig) -> Self {
        let l1 = config.l1_enabled.then(|| {
            moka::future::Cache::builder()
                .max_capacity(config.l1_size)
                .time_to_live(config.ttl())
                .build()
        });

        let l2 = match &config.redis_url {
            Some(url) => match redis::Client::open(url.as_str()) {
                Ok(client) => match redis::aio::ConnectionManager::new(client).await {
                    Ok(conn) => {
                        info!("distributed cache connected");
                        Some(L2Store {
                            conn,
                            connected: AtomicBool::new(true),
                        })
                    }
                    Err(e) => {
                        warn!("distributed cache unavailable: {e} — continuing with L1 only");
                        None
                    }
                },
                Err(e) => {
                    warn!("invalid redis URL: {e} — continuing with L1 only");
                    None
                }
            },
            None => None,
        };

        Self {
            l1,
            l2,
            ttl: config.ttl(),
            l2_read_timeout: config.l2_read_timeout(),
        }
    }

    /// In-memory-only cache for tests and redis-less deployments.
    pub async fn memory_only(config: &CacheConfig) -> Self {
        let mut cfg = config.clone();
        cfg.redis_url = None;
        Self::new(&cfg).await
    }

    pub async fn get(&self, fp: &str) -> Option<CacheHit> {
        if let Some(l1) = &self.l1 {
            if let Some(stored) = l1.get(fp).await {
                return Some(self.serve(stored, CacheTier::L1));
            }
        }

        let stored = self.l2_get(fp).await?;
        if let Some(l1) = &self.l1 {
            l1.insert(fp.to_string(), stored.clone()).await;
        }
        Some(self.serve(stored, CacheTier::L2))
    }

    /// Store a successful classification. The stored copy keeps the flags it
    /// carries; subsequent reads flip `from_cache` on the served copy only.
    pub async fn store(&self, fp: &str, result: &ClassificationResult) {
        if let Some(l1) = &self.l1 {
            l1.insert(fp.to_string(), result.clone()).await;
        }
        if let Some(l2) = &self.l2 {
            let payload = match serde_json::to_string(result) {
                Ok(p) => p,
                Err(e) => {
                    warn!("cache payload serialization failed: {e}");
                    return;
                }
            };
            let mut conn = l2.conn.clone();
            let outcome: redis::RedisResult<()> = conn
                .set_ex(Self::key(fp), payload, self.ttl.as_secs())
                .await;
            match outcome {
                Ok(()) => l2.connected.store(true, Ordering::Relaxed),
                Err(e) => {
                    l2.connected.store(false, Ordering::Relaxed);
                    warn!("distributed cache write failed: {e}");
                }
            }
        }
    }

    pub async fn health(&self) -> CacheHealth {
        let in_memory_size = match &self.l1 {
            Some(l1) => {
                l1.run_pending_tasks().await;
                l1.entry_count()
            }
            None => 0,
        };
        CacheHealth {
            cache_enabled: self.l1.is_some(),
            redis_enabled: self.l2.is_some(),
            redis_connected: self
                .l2
                .as_ref()
                .map(|l2| l2.connected.load(Ordering::Relaxed))
                .unwrap_or(false),
            in_memory_size,
        }
    }

    fn key(fp: &str) -> String {
        format!("veriscope:classify:{fp}")
    }

    fn serve(&self, stored: ClassificationResult, tier: CacheTier) -> CacheHit {
        let age = Utc::now()
            .signed_duration_since(stored.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        let needs_refresh = age > self.ttl / 2 && age < self.ttl;
        let mut result = stored;
        result.metadata.from_cache = true;
        CacheHit {
            result,
            tier,
            needs_refresh,
        }
    }

    async fn l2_get(&self, fp: &str) -> Option<ClassificationResult> {
        let l2 = self.l2.as_ref()?;
        let mut conn = l2.conn.clone();
        let read = tokio::time::timeout(self.l2_read_timeout, async move {
            let payload: Option<String> = conn.get(Self::key(fp)).await?;
            redis::RedisResult::Ok(payload)
        })
        .await;

        match read {
            Ok(Ok(payload)) => {
                l2.connected.store(true, Ordering::Relaxed);
                let payload = payload?;
                match serde_json::from_str(&payload) {
                    Ok(result) => Some(result),
                    Err(e) => {
                        warn!("discarding undecodable cache entry: {e}");
                        None
                    }
                }
            }
            Ok(Err(e)) => {
                l2.connected.store(false, Ordering::Relaxed);
                warn!("distributed cache read failed: {e}");
                None
            }
            Err(_) => {
                warn!("distributed cache read timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::*;
    use std::collections::BTreeMap;

    fn result(request_id: &str) -> ClassificationResult {
        ClassificationResult {
            request_id: request_id.to_string(),
            classification: BlendedClassification {
                primary_industry_id: 1,
                primary_industry_name: "Restaurants".to_string(),
                confidence: 0.8,
                secondary_industries: vec![],
                strategy_results: vec![],
                explanation: Explanation::default(),
            },
            codes: BTreeMap::new(),
            metadata: ResultMetadata::default(),
            confidence_score: 0.8,
            cached_at: Utc::now(),
        }
    }

    fn config() -> CacheConfig {
        CacheConfig::default()
    }

    #[tokio::test]
    async fn served_copy_flips_from_cache_but_store_keeps_original() {
        let cache = ClassificationCache::memory_only(&config()).await;
        let stored = result("r1");
        assert!(!stored.metadata.from_cache);
        cache.store("fp", &stored).await;

        let first = cache.get("fp").await.unwrap();
        assert!(first.result.metadata.from_cache);
        assert_eq!(first.tier, CacheTier::L1);

        // Repeated reads see the flag again: the stored copy was not mutated.
        let second = cache.get("fp").await.unwrap();
        assert!(second.result.metadata.from_cache);
    }

    #[tokio::test]
    async fn miss_returns_none() {
        let cache = ClassificationCache::memory_only(&config()).await;
        assert!(cache.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn stale_entry_requests_refresh() {
        let cache = ClassificationCache::memory_only(&config()).await;
        let mut stored = result("r1");
        stored.cached_at = Utc::now() - chrono::Duration::seconds(200);
        cache.store("fp", &stored).await;
        let hit = cache.get("fp").await.unwrap();
        assert!(hit.needs_refresh);

        let mut fresh = result("r2");
        fresh.cached_at = Utc::now();
        cache.store("fp2", &fresh).await;
        let hit = cache.get("fp2").await.unwrap();
        assert!(!hit.needs_refresh);
    }

    #[tokio::test]
    async fn health_operator_precedence() {
        // enabled, no redis, empty L1 → unhealthy
        let cache = ClassificationCache::memory_only(&config()).await;
        let health = cache.health().await;
        assert!(!health.healthy());

        // enabled, no redis, one entry → healthy
        cache.store("fp", &result("r1")).await;
        let health = cache.health().await;
        assert!(health.healthy());

        // disabled L1 → never healthy regardless of entries
        let mut cfg = config();
        cfg.l1_enabled = false;
        let disabled = ClassificationCache::memory_only(&cfg).await;
        let health = disabled.health().await;
        assert!(!health.healthy());
    }
}
