use crate::cache::ClassificationCache;
use crate::classify::MultiStrategyClassifier;
use crate::codes::CodeGenerator;
use crate::core::config::Config;
use crate::embedding::EmbeddingLayer;
use crate::extract::KeywordExtractor;
use crate::metrics;
use crate::ml::MlClient;
use crate::reliability::InFlightRegistry;
use crate::repo::{Repository, TimedRepository};
use crate::scraping::ScraperPipeline;
use std::sync::Arc;
use tokio::time::Instant;

/// Process-wide state: configuration, the repository, both cache tiers,
/// the pipeline components, and the concurrency singletons. Constructed
/// once at startup and shared behind an `Arc`.
pub struct AppState {
    pub config: Arc<Config>,
    pub repository: Arc<dyn Repository>,
    pub cache: ClassificationCache,
    pub inflight: Arc<InFlightRegistry>,
    pub admission: Arc<tokio::sync::Semaphore>,
    pub scraper: ScraperPipeline,
    pub extractor: KeywordExtractor,
    pub classifier: MultiStrategyClassifier,
    pub embedding: Option<EmbeddingLayer>,
    pub ml: Option<MlClient>,
    pub codes: CodeGenerator,
    pub started_at: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("embedding_enabled", &self.embedding.is_some())
            .field("ml_enabled", &self.ml.is_some())
            .finish()
    }
}

impl AppState {
    pub async fn new(config: Config, backend: Arc<dyn Repository>) -> anyhow::Result<Self> {
        let repository: Arc<dyn Repository> = Arc::new(TimedRepository::new(
            backend,
            config.services.repository_query_timeout(),
        ));

        let cache = ClassificationCache::new(&config.cache).await;
        let scraper = ScraperPipeline::new(
            &config.scrape,
            &config.dns,
            &config.services,
            &config.breaker,
            &config.rate_limit,
        )?;
        let embedding = EmbeddingLayer::new(
            &config.services,
            Arc::clone(&repository),
            &config.breaker,
            &config.rate_limit,
        )?;
        let ml = MlClient::new(&config.services, &config.breaker, &config.rate_limit)?;

        Ok(Self {
            admission: Arc::new(tokio::sync::Semaphore::new(
                config.classify.max_concurrent_requests,
            )),
            inflight: Arc::new(InFlightRegistry::new()),
            extractor: KeywordExtractor::new(Arc::clone(&repository)),
            classifier: MultiStrategyClassifier::new(Arc::clone(&repository)),
            codes: CodeGenerator::new(Arc::clone(&repository)),
            config: Arc::new(config),
            repository,
            cache,
            scraper,
            embedding,
            ml,
            started_at: Instant::now(),
        })
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Export the current breaker states as gauges.
    pub fn publish_breaker_metrics(&self) {
        if let Some(ml) = &self.ml {
            metrics::record_breaker_state("ml", ml.breaker().state().as_gauge());
        }
        if let Some(embedding) = &self.embedding {
            metrics::record_breaker_state("embedding", embedding.breaker().state().as_gauge());
        }
        for (service, state) in self.scraper.breaker_states() {
            metrics::record_breaker_state(service, state.as_gauge());
        }
    }
}
