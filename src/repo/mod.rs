pub mod seed;

use crate::core::types::*;
use anyhow::{anyhow, Result};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Read-only query surface the core issues against industry/code metadata.
///
/// Implementations are expected to bound each query by the configured
/// per-query timeout; [`TimedRepository`] provides that plus a bounded retry
/// for any backend.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_industry(&self, id: IndustryId) -> Result<Option<IndustryRecord>>;

    async fn list_industries(&self) -> Result<Vec<IndustryRecord>>;

    async fn search_keywords_by_industry(
        &self,
        industry_id: IndustryId,
    ) -> Result<Vec<IndustryKeyword>>;

    /// Batched reverse lookup: term → per-industry relevance, for every
    /// industry any of `terms` maps to.
    async fn industries_for_keywords(
        &self,
        terms: &[String],
    ) -> Result<HashMap<IndustryId, Vec<(String, f64)>>>;

    async fn get_idf(&self, term: &str) -> Result<Option<f64>>;

    async fn get_industry_topics(&self, industry_id: IndustryId) -> Result<Vec<IndustryTopic>>;

    async fn get_cooccurrence_patterns(
        &self,
        industry_id: IndustryId,
    ) -> Result<Vec<CooccurrencePattern>>;

    async fn get_entity_industries(&self) -> Result<Vec<EntityMapping>>;

    async fn codes_for_industry(
        &self,
        industry_id: IndustryId,
        code_type: CodeType,
    ) -> Result<Vec<CodeMetadata>>;

    /// Codes whose keyword lists overlap `terms` with match strength at or
    /// above `threshold`.
    async fn codes_for_keywords(
        &self,
        terms: &[String],
        code_type: CodeType,
        threshold: f64,
    ) -> Result<Vec<(CodeMetadata, f64)>>;

    async fn crosswalk(&self, code: &str, code_type: CodeType) -> Result<Option<CrosswalkEntry>>;

    async fn match_code_embeddings(
        &self,
        vector: &[f32],
        code_type: CodeType,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<EmbeddingMatch>>;

    async fn get_historical_accuracy(&self, industry_id: IndustryId) -> Result<Option<f64>>;
}

// ---------------------------------------------------------------------------
// Immutable snapshot store
// ---------------------------------------------------------------------------

/// One warm-loaded, immutable view of the metadata tables. Derived indexes
/// are built once at construction.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub industries: Vec<IndustryRecord>,
    pub keywords_by_industry: HashMap<IndustryId, Vec<IndustryKeyword>>,
    pub idf: HashMap<String, f64>,
    pub topics: HashMap<IndustryId, Vec<IndustryTopic>>,
    pub cooccurrence: HashMap<IndustryId, Vec<CooccurrencePattern>>,
    pub entities: Vec<EntityMapping>,
    pub codes: Vec<CodeMetadata>,
    pub crosswalks: HashMap<String, CrosswalkEntry>,
    pub code_vectors: Vec<CodeVector>,
    pub accuracy: HashMap<IndustryId, f64>,

    keyword_index: HashMap<String, Vec<(IndustryId, f64)>>,
    industries_by_id: HashMap<IndustryId, usize>,
}

#[derive(Debug, Clone)]
pub struct CodeVector {
    pub code: String,
    pub code_type: CodeType,
    pub description: String,
    pub industry_id: Option<IndustryId>,
    pub vector: Vec<f32>,
}

impl Snapshot {
    pub fn build(mut self) -> Self {
        self.keyword_index.clear();
        for (industry_id, keywords) in &self.keywords_by_industry {
            for kw in keywords {
                self.keyword_index
                    .entry(kw.term.clone())
                    .or_default()
                    .push((*industry_id, kw.relevance));
            }
        }
        self.industries_by_id = self
            .industries
            .iter()
            .enumerate()
            .map(|(i, rec)| (rec.industry_id, i))
            .collect();
        self
    }

    fn industry(&self, id: IndustryId) -> Option<&IndustryRecord> {
        self.industries_by_id.get(&id).map(|i| &self.industries[*i])
    }
}

/// In-process repository backed by an atomically swappable [`Snapshot`].
/// Reload is swap-and-publish; readers always see a consistent view.
pub struct StaticRepository {
    snapshot: ArcSwap<Snapshot>,
}

impl StaticRepository {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(snapshot.build()),
        }
    }

    /// Default seeded dataset used by the service wiring and tests.
    pub fn seeded() -> Self {
        Self::new(seed::seed_snapshot())
    }

    pub fn reload(&self, snapshot: Snapshot) {
        self.snapshot.store(Arc::new(snapshot.build()));
    }

    fn snap(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        na += (*x as f64) * (*x as f64);
        nb += (*y as f64) * (*y as f64);
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

#[async_trait]
impl Repository for StaticRepository {
    async fn get_industry(&self, id: IndustryId) -> Result<Option<IndustryRecord>> {
        Ok(self.snap().industry(id).cloned())
    }

    async fn list_industries(&self) -> Result<Vec<IndustryRecord>> {
        Ok(self.snap().industries.clone())
    }

    async fn search_keywords_by_industry(
        &self,
        industry_id: IndustryId,
    ) -> Result<Vec<IndustryKeyword>> {
        Ok(self
            .snap()
            .keywords_by_industry
            .get(&industry_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn industries_for_keywords(
        &self,
        terms: &[String],
    ) -> Result<HashMap<IndustryId, Vec<(String, f64)>>> {
        let snap = self.snap();
        let mut out: HashMap<IndustryId, Vec<(String, f64)>> = HashMap::new();
        for term in terms {
            if let Some(hits) = snap.keyword_index.get(term.as_str()) {
                for (industry_id, relevance) in hits {
                    out.entry(*industry_id)
                        .or_default()
                        .push((term.clone(), *relevance));
                }
            }
        }
        Ok(out)
    }

    async fn get_idf(&self, term: &str) -> Result<Option<f64>> {
        Ok(self.snap().idf.get(term).copied())
    }

    async fn get_industry_topics(&self, industry_id: IndustryId) -> Result<Vec<IndustryTopic>> {
        Ok(self
            .snap()
            .topics
            .get(&industry_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_cooccurrence_patterns(
        &self,
        industry_id: IndustryId,
    ) -> Result<Vec<CooccurrencePattern>> {
        Ok(self
            .snap()
            .cooccurrence
            .get(&industry_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_entity_industries(&self) -> Result<Vec<EntityMapping>> {
        Ok(self.snap().entities.clone())
    }

    async fn codes_for_industry(
        &self,
        industry_id: IndustryId,
        code_type: CodeType,
    ) -> Result<Vec<CodeMetadata>> {
        let snap = self.snap();
        let mut codes: Vec<CodeMetadata> = snap
            .codes
            .iter()
            .filter(|c| c.industry_id == Some(industry_id) && c.code_type == code_type)
            .cloned()
            .collect();
        codes.sort_by_key(|c| c.priority);
        Ok(codes)
    }

    async fn codes_for_keywords(
        &self,
        terms: &[String],
        code_type: CodeType,
        threshold: f64,
    ) -> Result<Vec<(CodeMetadata, f64)>> {
        let snap = self.snap();
        let mut out = Vec::new();
        for code in snap.codes.iter().filter(|c| c.code_type == code_type) {
            if code.keywords.is_empty() {
                continue;
            }
            let matched = code
                .keywords
                .iter()
                .filter(|k| terms.iter().any(|t| t == *k))
                .count();
            let strength = matched as f64 / code.keywords.len() as f64;
            if strength >= threshold {
                out.push((code.clone(), strength));
            }
        }
        out.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(out)
    }

    async fn crosswalk(&self, code: &str, code_type: CodeType) -> Result<Option<CrosswalkEntry>> {
        if code_type != CodeType::Mcc {
            return Ok(None);
        }
        Ok(self.snap().crosswalks.get(code).cloned())
    }

    async fn match_code_embeddings(
        &self,
        vector: &[f32],
        code_type: CodeType,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<EmbeddingMatch>> {
        let snap = self.snap();
        let mut matches: Vec<EmbeddingMatch> = snap
            .code_vectors
            .iter()
            .filter(|cv| cv.code_type == code_type)
            .filter_map(|cv| {
                let similarity = cosine_similarity(vector, &cv.vector);
                (similarity >= threshold).then(|| EmbeddingMatch {
                    code: cv.code.clone(),
                    code_type: cv.code_type,
                    description: cv.description.clone(),
                    similarity,
                    industry_id: cv.industry_id,
                })
            })
            .collect();
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn get_historical_accuracy(&self, industry_id: IndustryId) -> Result<Option<f64>> {
        Ok(self.snap().accuracy.get(&industry_id).copied())
    }
}

// ---------------------------------------------------------------------------
// Per-query timeout + bounded retry decorator
// ---------------------------------------------------------------------------

async fn retry_query<T, F, Fut>(timeout: Duration, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last: Option<anyhow::Error> = None;
    for _ in 0..2 {
        match tokio::time::timeout(timeout, f()).await {
            Ok(Ok(v)) => return Ok(v),
            Ok(Err(e)) => last = Some(e),
            Err(_) => last = Some(anyhow!("repository query timed out after {:?}", timeout)),
        }
    }
    Err(last.unwrap_or_else(|| anyhow!("repository query failed")))
}

/// Wraps any [`Repository`] with the per-query timeout and a single retry.
pub struct TimedRepository {
    inner: Arc<dyn Repository>,
    timeout: Duration,
}

impl TimedRepository {
    pub fn new(inner: Arc<dyn Repository>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl Repository for TimedRepository {
    async fn get_industry(&self, id: IndustryId) -> Result<Option<IndustryRecord>> {
        retry_query(self.timeout, || self.inner.get_industry(id)).await
    }

    async fn list_industries(&self) -> Result<Vec<IndustryRecord>> {
        retry_query(self.timeout, || self.inner.list_industries()).await
    }

    async fn search_keywords_by_industry(
        &self,
        industry_id: IndustryId,
    ) -> Result<Vec<IndustryKeyword>> {
        retry_query(self.timeout, || {
            self.inner.search_keywords_by_industry(industry_id)
        })
        .await
    }

    async fn industries_for_keywords(
        &self,
        terms: &[String],
    ) -> Result<HashMap<IndustryId, Vec<(String, f64)>>> {
        retry_query(self.timeout, || self.inner.industries_for_keywords(terms)).await
    }

    async fn get_idf(&self, term: &str) -> Result<Option<f64>> {
        retry_query(self.timeout, || self.inner.get_idf(term)).await
    }

    async fn get_industry_topics(&self, industry_id: IndustryId) -> Result<Vec<IndustryTopic>> {
        retry_query(self.timeout, || self.inner.get_industry_topics(industry_id)).await
    }

    async fn get_cooccurrence_patterns(
        &self,
        industry_id: IndustryId,
    ) -> Result<Vec<CooccurrencePattern>> {
        retry_query(self.timeout, || {
            self.inner.get_cooccurrence_patterns(industry_id)
        })
        .await
    }

    async fn get_entity_industries(&self) -> Result<Vec<EntityMapping>> {
        retry_query(self.timeout, || self.inner.get_entity_industries()).await
    }

    async fn codes_for_industry(
        &self,
        industry_id: IndustryId,
        code_type: CodeType,
    ) -> Result<Vec<CodeMetadata>> {
        retry_query(self.timeout, || {
            self.inner.codes_for_industry(industry_id, code_type)
        })
        .await
    }

    async fn codes_for_keywords(
        &self,
        terms: &[String],
        code_type: CodeType,
        threshold: f64,
    ) -> Result<Vec<(CodeMetadata, f64)>> {
        retry_query(self.timeout, || {
            self.inner.codes_for_keywords(terms, code_type, threshold)
        })
        .await
    }

    async fn crosswalk(&self, code: &str, code_type: CodeType) -> Result<Option<CrosswalkEntry>> {
        retry_query(self.timeout, || self.inner.crosswalk(code, code_type)).await
    }

    async fn match_code_embeddings(
        &self,
        vector: &[f32],
        code_type: CodeType,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<EmbeddingMatch>> {
        retry_query(self.timeout, || {
            self.inner
                .match_code_embeddings(vector, code_type, threshold, limit)
        })
        .await
    }

    async fn get_historical_accuracy(&self, industry_id: IndustryId) -> Result<Option<f64>> {
        retry_query(self.timeout, || {
            self.inner.get_historical_accuracy(industry_id)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_snapshot_resolves_industries() {
        let repo = StaticRepository::seeded();
        let industries = repo.list_industries().await.unwrap();
        assert!(industries.len() >= 8);
        let restaurants = industries
            .iter()
            .find(|i| i.name == "Restaurants")
            .expect("seed has Restaurants");
        let kws = repo
            .search_keywords_by_industry(restaurants.industry_id)
            .await
            .unwrap();
        assert!(kws.iter().any(|k| k.term == "pizza"));
    }

    #[tokio::test]
    async fn keyword_reverse_index_matches_forward_table() {
        let repo = StaticRepository::seeded();
        let hits = repo
            .industries_for_keywords(&["pizza".to_string()])
            .await
            .unwrap();
        assert!(!hits.is_empty());
        for (industry_id, terms) in hits {
            let forward = repo.search_keywords_by_industry(industry_id).await.unwrap();
            for (term, relevance) in terms {
                let fwd = forward.iter().find(|k| k.term == term).unwrap();
                assert_eq!(fwd.relevance, relevance);
            }
        }
    }

    #[tokio::test]
    async fn embedding_match_is_exact_for_own_vector() {
        let repo = StaticRepository::seeded();
        let vector = seed::fixture_vector("5812", CodeType::Mcc);
        let matches = repo
            .match_code_embeddings(&vector, CodeType::Mcc, 0.7, 10)
            .await
            .unwrap();
        assert_eq!(matches[0].code, "5812");
        assert!(matches[0].similarity > 0.999);
    }

    #[tokio::test]
    async fn crosswalk_only_applies_to_mcc() {
        let repo = StaticRepository::seeded();
        assert!(repo.crosswalk("5812", CodeType::Mcc).await.unwrap().is_some());
        assert!(repo.crosswalk("5812", CodeType::Sic).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn timed_repository_times_out_slow_backend() {
        struct SlowRepo;
        #[async_trait]
        impl Repository for SlowRepo {
            async fn get_industry(&self, _: IndustryId) -> Result<Option<IndustryRecord>> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(None)
            }
            async fn list_industries(&self) -> Result<Vec<IndustryRecord>> {
                Ok(vec![])
            }
            async fn search_keywords_by_industry(
                &self,
                _: IndustryId,
            ) -> Result<Vec<IndustryKeyword>> {
                Ok(vec![])
            }
            async fn industries_for_keywords(
                &self,
                _: &[String],
            ) -> Result<HashMap<IndustryId, Vec<(String, f64)>>> {
                Ok(HashMap::new())
            }
            async fn get_idf(&self, _: &str) -> Result<Option<f64>> {
                Ok(None)
            }
            async fn get_industry_topics(&self, _: IndustryId) -> Result<Vec<IndustryTopic>> {
                Ok(vec![])
            }
            async fn get_cooccurrence_patterns(
                &self,
                _: IndustryId,
            ) -> Result<Vec<CooccurrencePattern>> {
                Ok(vec![])
            }
            async fn get_entity_industries(&self) -> Result<Vec<EntityMapping>> {
                Ok(vec![])
            }
            async fn codes_for_industry(
                &self,
                _: IndustryId,
                _: CodeType,
            ) -> Result<Vec<CodeMetadata>> {
                Ok(vec![])
            }
            async fn codes_for_keywords(
                &self,
                _: &[String],
                _: CodeType,
                _: f64,
            ) -> Result<Vec<(CodeMetadata, f64)>> {
                Ok(vec![])
            }
            async fn crosswalk(&self, _: &str, _: CodeType) -> Result<Option<CrosswalkEntry>> {
                Ok(None)
            }
            async fn match_code_embeddings(
                &self,
                _: &[f32],
                _: CodeType,
                _: f64,
                _: usize,
            ) -> Result<Vec<EmbeddingMatch>> {
                Ok(vec![])
            }
            async fn get_historical_accuracy(&self, _: IndustryId) -> Result<Option<f64>> {
                Ok(None)
            }
        }

        let timed = TimedRepository::new(Arc::new(SlowRepo), Duration::from_millis(20));
        let err = timed.get_industry(1).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
