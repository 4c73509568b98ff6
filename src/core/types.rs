use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Database identifier for an industry row.
pub type IndustryId = i64;

// ---------------------------------------------------------------------------
// Inbound wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub business_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    /// Caller-supplied overall deadline in milliseconds. Falls back to
    /// `classify.overall_timeout` when absent.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Scraper products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrapeStrategy {
    FastHttpClient,
    BrowserHeadersClient,
    ExternalHrequestsService,
    ExternalPlaywrightService,
}

impl ScrapeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStrategy::FastHttpClient => "fast_http",
            ScrapeStrategy::BrowserHeadersClient => "browser_headers",
            ScrapeStrategy::ExternalHrequestsService => "hrequests",
            ScrapeStrategy::ExternalPlaywrightService => "playwright",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedContent {
    pub url: String,
    pub title: String,
    pub plain_text: String,
    pub headings: Vec<String>,
    pub navigation: Vec<String>,
    pub products: Vec<String>,
    pub about_text: String,
    pub contact_text: String,
    pub language: String,
    pub quality_score: f64,
    pub word_count: usize,
    pub strategy_used: ScrapeStrategy,
    pub fetched_at: DateTime<Utc>,
    /// True when subpage content was merged into this record.
    #[serde(default)]
    pub merged: bool,
}

/// One entry of the scraper's attempt chain, kept for diagnostics and the
/// `DependencyFailure` cause chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeAttempt {
    pub strategy: ScrapeStrategy,
    pub duration_ms: u64,
    pub outcome: String,
}

/// Wire shape returned by the external hrequests/playwright scraping
/// services (`POST /scrape {url}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeServicePayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub headings: Vec<String>,
    #[serde(default)]
    pub plain_text: String,
    #[serde(default)]
    pub navigation: Vec<String>,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub about_text: String,
    #[serde(default)]
    pub contact_text: String,
    #[serde(default)]
    pub language: String,
}

// ---------------------------------------------------------------------------
// Keyword extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordSource {
    Homepage,
    Subpage,
    Merged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedKeyword {
    pub term: String,
    pub weight: f64,
    pub source: KeywordSource,
}

/// Keywords sorted by weight descending, unique on `term`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedKeywords {
    pub keywords: Vec<WeightedKeyword>,
}

impl ExtractedKeywords {
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn terms(&self) -> Vec<&str> {
        self.keywords.iter().map(|k| k.term.as_str()).collect()
    }

    pub fn weight_of(&self, term: &str) -> Option<f64> {
        self.keywords
            .iter()
            .find(|k| k.term == term)
            .map(|k| k.weight)
    }
}

// ---------------------------------------------------------------------------
// Classification strategies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    Keyword,
    Topic,
    CoOccurrence,
    Entity,
}

impl StrategyName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyName::Keyword => "keyword",
            StrategyName::Topic => "topic",
            StrategyName::CoOccurrence => "co_occurrence",
            StrategyName::Entity => "entity",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyResult {
    pub strategy: StrategyName,
    /// Industry scores normalized to [0, 1].
    pub candidate_industries: HashMap<IndustryId, f64>,
    pub primary_industry_id: Option<IndustryId>,
    pub confidence: f64,
    pub supporting_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryIndustry {
    pub industry_id: IndustryId,
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationFactor {
    pub factor: String,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Explanation {
    pub factors: Vec<ExplanationFactor>,
    pub summary_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlendedClassification {
    pub primary_industry_id: IndustryId,
    pub primary_industry_name: String,
    pub confidence: f64,
    pub secondary_industries: Vec<SecondaryIndustry>,
    pub strategy_results: Vec<StrategyResult>,
    pub explanation: Explanation,
}

// ---------------------------------------------------------------------------
// Code candidates
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum CodeType {
    #[serde(rename = "MCC")]
    Mcc,
    #[serde(rename = "SIC")]
    Sic,
    #[serde(rename = "NAICS")]
    Naics,
}

impl CodeType {
    pub const ALL: [CodeType; 3] = [CodeType::Mcc, CodeType::Sic, CodeType::Naics];

    pub fn as_str(&self) -> &'static str {
        match self {
            CodeType::Mcc => "MCC",
            CodeType::Sic => "SIC",
            CodeType::Naics => "NAICS",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CodeSourceKind {
    IndustryMatch,
    KeywordMatch,
    EmbeddingMatch,
    MlMatch,
    Crosswalk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeCandidate {
    pub code: String,
    pub code_type: CodeType,
    pub description: String,
    pub confidence: f64,
    pub sources: BTreeSet<CodeSourceKind>,
    #[serde(default)]
    pub industry_id: Option<IndustryId>,
    #[serde(default)]
    pub low_confidence: bool,
}

// ---------------------------------------------------------------------------
// Result envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub from_cache: bool,
    pub early_exit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraping_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_used: Option<String>,
    #[serde(default)]
    pub deadline_rescue: bool,
    #[serde(default)]
    pub ml_override: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ml_skipped_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub processing_time_ms: u64,
    /// Stage name → duration in milliseconds.
    pub stage_timings: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scrape_attempts: Vec<ScrapeAttempt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub request_id: String,
    pub classification: BlendedClassification,
    /// Per code system, up to three candidates ordered by confidence.
    pub codes: BTreeMap<CodeType, Vec<CodeCandidate>>,
    pub metadata: ResultMetadata,
    pub confidence_score: f64,
    pub cached_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Repository row shapes (read-only for the core)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndustryRecord {
    pub industry_id: IndustryId,
    pub name: String,
    pub aliases: Vec<String>,
    #[serde(default)]
    pub naics_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndustryKeyword {
    pub term: String,
    pub relevance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndustryTopic {
    pub topic: String,
    pub relevance: f64,
    /// Exponential moving average maintained out-of-band.
    pub historical_accuracy: f64,
}

/// Characteristic term pair or triple for the co-occurrence strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooccurrencePattern {
    pub terms: Vec<String>,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMapping {
    pub alias: String,
    pub entity_type: String,
    pub industry_id: IndustryId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeMetadata {
    pub code: String,
    pub code_type: CodeType,
    pub description: String,
    #[serde(default)]
    pub industry_id: Option<IndustryId>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Stored ordering priority; lower sorts first.
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrosswalkEntry {
    pub sic: Vec<String>,
    pub naics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingMatch {
    pub code: String,
    pub code_type: CodeType,
    pub description: String,
    pub similarity: f64,
    #[serde(default)]
    pub industry_id: Option<IndustryId>,
}

// ---------------------------------------------------------------------------
// Health / error envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_s: u64,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheHealthResponse {
    pub cache_enabled: bool,
    pub redis_enabled: bool,
    pub redis_connected: bool,
    pub in_memory_size: u64,
    pub healthy: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error_kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

// ---------------------------------------------------------------------------
// External embedding / ML service wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlClassifyRequest {
    pub business_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub scraped_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlCodeSuggestion {
    pub code: String,
    pub code_type: CodeType,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlClassifyResponse {
    pub primary_industry: String,
    pub confidence: f64,
    #[serde(default)]
    pub codes: Vec<MlCodeSuggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub vector: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_type_serializes_as_uppercase() {
        let json = serde_json::to_string(&CodeType::Mcc).unwrap();
        assert_eq!(json, "\"MCC\"");
        let back: CodeType = serde_json::from_str("\"NAICS\"").unwrap();
        assert_eq!(back, CodeType::Naics);
    }

    #[test]
    fn codes_map_uses_code_type_keys() {
        let mut codes: BTreeMap<CodeType, Vec<CodeCandidate>> = BTreeMap::new();
        codes.insert(CodeType::Mcc, vec![]);
        let json = serde_json::to_string(&codes).unwrap();
        assert!(json.contains("\"MCC\""));
    }

    #[test]
    fn classify_request_accepts_minimal_body() {
        let req: ClassifyRequest =
            serde_json::from_str(r#"{"business_name":"Acme Co"}"#).unwrap();
        assert_eq!(req.business_name, "Acme Co");
        assert!(req.website_url.is_none());
        assert!(req.deadline_ms.is_none());
    }
}
