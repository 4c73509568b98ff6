use crate::core::config::{BreakerConfig, RateLimitConfig, ServicesConfig};
use crate::core::deadline::Deadline;
use crate::core::types::*;
use crate::reliability::{
    classify_status, Admission, CircuitBreaker, CircuitBreakerConfig, ServiceRateLimiter,
};
use crate::repo::Repository;
use anyhow::{anyhow, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Expected embedding dimensionality.
const EMBEDDING_DIM: usize = 384;
/// Similarity floor for the per-code-type index queries.
const MATCH_THRESHOLD: f64 = 0.7;
/// Matches returned per code type.
const MATCH_LIMIT: usize = 10;
/// The top match must be at least this similar to cast an industry vote.
const VOTE_THRESHOLD: f64 = 0.80;
/// Tokens of plain text included in the compact representation.
const MAX_TEXT_TOKENS: usize = 512;

/// Layer 2 verdict: an optional industry vote plus the code candidates the
/// similarity search produced.
#[derive(Debug, Clone)]
pub struct EmbeddingVerdict {
    pub vote: Option<EmbeddingVote>,
    pub code_candidates: Vec<CodeCandidate>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingVote {
    pub industry_id: IndustryId,
    pub confidence: f64,
    /// Number of matches that map to the voted industry; used by the
    /// Layer-1/Layer-2 keyword-count tiebreak.
    pub supporting_matches: usize,
}

/// Layer 2: embeds a compact page representation through the external embed
/// service and ranks codes by cosine similarity against the persisted
/// vector index.
pub struct EmbeddingLayer {
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
    repo: Arc<dyn Repository>,
    breaker: CircuitBreaker,
    limiter: ServiceRateLimiter,
}

impl EmbeddingLayer {
    pub fn new(
        services: &ServicesConfig,
        repo: Arc<dyn Repository>,
        breaker_config: &BreakerConfig,
        rate_config: &RateLimitConfig,
    ) -> Result<Option<Self>> {
        let Some(endpoint) = services.embedding_url.clone() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .build()
            .map_err(|e| anyhow!("embedding client build failed: {e}"))?;
        Ok(Some(Self {
            endpoint,
            client,
            timeout: services.embed_timeout(),
            repo,
            breaker: CircuitBreaker::new(
                "embedding",
                CircuitBreakerConfig {
                    failure_threshold: breaker_config.consecutive_failures,
                    open_duration: breaker_config.open_duration(),
                    window: breaker_config.window(),
                },
            ),
            limiter: ServiceRateLimiter::new("embedding", rate_config),
        }))
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// `title ∥ first paragraph of about ∥ first 512 tokens of plain text`.
    pub fn compact_representation(content: &ScrapedContent) -> String {
        let first_about_paragraph = content
            .about_text
            .split('\n')
            .find(|p| !p.trim().is_empty())
            .unwrap_or("")
            .trim();
        let text: String = content
            .plain_text
            .split_whitespace()
            .take(MAX_TEXT_TOKENS)
            .collect::<Vec<_>>()
            .join(" ");
        [content.title.trim(), first_about_paragraph, &text]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" \n")
    }

    pub async fn run(
        &self,
        content: &ScrapedContent,
        deadline: Deadline,
    ) -> Result<EmbeddingVerdict> {
        let text = Self::compact_representation(content);
        if text.trim().is_empty() {
            return Ok(EmbeddingVerdict {
                vote: None,
                code_candidates: Vec::new(),
            });
        }

        let vector = self.embed(&text, deadline).await?;

        // One similarity query per code type, in parallel.
        let queries = CodeType::ALL.map(|code_type| {
            let vector = vector.clone();
            async move {
                self.repo
                    .match_code_embeddings(&vector, code_type, MATCH_THRESHOLD, MATCH_LIMIT)
                    .await
            }
        });
        let mut all_matches: Vec<EmbeddingMatch> = Vec::new();
        for outcome in futures::future::join_all(queries).await {
            match outcome {
                Ok(matches) => all_matches.extend(matches),
                Err(e) => warn!(error = %e, "code embedding query failed"),
            }
        }
        all_matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let vote = all_matches
            .first()
            .filter(|top| top.similarity >= VOTE_THRESHOLD)
            .and_then(|top| {
                top.industry_id.map(|industry_id| {
                    let supporting_matches = all_matches
                        .iter()
                        .filter(|m| m.industry_id == Some(industry_id))
                        .count();
                    EmbeddingVote {
                        industry_id,
                        confidence: top.similarity,
                        supporting_matches,
                    }
                })
            });

        let code_candidates = all_matches
            .into_iter()
            .map(|m| CodeCandidate {
                code: m.code,
                code_type: m.code_type,
                description: m.description,
                confidence: m.similarity.min(0.95),
                sources: BTreeSet::from([CodeSourceKind::EmbeddingMatch]),
                industry_id: m.industry_id,
                low_confidence: false,
            })
            .collect();

        debug!(vote = ?vote, "embedding layer complete");
        Ok(EmbeddingVerdict {
            vote,
            code_candidates,
        })
    }

    async fn embed(&self, text: &str, deadline: Deadline) -> Result<Vec<f32>> {
        match self.breaker.admit() {
            Admission::Reject => return Err(anyhow!("embedding circuit open")),
            Admission::Allow | Admission::Probe => {}
        }
        self.limiter
            .acquire(deadline)
            .await
            .map_err(|e| anyhow!("embedding rate limited: {e}"))?;

        let timeout = deadline.clamp(self.timeout);
        if timeout.is_zero() {
            return Err(anyhow!("deadline exhausted before embed call"));
        }

        let outcome = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&EmbedRequest {
                text: text.to_string(),
            })
            .send()
            .await;

        let response = match outcome {
            Ok(r) => r,
            Err(e) => {
                self.breaker.record_failure();
                return Err(anyhow!("embed request failed: {e}"));
            }
        };
        let status = response.status().as_u16();
        if let Some(class) = classify_status(status) {
            if class == crate::reliability::RetryClass::Transient {
                self.breaker.record_failure();
            }
            return Err(anyhow!("embed service returned HTTP {status}"));
        }

        let parsed: EmbedResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                self.breaker.record_failure();
                return Err(anyhow!("embed payload decode failed: {e}"));
            }
        };
        if parsed.vector.len() != EMBEDDING_DIM {
            self.breaker.record_failure();
            return Err(anyhow!(
                "embed service returned {} dims, expected {EMBEDDING_DIM}",
                parsed.vector.len()
            ));
        }
        self.breaker.record_success();
        Ok(parsed.vector)
    }
}

/// Blend the Layer 1 and Layer 2 votes: the higher-confidence side wins
/// unless the other side's supporting-keyword count leads by ≥ 15%.
pub fn blend_layers(
    layer1_confidence: f64,
    layer1_supporting: usize,
    vote: &EmbeddingVote,
) -> Layer2Decision {
    let l1 = layer1_supporting as f64;
    let l2 = vote.supporting_matches as f64;
    let larger = l1.max(l2).max(1.0);

    if vote.confidence > layer1_confidence {
        // Layer 1 is the lower-confidence side; it can still hold the win
        // on supporting-keyword volume.
        if l1 >= l2 + 0.15 * larger {
            Layer2Decision::KeepLayer1
        } else {
            Layer2Decision::AdoptLayer2
        }
    } else if l2 >= l1 + 0.15 * larger {
        Layer2Decision::AdoptLayer2
    } else {
        Layer2Decision::KeepLayer1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer2Decision {
    KeepLayer1,
    AdoptLayer2,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn content(title: &str, about: &str, text: &str) -> ScrapedContent {
        ScrapedContent {
            url: "https://example.com/".to_string(),
            title: title.to_string(),
            plain_text: text.to_string(),
            headings: vec![],
            navigation: vec![],
            products: vec![],
            about_text: about.to_string(),
            contact_text: String::new(),
            language: "en".to_string(),
            quality_score: 0.5,
            word_count: text.split_whitespace().count(),
            strategy_used: ScrapeStrategy::FastHttpClient,
            fetched_at: Utc::now(),
            merged: false,
        }
    }

    #[test]
    fn compact_representation_orders_parts_and_caps_tokens() {
        let long_text = vec!["tok"; 600].join(" ");
        let c = content("Title Here", "About paragraph.\nSecond.", &long_text);
        let repr = EmbeddingLayer::compact_representation(&c);
        assert!(repr.starts_with("Title Here"));
        assert!(repr.contains("About paragraph."));
        assert!(!repr.contains("Second."));
        let tokens = repr.split_whitespace().count();
        assert!(tokens <= 2 + 2 + MAX_TEXT_TOKENS);
    }

    #[test]
    fn higher_confidence_side_wins_by_default() {
        let vote = EmbeddingVote {
            industry_id: 1,
            confidence: 0.9,
            supporting_matches: 3,
        };
        assert_eq!(blend_layers(0.6, 3, &vote), Layer2Decision::AdoptLayer2);

        let weak_vote = EmbeddingVote {
            industry_id: 1,
            confidence: 0.5,
            supporting_matches: 3,
        };
        assert_eq!(blend_layers(0.8, 3, &weak_vote), Layer2Decision::KeepLayer1);
    }

    #[test]
    fn supporting_volume_overrides_confidence() {
        // Layer 1 has far more supporting keywords: it survives a stronger
        // Layer 2 vote.
        let vote = EmbeddingVote {
            industry_id: 1,
            confidence: 0.9,
            supporting_matches: 2,
        };
        assert_eq!(blend_layers(0.7, 12, &vote), Layer2Decision::KeepLayer1);

        // And vice versa.
        let vote = EmbeddingVote {
            industry_id: 1,
            confidence: 0.6,
            supporting_matches: 12,
        };
        assert_eq!(blend_layers(0.7, 2, &vote), Layer2Decision::AdoptLayer2);
    }
}
