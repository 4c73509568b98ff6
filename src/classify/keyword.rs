use super::{ClassifierStrategy, StrategyContext};
use crate::core::types::{IndustryId, StrategyName, StrategyResult};
use crate::repo::Repository;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Scores each industry by the fraction of extracted keyword mass its
/// `industry_keywords` rows explain: `Σ weight(t)·relevance(t, I) / Σ weight(t)`.
pub struct KeywordStrategy {
    repo: Arc<dyn Repository>,
}

impl KeywordStrategy {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ClassifierStrategy for KeywordStrategy {
    fn name(&self) -> StrategyName {
        StrategyName::Keyword
    }

    async fn run(&self, ctx: &StrategyContext<'_>) -> Result<StrategyResult> {
        let terms: Vec<String> = ctx
            .keywords
            .keywords
            .iter()
            .map(|k| k.term.clone())
            .collect();
        let total_mass: f64 = ctx.keywords.keywords.iter().map(|k| k.weight).sum();
        if terms.is_empty() || total_mass <= 0.0 {
            return Ok(super::empty_result(StrategyName::Keyword));
        }

        let hits = self.repo.industries_for_keywords(&terms).await?;
        let mut scores: HashMap<IndustryId, f64> = HashMap::new();
        let mut supporting: HashMap<IndustryId, Vec<String>> = HashMap::new();
        for (industry_id, matched) in hits {
            let mut raw = 0.0;
            let mut terms_for = Vec::new();
            for (term, relevance) in matched {
                let weight = ctx.keywords.weight_of(&term).unwrap_or(0.0);
                raw += weight * relevance;
                terms_for.push(term);
            }
            scores.insert(industry_id, (raw / total_mass).clamp(0.0, 1.0));
            supporting.insert(industry_id, terms_for);
        }

        Ok(super::result_from_scores(
            StrategyName::Keyword,
            scores,
            supporting,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ExtractedKeywords, KeywordSource, WeightedKeyword};
    use crate::repo::{seed, StaticRepository};

    fn keywords(pairs: &[(&str, f64)]) -> ExtractedKeywords {
        ExtractedKeywords {
            keywords: pairs
                .iter()
                .map(|(term, weight)| WeightedKeyword {
                    term: term.to_string(),
                    weight: *weight,
                    source: KeywordSource::Homepage,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn strong_pizza_keywords_pick_restaurants() {
        let strategy = KeywordStrategy::new(Arc::new(StaticRepository::seeded()));
        let kw = keywords(&[("pizza", 1.0), ("menu", 0.8), ("dining", 0.7)]);
        let ctx = StrategyContext {
            keywords: &kw,
            plain_text: "",
        };
        let result = strategy.run(&ctx).await.unwrap();
        assert_eq!(result.primary_industry_id, Some(seed::RESTAURANTS));
        assert!(result.confidence > 0.7);
        assert!(result
            .supporting_keywords
            .iter()
            .any(|t| t == "pizza"));
    }

    #[tokio::test]
    async fn unknown_keywords_produce_empty_result() {
        let strategy = KeywordStrategy::new(Arc::new(StaticRepository::seeded()));
        let kw = keywords(&[("zzzunknown", 1.0)]);
        let ctx = StrategyContext {
            keywords: &kw,
            plain_text: "",
        };
        let result = strategy.run(&ctx).await.unwrap();
        assert!(result.primary_industry_id.is_none());
        assert_eq!(result.confidence, 0.0);
    }
}
