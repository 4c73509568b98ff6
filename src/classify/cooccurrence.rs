use super::{ClassifierStrategy, StrategyContext};
use crate::core::types::{IndustryId, StrategyName, StrategyResult};
use crate::repo::Repository;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Bonus multiplier for characteristic triples over pairs.
const TRIPLE_BONUS: f64 = 1.25;

/// Scores industries whose characteristic term pairs appear jointly in the
/// keyword set, from the precomputed co-occurrence patterns.
pub struct CooccurrenceStrategy {
    repo: Arc<dyn Repository>,
}

impl CooccurrenceStrategy {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ClassifierStrategy for CooccurrenceStrategy {
    fn name(&self) -> StrategyName {
        StrategyName::CoOccurrence
    }

    async fn run(&self, ctx: &StrategyContext<'_>) -> Result<StrategyResult> {
        let term_set: HashSet<&str> = ctx
            .keywords
            .keywords
            .iter()
            .flat_map(|k| k.term.split(' '))
            .collect();
        if term_set.len() < 2 {
            return Ok(super::empty_result(StrategyName::CoOccurrence));
        }

        let industries = self.repo.list_industries().await?;
        let mut scores: HashMap<IndustryId, f64> = HashMap::new();
        let mut supporting: HashMap<IndustryId, Vec<String>> = HashMap::new();

        for industry in &industries {
            let patterns = self
                .repo
                .get_cooccurrence_patterns(industry.industry_id)
                .await?;
            if patterns.is_empty() {
                continue;
            }
            let mut raw = 0.0;
            let mut matched_terms: Vec<String> = Vec::new();
            for pattern in &patterns {
                if pattern.terms.is_empty() {
                    continue;
                }
                let all_present = pattern
                    .terms
                    .iter()
                    .all(|t| term_set.contains(t.as_str()));
                if all_present {
                    let bonus = if pattern.terms.len() >= 3 {
                        TRIPLE_BONUS
                    } else {
                        1.0
                    };
                    raw += pattern.weight * bonus;
                    for t in &pattern.terms {
                        if !matched_terms.contains(t) {
                            matched_terms.push(t.clone());
                        }
                    }
                }
            }
            if raw > 0.0 {
                scores.insert(industry.industry_id, raw.min(1.0));
                supporting.insert(industry.industry_id, matched_terms);
            }
        }

        Ok(super::result_from_scores(
            StrategyName::CoOccurrence,
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

    fn keywords(terms: &[&str]) -> ExtractedKeywords {
        ExtractedKeywords {
            keywords: terms
                .iter()
                .map(|t| WeightedKeyword {
                    term: t.to_string(),
                    weight: 0.8,
                    source: KeywordSource::Homepage,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn joint_pairs_score_and_triples_score_higher() {
        let strategy = CooccurrenceStrategy::new(Arc::new(StaticRepository::seeded()));

        let pair = keywords(&["pizza", "delivery"]);
        let ctx = StrategyContext {
            keywords: &pair,
            plain_text: "",
        };
        let pair_result = strategy.run(&ctx).await.unwrap();
        assert_eq!(pair_result.primary_industry_id, Some(seed::RESTAURANTS));

        let triple = keywords(&["pizza", "pasta", "italian", "delivery"]);
        let ctx = StrategyContext {
            keywords: &triple,
            plain_text: "",
        };
        let triple_result = strategy.run(&ctx).await.unwrap();
        assert!(triple_result.confidence >= pair_result.confidence);
    }

    #[tokio::test]
    async fn partial_pattern_does_not_match() {
        let strategy = CooccurrenceStrategy::new(Arc::new(StaticRepository::seeded()));
        let kw = keywords(&["pizza"]);
        let ctx = StrategyContext {
            keywords: &kw,
            plain_text: "",
        };
        let result = strategy.run(&ctx).await.unwrap();
        assert!(result.primary_industry_id.is_none());
    }
}
