use super::{ClassifierStrategy, StrategyContext};
use crate::core::types::{IndustryId, StrategyName, StrategyResult};
use crate::repo::Repository;
use aho_corasick::AhoCorasick;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Score contributed by each distinct recognized entity.
const ENTITY_SCORE: f64 = 0.5;

/// Recognizes organization- and product-type entities in the page text via
/// the static alias table and votes for their mapped industries.
pub struct EntityStrategy {
    repo: Arc<dyn Repository>,
}

impl EntityStrategy {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }
}

fn is_word_boundary(text: &[u8], start: usize, end: usize) -> bool {
    let before_ok = start == 0 || !text[start - 1].is_ascii_alphanumeric();
    let after_ok = end >= text.len() || !text[end].is_ascii_alphanumeric();
    before_ok && after_ok
}

#[async_trait]
impl ClassifierStrategy for EntityStrategy {
    fn name(&self) -> StrategyName {
        StrategyName::Entity
    }

    async fn run(&self, ctx: &StrategyContext<'_>) -> Result<StrategyResult> {
        if ctx.plain_text.trim().is_empty() {
            return Ok(super::empty_result(StrategyName::Entity));
        }
        let mappings = self.repo.get_entity_industries().await?;
        if mappings.is_empty() {
            return Ok(super::empty_result(StrategyName::Entity));
        }

        let patterns: Vec<&str> = mappings.iter().map(|m| m.alias.as_str()).collect();
        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&patterns)?;

        let haystack = ctx.plain_text.as_bytes();
        let mut matched: std::collections::HashSet<usize> = std::collections::HashSet::new();
        for hit in automaton.find_iter(ctx.plain_text) {
            if is_word_boundary(haystack, hit.start(), hit.end()) {
                matched.insert(hit.pattern().as_usize());
            }
        }

        let mut scores: HashMap<IndustryId, f64> = HashMap::new();
        let mut supporting: HashMap<IndustryId, Vec<String>> = HashMap::new();
        for index in matched.iter() {
            let mapping = &mappings[*index];
            let entry = scores.entry(mapping.industry_id).or_insert(0.0);
            *entry = (*entry + ENTITY_SCORE).min(1.0);
            supporting
                .entry(mapping.industry_id)
                .or_default()
                .push(mapping.alias.clone());
        }
        for terms in supporting.values_mut() {
            terms.sort();
        }

        Ok(super::result_from_scores(
            StrategyName::Entity,
            scores,
            supporting,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ExtractedKeywords;
    use crate::repo::{seed, StaticRepository};

    #[tokio::test]
    async fn recognizes_known_entities_with_boundaries() {
        let strategy = EntityStrategy::new(Arc::new(StaticRepository::seeded()));
        let kw = ExtractedKeywords::default();
        let ctx = StrategyContext {
            keywords: &kw,
            plain_text: "We deploy on AWS and Azure. Order through DoorDash.",
        };
        let result = strategy.run(&ctx).await.unwrap();
        assert_eq!(result.primary_industry_id, Some(seed::TECHNOLOGY));
        let tech = result.candidate_industries[&seed::TECHNOLOGY];
        let food = result.candidate_industries[&seed::RESTAURANTS];
        assert!(tech > food);
    }

    #[tokio::test]
    async fn substring_hits_inside_words_are_ignored() {
        let strategy = EntityStrategy::new(Arc::new(StaticRepository::seeded()));
        let kw = ExtractedKeywords::default();
        let ctx = StrategyContext {
            keywords: &kw,
            // "visa" occurs only inside "advisable".
            plain_text: "It is advisable to consult an expert.",
        };
        let result = strategy.run(&ctx).await.unwrap();
        assert!(result.primary_industry_id.is_none());
    }

    #[tokio::test]
    async fn empty_text_yields_empty_result() {
        let strategy = EntityStrategy::new(Arc::new(StaticRepository::seeded()));
        let kw = ExtractedKeywords::default();
        let ctx = StrategyContext {
            keywords: &kw,
            plain_text: "   ",
        };
        let result = strategy.run(&ctx).await.unwrap();
        assert!(result.candidate_industries.is_empty());
    }
}
