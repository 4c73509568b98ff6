use super::{ClassifierStrategy, StrategyContext};
use crate::core::types::{IndustryId, StrategyName, StrategyResult};
use crate::repo::Repository;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Scores industries by topical coverage: for topics intersecting the
/// keyword set, `Σ topic_relevance · historical_accuracy` over the
/// industry's total topical mass. Accuracy is the out-of-band EMA stored in
/// `industry_topics`.
pub struct TopicStrategy {
    repo: Arc<dyn Repository>,
}

impl TopicStrategy {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ClassifierStrategy for TopicStrategy {
    fn name(&self) -> StrategyName {
        StrategyName::Topic
    }

    async fn run(&self, ctx: &StrategyContext<'_>) -> Result<StrategyResult> {
        let term_set: HashSet<&str> = ctx
            .keywords
            .keywords
            .iter()
            .flat_map(|k| k.term.split(' '))
            .collect();
        if term_set.is_empty() {
            return Ok(super::empty_result(StrategyName::Topic));
        }

        let industries = self.repo.list_industries().await?;
        let mut scores: HashMap<IndustryId, f64> = HashMap::new();
        let mut supporting: HashMap<IndustryId, Vec<String>> = HashMap::new();

        for industry in &industries {
            let topics = self
                .repo
                .get_industry_topics(industry.industry_id)
                .await?;
            if topics.is_empty() {
                continue;
            }
            let total_mass: f64 = topics
                .iter()
                .map(|t| t.relevance * t.historical_accuracy)
                .sum();
            if total_mass <= 0.0 {
                continue;
            }
            let mut matched_mass = 0.0;
            let mut matched_topics = Vec::new();
            for topic in &topics {
                if term_set.contains(topic.topic.as_str()) {
                    matched_mass += topic.relevance * topic.historical_accuracy;
                    matched_topics.push(topic.topic.clone());
                }
            }
            if matched_mass > 0.0 {
                scores.insert(
                    industry.industry_id,
                    (matched_mass / total_mass).clamp(0.0, 1.0),
                );
                supporting.insert(industry.industry_id, matched_topics);
            }
        }

        Ok(super::result_from_scores(
            StrategyName::Topic,
            scores,
            supporting,
        ))
    }
}
