pub mod cooccurrence;
pub mod entity;
pub mod keyword;
pub mod topic;

use crate::core::deadline::Deadline;
use crate::core::types::*;
use crate::repo::Repository;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Soft per-strategy deadline when the four strategies run in parallel.
const STRATEGY_SOFT_DEADLINE: Duration = Duration::from_secs(3);

/// Blend weights; missing strategies redistribute proportionally among the
/// survivors.
const KEYWORD_WEIGHT: f64 = 0.40;
const TOPIC_WEIGHT: f64 = 0.20;
const COOCCURRENCE_WEIGHT: f64 = 0.20;
const ENTITY_WEIGHT: f64 = 0.20;

/// Two industries within this margin are tied and go through the tie-break
/// chain.
const TIE_MARGIN: f64 = 0.02;

pub const GENERIC_INDUSTRY_NAME: &str = "General Business";

/// A specific industry this close behind `General Business` displaces it.
const GENERIC_MARGIN: f64 = 0.05;

/// Inputs shared by every strategy run.
pub struct StrategyContext<'a> {
    pub keywords: &'a ExtractedKeywords,
    pub plain_text: &'a str,
}

/// One industry-detection strategy. Implementations are tagged variants,
/// not a hierarchy: one method, one result shape.
#[async_trait]
pub trait ClassifierStrategy: Send + Sync {
    fn name(&self) -> StrategyName;
    async fn run(&self, ctx: &StrategyContext<'_>) -> Result<StrategyResult>;
}

pub(crate) fn empty_result(strategy: StrategyName) -> StrategyResult {
    StrategyResult {
        strategy,
        candidate_industries: HashMap::new(),
        primary_industry_id: None,
        confidence: 0.0,
        supporting_keywords: Vec::new(),
    }
}

/// Assemble a result from raw per-industry scores (already in [0,1]):
/// primary is the max, confidence is the max score.
pub(crate) fn result_from_scores(
    strategy: StrategyName,
    scores: HashMap<IndustryId, f64>,
    mut supporting: HashMap<IndustryId, Vec<String>>,
) -> StrategyResult {
    let primary = scores
        .iter()
        .max_by(|a, b| {
            a.1.partial_cmp(b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.cmp(a.0))
        })
        .map(|(id, score)| (*id, *score));
    match primary {
        Some((id, confidence)) => StrategyResult {
            strategy,
            supporting_keywords: supporting.remove(&id).unwrap_or_default(),
            candidate_industries: scores,
            primary_industry_id: Some(id),
            confidence,
        },
        None => empty_result(strategy),
    }
}

fn base_weight(name: StrategyName) -> f64 {
    match name {
        StrategyName::Keyword => KEYWORD_WEIGHT,
        StrategyName::Topic => TOPIC_WEIGHT,
        StrategyName::CoOccurrence => COOCCURRENCE_WEIGHT,
        StrategyName::Entity => ENTITY_WEIGHT,
    }
}

/// Layer 1: runs the four strategies in parallel and blends their votes.
pub struct MultiStrategyClassifier {
    strategies: Vec<Box<dyn ClassifierStrategy>>,
    repo: Arc<dyn Repository>,
}

impl MultiStrategyClassifier {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        let strategies: Vec<Box<dyn ClassifierStrategy>> = vec![
            Box::new(keyword::KeywordStrategy::new(Arc::clone(&repo))),
            Box::new(topic::TopicStrategy::new(Arc::clone(&repo))),
            Box::new(cooccurrence::CooccurrenceStrategy::new(Arc::clone(&repo))),
            Box::new(entity::EntityStrategy::new(Arc::clone(&repo))),
        ];
        Self { strategies, repo }
    }

    pub async fn classify(
        &self,
        keywords: &ExtractedKeywords,
        plain_text: &str,
        deadline: Deadline,
    ) -> Result<BlendedClassification> {
        let ctx = StrategyContext {
            keywords,
            plain_text,
        };
        let soft = deadline.clamp(STRATEGY_SOFT_DEADLINE);

        let runs = self.strategies.iter().map(|s| {
            let ctx = &ctx;
            async move {
                match tokio::time::timeout(soft, s.run(ctx)).await {
                    Ok(Ok(result)) => Some(result),
                    Ok(Err(e)) => {
                        warn!(strategy = s.name().as_str(), error = %e, "strategy failed");
                        None
                    }
                    Err(_) => {
                        warn!(strategy = s.name().as_str(), "strategy timed out");
                        None
                    }
                }
            }
        });
        let results: Vec<StrategyResult> = futures::future::join_all(runs)
            .await
            .into_iter()
            .flatten()
            .collect();

        self.blend(results).await
    }

    /// Weighted blend with proportional redistribution, the 0.02 tie-break
    /// chain, and the anti-generic rule.
    pub async fn blend(&self, results: Vec<StrategyResult>) -> Result<BlendedClassification> {
        let names: HashMap<IndustryId, String> = self
            .repo
            .list_industries()
            .await?
            .into_iter()
            .map(|i| (i.industry_id, i.name))
            .collect();

        let survivors: Vec<&StrategyResult> = results
            .iter()
            .filter(|r| r.primary_industry_id.is_some())
            .collect();
        let total_weight: f64 = survivors.iter().map(|r| base_weight(r.strategy)).sum();
        if survivors.is_empty() || total_weight <= 0.0 {
            return Err(anyhow!("no strategy produced a candidate"));
        }

        let mut blended: HashMap<IndustryId, f64> = HashMap::new();
        for result in &survivors {
            let weight = base_weight(result.strategy) / total_weight;
            for (industry_id, score) in &result.candidate_industries {
                *blended.entry(*industry_id).or_insert(0.0) += weight * score;
            }
        }

        let name_of = |id: IndustryId| {
            names
                .get(&id)
                .cloned()
                .unwrap_or_else(|| format!("industry-{id}"))
        };

        let mut ranked: Vec<(IndustryId, f64)> = blended.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| name_of(a.0).cmp(&name_of(b.0)))
        });

        let keyword_scores: HashMap<IndustryId, f64> = results
            .iter()
            .find(|r| r.strategy == StrategyName::Keyword)
            .map(|r| r.candidate_industries.clone())
            .unwrap_or_default();

        let mut winner_idx = 0usize;
        if ranked.len() > 1 && (ranked[0].1 - ranked[1].1).abs() < TIE_MARGIN {
            winner_idx = break_tie(&ranked, &keyword_scores, &name_of);
        }

        // Anti-generic rule: a generic winner must be clearly unopposed.
        // Any reasonably-scored or close-behind specific industry wins.
        if name_of(ranked[winner_idx].0) == GENERIC_INDUSTRY_NAME {
            let best_specific = ranked
                .iter()
                .enumerate()
                .find(|(_, (id, _))| name_of(*id) != GENERIC_INDUSTRY_NAME);
            if let Some((idx, (specific_id, specific_score))) = best_specific {
                let generic_score = ranked[winner_idx].1;
                if *specific_score >= 0.30
                    || generic_score >= 0.50
                    || generic_score - specific_score < GENERIC_MARGIN
                {
                    debug!(
                        specific = %name_of(*specific_id),
                        specific_score,
                        generic_score,
                        "anti-generic rule overrode General Business"
                    );
                    winner_idx = idx;
                }
            }
        }

        let (winner_id, winner_score) = ranked[winner_idx];
        let secondary_industries: Vec<SecondaryIndustry> = ranked
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != winner_idx)
            .take(3)
            .map(|(_, (id, score))| SecondaryIndustry {
                industry_id: *id,
                name: name_of(*id),
                score: *score,
            })
            .collect();

        let factors = vec![ExplanationFactor {
            factor: "strategies".to_string(),
            detail: survivors
                .iter()
                .map(|r| format!("{}={:.2}", r.strategy.as_str(), r.confidence))
                .collect::<Vec<_>>()
                .join(", "),
        }];

        Ok(BlendedClassification {
            primary_industry_id: winner_id,
            primary_industry_name: name_of(winner_id),
            confidence: winner_score.clamp(0.0, 1.0),
            secondary_industries,
            strategy_results: results,
            explanation: Explanation {
                factors,
                summary_text: String::new(),
            },
        })
    }
}

/// Tie-break chain for near-equal blended scores: keyword-strategy score,
/// then non-generic, then lexicographically smallest name.
fn break_tie(
    ranked: &[(IndustryId, f64)],
    keyword_scores: &HashMap<IndustryId, f64>,
    name_of: &impl Fn(IndustryId) -> String,
) -> usize {
    let contenders: Vec<usize> = ranked
        .iter()
        .enumerate()
        .filter(|(_, (_, score))| (ranked[0].1 - score).abs() < TIE_MARGIN)
        .map(|(i, _)| i)
        .collect();

    let kw = |i: usize| keyword_scores.get(&ranked[i].0).copied().unwrap_or(0.0);
    let best_kw = contenders
        .iter()
        .map(|&i| kw(i))
        .fold(f64::NEG_INFINITY, f64::max);
    let kw_leaders: Vec<usize> = contenders
        .iter()
        .copied()
        .filter(|&i| (kw(i) - best_kw).abs() < f64::EPSILON)
        .collect();
    if kw_leaders.len() == 1 {
        return kw_leaders[0];
    }

    let non_generic: Vec<usize> = kw_leaders
        .iter()
        .copied()
        .filter(|&i| name_of(ranked[i].0) != GENERIC_INDUSTRY_NAME)
        .collect();
    let pool = if non_generic.is_empty() {
        kw_leaders
    } else {
        non_generic
    };

    pool.into_iter()
        .min_by_key(|&i| name_of(ranked[i].0))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{seed, StaticRepository};

    fn classifier() -> MultiStrategyClassifier {
        MultiStrategyClassifier::new(Arc::new(StaticRepository::seeded()))
    }

    fn result(
        strategy: StrategyName,
        scores: &[(IndustryId, f64)],
        supporting: &[&str],
    ) -> StrategyResult {
        let map: HashMap<IndustryId, f64> = scores.iter().copied().collect();
        let primary = scores
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .map(|(id, _)| *id);
        let confidence = scores.iter().map(|(_, s)| *s).fold(0.0, f64::max);
        StrategyResult {
            strategy,
            candidate_industries: map,
            primary_industry_id: primary,
            confidence,
            supporting_keywords: supporting.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn missing_strategies_redistribute_weight() {
        let c = classifier();
        // Keyword alone: its 0.40 weight becomes 1.0 after redistribution.
        let blended = c
            .blend(vec![result(
                StrategyName::Keyword,
                &[(seed::RESTAURANTS, 0.8)],
                &["pizza"],
            )])
            .await
            .unwrap();
        assert_eq!(blended.primary_industry_id, seed::RESTAURANTS);
        assert!((blended.confidence - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn blend_weights_follow_defaults() {
        let c = classifier();
        let blended = c
            .blend(vec![
                result(StrategyName::Keyword, &[(seed::RESTAURANTS, 1.0)], &["pizza"]),
                result(StrategyName::Topic, &[(seed::TECHNOLOGY, 1.0)], &["cloud"]),
            ])
            .await
            .unwrap();
        // keyword 0.40 vs topic 0.20 → 2/3 vs 1/3 after redistribution.
        assert_eq!(blended.primary_industry_id, seed::RESTAURANTS);
        assert!((blended.confidence - 2.0 / 3.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn tie_break_prefers_keyword_strategy_score() {
        let c = classifier();
        let blended = c
            .blend(vec![
                result(
                    StrategyName::Keyword,
                    &[(seed::RESTAURANTS, 0.50), (seed::CATERING, 0.52)],
                    &["catering"],
                ),
                result(
                    StrategyName::Topic,
                    &[(seed::RESTAURANTS, 0.52), (seed::CATERING, 0.50)],
                    &["dining"],
                ),
            ])
            .await
            .unwrap();
        // Blended scores differ by < 0.02; catering wins on keyword score.
        assert_eq!(blended.primary_industry_id, seed::CATERING);
    }

    #[tokio::test]
    async fn anti_generic_promotes_reasonable_specific() {
        let c = classifier();
        let blended = c
            .blend(vec![result(
                StrategyName::Keyword,
                &[
                    (seed::GENERAL_BUSINESS, 0.44),
                    (seed::PROFESSIONAL_SERVICES, 0.41),
                ],
                &["corporation"],
            )])
            .await
            .unwrap();
        assert_eq!(blended.primary_industry_name, "Professional Services");
    }

    #[tokio::test]
    async fn generic_wins_only_when_unopposed() {
        let c = classifier();
        let blended = c
            .blend(vec![result(
                StrategyName::Keyword,
                &[
                    (seed::GENERAL_BUSINESS, 0.45),
                    (seed::PROFESSIONAL_SERVICES, 0.10),
                ],
                &["business"],
            )])
            .await
            .unwrap();
        assert_eq!(blended.primary_industry_name, GENERIC_INDUSTRY_NAME);
    }

    #[tokio::test]
    async fn no_candidates_is_an_error() {
        let c = classifier();
        assert!(c.blend(vec![]).await.is_err());
        assert!(c
            .blend(vec![empty_result(StrategyName::Keyword)])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn end_to_end_pizza_classification() {
        let c = classifier();
        let keywords = ExtractedKeywords {
            keywords: vec![
                WeightedKeyword {
                    term: "pizza".to_string(),
                    weight: 1.0,
                    source: KeywordSource::Homepage,
                },
                WeightedKeyword {
                    term: "menu".to_string(),
                    weight: 0.7,
                    source: KeywordSource::Homepage,
                },
                WeightedKeyword {
                    term: "dining".to_string(),
                    weight: 0.6,
                    source: KeywordSource::Homepage,
                },
            ],
        };
        let deadline = Deadline::after(Duration::from_secs(5));
        let blended = c
            .classify(&keywords, "Authentic pizza and pasta in Brooklyn", deadline)
            .await
            .unwrap();
        assert_eq!(blended.primary_industry_name, "Restaurants");
        assert!(blended.confidence > 0.3);
        assert!(!blended.strategy_results.is_empty());
    }
}
