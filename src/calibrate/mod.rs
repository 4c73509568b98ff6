use crate::core::types::{ExplanationFactor, StrategyResult};
use tracing::warn;

/// Per-factor clamp range.
const FACTOR_MIN: f64 = 0.85;
const FACTOR_MAX: f64 = 1.25;

/// Final confidence clamp. The floor keeps scores usable; the ceiling
/// reserves certainty for trivial exact-match cases.
pub const CONFIDENCE_FLOOR: f64 = 0.50;
pub const CONFIDENCE_CEILING: f64 = 0.95;

/// Penalty when the winning industry's canonical keywords share nothing
/// with the supporting keywords.
const MISMATCH_PENALTY: f64 = 0.20;

/// How the winning classification was produced; feeds the method prior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationMethod {
    MultiStrategy,
    MlDominant,
    KeywordDominant,
}

#[derive(Debug, Clone)]
pub struct CalibrationInput<'a> {
    pub raw_confidence: f64,
    pub quality_score: f64,
    pub word_count: usize,
    pub strategy_results: &'a [StrategyResult],
    pub method: ClassificationMethod,
    /// `accuracy[winner_industry_id]`; defaults to 0.75 when absent.
    pub historical_accuracy: Option<f64>,
    /// Supporting keywords overlap the winner's canonical keyword set.
    pub keyword_overlap: bool,
}

#[derive(Debug, Clone)]
pub struct Calibration {
    pub confidence: f64,
    pub factors: Vec<ExplanationFactor>,
    pub mismatch_flagged: bool,
}

fn clamp_factor(f: f64) -> f64 {
    f.clamp(FACTOR_MIN, FACTOR_MAX)
}

fn push(factors: &mut Vec<ExplanationFactor>, name: &str, value: f64) {
    factors.push(ExplanationFactor {
        factor: name.to_string(),
        detail: format!("{value:.3}"),
    });
}

/// Variance of the per-strategy top scores; low variance means the
/// strategies agree.
fn strategy_variance(results: &[StrategyResult]) -> f64 {
    let tops: Vec<f64> = results.iter().map(|r| r.confidence).collect();
    if tops.len() < 2 {
        return 0.0;
    }
    let mean = tops.iter().sum::<f64>() / tops.len() as f64;
    tops.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / tops.len() as f64
}

/// Factors 1, 2, 4, 5 plus the keyword/industry mismatch validation.
/// Factor 3 (code agreement) needs the generated code pool and is applied
/// by [`apply_code_agreement`] before [`finalize`].
pub fn precalibrate(input: &CalibrationInput<'_>) -> Calibration {
    let mut factors = Vec::new();
    let mut confidence = input.raw_confidence;

    let quality_factor = clamp_factor(0.9 + 0.2 * input.quality_score);
    confidence *= quality_factor;
    push(&mut factors, "content_quality", quality_factor);

    let variance = strategy_variance(input.strategy_results);
    let agreement_factor = clamp_factor(1.0 + 0.25 * (1.0 - variance));
    confidence *= agreement_factor;
    push(&mut factors, "strategy_agreement", agreement_factor);

    let method_factor = clamp_factor(match input.method {
        ClassificationMethod::MultiStrategy => 1.05,
        ClassificationMethod::MlDominant => 1.10,
        ClassificationMethod::KeywordDominant if input.word_count >= 200 => 1.12,
        ClassificationMethod::KeywordDominant => 1.0,
    });
    confidence *= method_factor;
    push(&mut factors, "method_prior", method_factor);

    let accuracy = input.historical_accuracy.unwrap_or(0.75);
    let accuracy_factor = clamp_factor(0.75 + 0.5 * accuracy);
    confidence *= accuracy_factor;
    push(&mut factors, "historical_accuracy", accuracy_factor);

    let mut mismatch_flagged = false;
    if !input.keyword_overlap {
        confidence -= MISMATCH_PENALTY;
        mismatch_flagged = true;
        warn!("keyword_industry_mismatch: supporting keywords do not overlap canonical set");
        factors.push(ExplanationFactor {
            factor: "keyword_industry_mismatch".to_string(),
            detail: format!("-{MISMATCH_PENALTY:.2}"),
        });
    }

    Calibration {
        confidence,
        factors,
        mismatch_flagged,
    }
}

/// Factor 3: codes that map back to the chosen industry.
pub fn apply_code_agreement(confidence: f64, codes_matching_industry: usize) -> (f64, f64) {
    let factor = clamp_factor(match codes_matching_industry {
        0 => 0.92,
        1 => 1.0,
        _ => 1.10,
    });
    (confidence * factor, factor)
}

/// Clamp into the final `[0.50, 0.95]` band.
pub fn finalize(confidence: f64) -> f64 {
    confidence.clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::StrategyName;
    use std::collections::HashMap;

    fn strategy(confidence: f64) -> StrategyResult {
        StrategyResult {
            strategy: StrategyName::Keyword,
            candidate_industries: HashMap::new(),
            primary_industry_id: Some(1),
            confidence,
            supporting_keywords: vec![],
        }
    }

    fn input<'a>(results: &'a [StrategyResult]) -> CalibrationInput<'a> {
        CalibrationInput {
            raw_confidence: 0.6,
            quality_score: 0.8,
            word_count: 300,
            strategy_results: results,
            method: ClassificationMethod::MultiStrategy,
            historical_accuracy: Some(0.85),
            keyword_overlap: true,
        }
    }

    #[test]
    fn agreement_raises_and_disagreement_lowers() {
        let agreeing = [strategy(0.7), strategy(0.7), strategy(0.7)];
        let disagreeing = [strategy(0.9), strategy(0.1), strategy(0.9)];
        let high = precalibrate(&input(&agreeing)).confidence;
        let low = precalibrate(&input(&disagreeing)).confidence;
        assert!(high > low);
    }

    #[test]
    fn factors_stay_in_clamp_range() {
        let results = [strategy(0.7)];
        let mut i = input(&results);
        i.quality_score = 5.0; // would exceed the clamp unclamped
        let cal = precalibrate(&i);
        for factor in &cal.factors {
            let v: f64 = factor.detail.parse().unwrap();
            assert!((FACTOR_MIN..=FACTOR_MAX).contains(&v), "{v} out of range");
        }
    }

    #[test]
    fn keyword_dominant_prior_requires_word_count() {
        let results = [strategy(0.7)];
        let mut rich = input(&results);
        rich.method = ClassificationMethod::KeywordDominant;
        rich.word_count = 250;
        let mut thin = rich.clone();
        thin.word_count = 50;
        assert!(precalibrate(&rich).confidence > precalibrate(&thin).confidence);
    }

    #[test]
    fn mismatch_penalty_applies_and_flags() {
        let results = [strategy(0.7)];
        let mut i = input(&results);
        i.keyword_overlap = false;
        let cal = precalibrate(&i);
        assert!(cal.mismatch_flagged);
        let baseline = precalibrate(&input(&results));
        assert!((baseline.confidence - cal.confidence - 0.20).abs() < 1e-9);
    }

    #[test]
    fn code_agreement_tiers() {
        assert_eq!(apply_code_agreement(1.0, 0).1, 0.92);
        assert_eq!(apply_code_agreement(1.0, 1).1, 1.0);
        assert_eq!(apply_code_agreement(1.0, 2).1, 1.10);
        assert_eq!(apply_code_agreement(1.0, 5).1, 1.10);
    }

    #[test]
    fn final_clamp_band() {
        assert_eq!(finalize(0.1), 0.50);
        assert_eq!(finalize(0.7), 0.7);
        assert_eq!(finalize(1.4), 0.95);
    }
}
