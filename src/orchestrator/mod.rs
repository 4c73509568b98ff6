use crate::cache;
use crate::calibrate::{self, CalibrationInput, ClassificationMethod};
use crate::core::app_state::AppState;
use crate::core::deadline::{stage_budget, Deadline, StageBudget};
use crate::core::errors::ClassifyError;
use crate::core::types::*;
use crate::embedding::{blend_layers, Layer2Decision};
use crate::metrics;
use crate::ml::{should_override, MlOutcome, MlSkipReason};
use crate::reliability::{await_outcome, Flight, SharedFailure};
use crate::scraping::normalize_website_url;
use futures::FutureExt;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};
use url::Url;

pub const STAGE_SCRAPE: &str = "scrape";
pub const STAGE_EXTRACT: &str = "extract";
pub const STAGE_CLASSIFY: &str = "classify";
pub const STAGE_EMBEDDING: &str = "embedding";
pub const STAGE_ML: &str = "ml";
pub const STAGE_CODES: &str = "codes";

const EXTRACT_CAP: Duration = Duration::from_secs(5);
const CLASSIFY_CAP: Duration = Duration::from_secs(5);
const EMBEDDING_CAP: Duration = Duration::from_secs(10);
const ML_CAP: Duration = Duration::from_secs(15);
const CODES_CAP: Duration = Duration::from_secs(5);

/// Background refresh deadline for stale-while-revalidate rebuilds.
const SWR_DEADLINE: Duration = Duration::from_secs(30);

const MAX_BUSINESS_NAME_CHARS: usize = 512;

/// Fallback confidence when no strategy produced any candidate.
const NO_SIGNAL_CONFIDENCE: f64 = 0.30;

struct ValidatedRequest {
    request_id: String,
    business_name: String,
    description: Option<String>,
    website: Option<Url>,
}

/// Public entry point: validate, admit, dedup, build (or subscribe), serve.
pub async fn classify(
    state: &Arc<AppState>,
    request: ClassifyRequest,
) -> Result<ClassificationResult, ClassifyError> {
    let validated = match validate(state, &request) {
        Ok(v) => v,
        Err(e) => {
            metrics::record_request("invalid_request");
            return Err(e);
        }
    };

    let _permit = match state.admission.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            metrics::record_request("overloaded");
            return Err(ClassifyError::Overloaded);
        }
    };

    let overall = request
        .deadline_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| state.config.classify.overall_timeout());
    let deadline = Deadline::after(overall);

    let fp = cache::fingerprint(
        &validated.business_name,
        validated.website.as_ref().map(|u| u.as_str()),
        validated.description.as_deref(),
    );

    if let Some(hit) = state.cache.get(&fp).await {
        metrics::record_cache_hit(hit.tier.as_str());
        metrics::record_request("cache_hit");
        if hit.needs_refresh && !state.inflight.contains(&fp) {
            spawn_background_refresh(Arc::clone(state), validated_clone(&validated), fp.clone());
        }
        let mut result = hit.result;
        result.request_id = validated.request_id;
        return Ok(result);
    }

    match state.inflight.begin(&fp) {
        Flight::Follower(rx) => match await_outcome(rx).await {
            Ok(mut result) => {
                metrics::record_request("dedup_shared");
                result.request_id = validated.request_id;
                Ok(result)
            }
            Err(shared) => Err(shared_to_error(shared)),
        },
        Flight::Leader(guard) => {
            let build = AssertUnwindSafe(build_classification(state, &validated, deadline, &fp))
                .catch_unwind()
                .await;
            match build {
                Ok(Ok(result)) => {
                    metrics::record_request("ok");
                    guard.complete(Ok(result.clone()));
                    Ok(result)
                }
                Ok(Err(e)) => {
                    metrics::record_request(e.kind());
                    guard.complete(Err(SharedFailure {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    }));
                    Err(e)
                }
                Err(panic) => {
                    let message = panic_message(&panic);
                    error!(request_id = %validated.request_id, %message, "panic captured in classification pipeline");
                    metrics::record_request("internal");
                    guard.complete(Err(SharedFailure {
                        kind: "internal".to_string(),
                        message: message.clone(),
                    }));
                    Err(ClassifyError::Internal(message))
                }
            }
        }
    }
}

fn validate(state: &Arc<AppState>, request: &ClassifyRequest) -> Result<ValidatedRequest, ClassifyError> {
    let business_name = request.business_name.trim().to_string();
    if business_name.is_empty() {
        return Err(ClassifyError::InvalidRequest(
            "business_name is required".to_string(),
        ));
    }
    if business_name.chars().count() > MAX_BUSINESS_NAME_CHARS {
        return Err(ClassifyError::InvalidRequest(format!(
            "business_name exceeds {MAX_BUSINESS_NAME_CHARS} characters"
        )));
    }

    let website = match request
        .website_url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(raw) => Some(
            normalize_website_url(raw, state.config.scrape.allow_private_hosts)
                .map_err(ClassifyError::InvalidRequest)?,
        ),
        None => None,
    };

    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    let request_id = request
        .request_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    Ok(ValidatedRequest {
        request_id,
        business_name,
        description,
        website,
    })
}

fn validated_clone(v: &ValidatedRequest) -> ValidatedRequest {
    ValidatedRequest {
        request_id: uuid::Uuid::new_v4().to_string(),
        business_name: v.business_name.clone(),
        description: v.description.clone(),
        website: v.website.clone(),
    }
}

fn shared_to_error(shared: SharedFailure) -> ClassifyError {
    match shared.kind.as_str() {
        "invalid_request" => ClassifyError::InvalidRequest(shared.message),
        "timeout" => ClassifyError::Timeout { stage: "shared" },
        "dependency_failure" => ClassifyError::DependencyFailure {
            summary: shared.message,
        },
        "rate_limited" => ClassifyError::RateLimited(shared.message),
        "overloaded" => ClassifyError::Overloaded,
        _ => ClassifyError::Internal(shared.message),
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Stale-while-revalidate: rebuild in the background under a fresh deadline
/// detached from the original caller.
fn spawn_background_refresh(state: Arc<AppState>, request: ValidatedRequest, fp: String) {
    tokio::spawn(async move {
        let Flight::Leader(guard) = state.inflight.begin(&fp) else {
            return;
        };
        let deadline = Deadline::after(SWR_DEADLINE);
        let outcome = AssertUnwindSafe(build_classification(&state, &request, deadline, &fp))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(result)) => {
                info!(fingerprint = %fp, "background cache refresh complete");
                guard.complete(Ok(result));
            }
            Ok(Err(e)) => {
                warn!(fingerprint = %fp, error = %e, "background cache refresh failed");
                guard.complete(Err(SharedFailure {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                }));
            }
            Err(panic) => {
                let message = panic_message(&panic);
                error!(fingerprint = %fp, %message, "panic captured in background refresh");
                guard.complete(Err(SharedFailure {
                    kind: "internal".to_string(),
                    message,
                }));
            }
        }
    });
}

struct StageTimer {
    timings: BTreeMap<String, u64>,
}

impl StageTimer {
    fn new() -> Self {
        Self {
            timings: BTreeMap::new(),
        }
    }

    fn record(&mut self, stage: &'static str, started: Instant) {
        let elapsed = started.elapsed();
        self.timings.insert(stage.to_string(), elapsed.as_millis() as u64);
        metrics::record_stage_duration(stage, elapsed.as_secs_f64());
    }
}

fn budget(deadline: Deadline, cap: Duration, metadata: &mut ResultMetadata) -> StageBudget {
    let b = stage_budget(deadline, cap);
    if b.rescued {
        metadata.deadline_rescue = true;
    }
    b
}

/// The five-stage build. Only runs once per fingerprint at a time.
async fn build_classification(
    state: &Arc<AppState>,
    request: &ValidatedRequest,
    deadline: Deadline,
    fp: &str,
) -> Result<ClassificationResult, ClassifyError> {
    let started = Instant::now();
    let mut metadata = ResultMetadata::default();
    let mut timer = StageTimer::new();

    // ── Stage 1: scrape ────────────────────────────────────────────────
    let mut content: Option<ScrapedContent> = None;
    if let Some(url) = &request.website {
        let b = budget(deadline, state.config.scrape.overall_budget(), &mut metadata);
        let t0 = Instant::now();
        let scraped = state.scraper.scrape(url, b.deadline).await;
        timer.record(STAGE_SCRAPE, t0);
        match scraped {
            Ok(outcome) => {
                metadata.scraping_strategy = Some(outcome.content.strategy_used.as_str().to_string());
                metadata.scrape_attempts = outcome.attempts;
                content = Some(outcome.content);
            }
            Err(failure) => {
                let summary = failure.summary();
                metadata.scrape_attempts = failure.attempts;
                if request.description.is_some() {
                    info!(request_id = %request.request_id, %summary, "scraping failed, using description fallback");
                    metadata.fallback_used = Some("description_only".to_string());
                } else if b.rescued {
                    return Err(ClassifyError::Timeout { stage: STAGE_SCRAPE });
                } else {
                    return Err(ClassifyError::DependencyFailure { summary });
                }
            }
        }
    }

    // ── Stage 2: extract ───────────────────────────────────────────────
    let b = budget(deadline, EXTRACT_CAP, &mut metadata);
    let t0 = Instant::now();
    let text_input = match &request.description {
        Some(d) => format!("{}. {}", request.business_name, d),
        None => request.business_name.clone(),
    };
    let keywords = tokio::time::timeout_at(
        b.deadline.instant(),
        state.extractor.extract(content.as_ref(), Some(&text_input)),
    )
    .await
    .map_err(|_| ClassifyError::Timeout { stage: STAGE_EXTRACT })?;
    timer.record(STAGE_EXTRACT, t0);

    // ── Stage 3: multi-strategy classification ─────────────────────────
    let b = budget(deadline, CLASSIFY_CAP, &mut metadata);
    let t0 = Instant::now();
    let plain_text = content
        .as_ref()
        .map(|c| c.plain_text.clone())
        .unwrap_or_else(|| text_input.clone());
    let layer1 = tokio::time::timeout_at(
        b.deadline.instant(),
        state.classifier.classify(&keywords, &plain_text, b.deadline),
    )
    .await
    .map_err(|_| ClassifyError::Timeout { stage: STAGE_CLASSIFY })?;
    timer.record(STAGE_CLASSIFY, t0);

    let mut classification = match layer1 {
        Ok(blended) => blended,
        Err(e) => {
            warn!(request_id = %request.request_id, error = %e, "no classification signal, defaulting to generic");
            fallback_classification(state).await?
        }
    };

    let quality_score = content.as_ref().map(|c| c.quality_score).unwrap_or(0.0);
    let word_count = content.as_ref().map(|c| c.word_count).unwrap_or(0);
    let mut method = classification_method(&classification);

    // Calibration pre-pass (factors 1, 2, 4, 5 + mismatch validation).
    let overlap = keyword_overlap(state, &classification).await;
    let accuracy = state
        .repository
        .get_historical_accuracy(classification.primary_industry_id)
        .await
        .ok()
        .flatten();
    let precal = calibrate::precalibrate(&CalibrationInput {
        raw_confidence: classification.confidence,
        quality_score,
        word_count,
        strategy_results: &classification.strategy_results,
        method,
        historical_accuracy: accuracy,
        keyword_overlap: overlap,
    });
    let mut current_confidence = precal.confidence;
    let mut factors = precal.factors;

    // ── Early termination ──────────────────────────────────────────────
    let quality_validated = content
        .as_ref()
        .map(|c| c.quality_score >= 0.7 || c.word_count >= 150)
        .unwrap_or(false);
    let early_exit = current_confidence >= state.config.classify.early_exit_threshold
        && quality_validated;
    metadata.early_exit = early_exit;

    let mut extra_codes: Vec<CodeCandidate> = Vec::new();

    if !early_exit {
        // ── Stage 4: embedding layer ───────────────────────────────────
        let text_nonempty = content
            .as_ref()
            .map(|c| !c.plain_text.trim().is_empty())
            .unwrap_or(false);
        if current_confidence < state.config.classify.layer2_threshold && text_nonempty {
            if let (Some(layer), Some(page)) = (&state.embedding, content.as_ref()) {
                let b = budget(deadline, EMBEDDING_CAP, &mut metadata);
                let t0 = Instant::now();
                let verdict =
                    tokio::time::timeout_at(b.deadline.instant(), layer.run(page, b.deadline))
                        .await;
                timer.record(STAGE_EMBEDDING, t0);
                match verdict {
                    Ok(Ok(verdict)) => {
                        extra_codes.extend(verdict.code_candidates.clone());
                        if let Some(vote) = &verdict.vote {
                            let layer1_supporting = classification
                                .strategy_results
                                .iter()
                                .filter(|r| {
                                    r.primary_industry_id
                                        == Some(classification.primary_industry_id)
                                })
                                .map(|r| r.supporting_keywords.len())
                                .sum::<usize>();
                            if vote.industry_id != classification.primary_industry_id
                                && blend_layers(current_confidence, layer1_supporting, vote)
                                    == Layer2Decision::AdoptLayer2
                            {
                                adopt_industry(
                                    state,
                                    &mut classification,
                                    vote.industry_id,
                                    vote.confidence,
                                )
                                .await;
                                current_confidence = vote.confidence;
                                factors.push(ExplanationFactor {
                                    factor: "embedding_vote".to_string(),
                                    detail: format!("similarity {:.2}", vote.confidence),
                                });
                            } else if vote.industry_id == classification.primary_industry_id {
                                current_confidence = current_confidence.max(vote.confidence);
                                factors.push(ExplanationFactor {
                                    factor: "embedding_agreement".to_string(),
                                    detail: format!("similarity {:.2}", vote.confidence),
                                });
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        warn!(request_id = %request.request_id, error = %e, "embedding layer unavailable, continuing");
                        metadata.error_kind = Some("upstream_unavailable".to_string());
                    }
                    Err(_) => {
                        warn!(request_id = %request.request_id, "embedding layer timed out, continuing");
                        metadata.error_kind = Some("upstream_unavailable".to_string());
                    }
                }
            }
        }

        // ── Stage 5: external ML escalation ────────────────────────────
        let generic = classification.primary_industry_name == crate::classify::GENERIC_INDUSTRY_NAME;
        if current_confidence < state.config.classify.ml_invocation_threshold || generic {
            match &state.ml {
                Some(client) => {
                    let b = budget(deadline, ML_CAP, &mut metadata);
                    let t0 = Instant::now();
                    let outcome = client
                        .classify(
                            &request.business_name,
                            request.description.as_deref(),
                            content.as_ref().map(|c| c.plain_text.as_str()),
                            b.deadline,
                        )
                        .await;
                    timer.record(STAGE_ML, t0);
                    match outcome {
                        MlOutcome::Classified(response) => {
                            for suggestion in &response.codes {
                                extra_codes.push(CodeCandidate {
                                    code: suggestion.code.clone(),
                                    code_type: suggestion.code_type,
                                    description: suggestion.description.clone(),
                                    confidence: response.confidence.min(0.9),
                                    sources: BTreeSet::from([CodeSourceKind::MlMatch]),
                                    industry_id: None,
                                    low_confidence: false,
                                });
                            }
                            if should_override(current_confidence, response.confidence) {
                                if let Some(industry_id) =
                                    resolve_industry_by_name(state, &response.primary_industry)
                                        .await
                                {
                                    adopt_industry(
                                        state,
                                        &mut classification,
                                        industry_id,
                                        response.confidence,
                                    )
                                    .await;
                                    current_confidence = response.confidence;
                                    metadata.ml_override = true;
                                    method = ClassificationMethod::MlDominant;
                                    factors.push(ExplanationFactor {
                                        factor: "ml_override".to_string(),
                                        detail: format!(
                                            "{} ({:.2})",
                                            response.primary_industry, response.confidence
                                        ),
                                    });
                                } else {
                                    warn!(
                                        industry = %response.primary_industry,
                                        "ml industry unknown to repository, keeping current"
                                    );
                                }
                            }
                        }
                        MlOutcome::Skipped(reason) => {
                            metadata.ml_skipped_reason = Some(reason.as_str().to_string());
                            metrics::record_ml_skip(reason.as_str());
                        }
                        MlOutcome::Failed(message) => {
                            warn!(request_id = %request.request_id, %message, "ml escalation failed, continuing");
                            metadata.error_kind = Some("upstream_unavailable".to_string());
                        }
                    }
                }
                None => {
                    metadata.ml_skipped_reason =
                        Some(MlSkipReason::NotConfigured.as_str().to_string());
                }
            }
        }
    }

    // ── Stage 6: code generation ───────────────────────────────────────
    let b = budget(deadline, CODES_CAP, &mut metadata);
    let t0 = Instant::now();
    let codes = tokio::time::timeout_at(
        b.deadline.instant(),
        state.codes.generate(
            classification.primary_industry_id,
            current_confidence.clamp(0.0, 1.0),
            &keywords,
            &extra_codes,
        ),
    )
    .await
    .map_err(|_| ClassifyError::Timeout { stage: STAGE_CODES })?
    .map_err(|e| ClassifyError::Internal(format!("code generation failed: {e}")))?;
    timer.record(STAGE_CODES, t0);

    // Factor 3: codes agreeing with the chosen industry.
    let matching_codes = codes
        .values()
        .flatten()
        .filter(|c| c.industry_id == Some(classification.primary_industry_id))
        .count();
    let (calibrated, code_factor) =
        calibrate::apply_code_agreement(current_confidence, matching_codes);
    factors.push(ExplanationFactor {
        factor: "code_agreement".to_string(),
        detail: format!("{code_factor:.2}"),
    });
    let final_confidence = calibrate::finalize(calibrated);

    classification.confidence = final_confidence;
    classification.explanation.factors.extend(factors);
    classification.explanation.summary_text = summary_text(
        &classification.primary_industry_name,
        final_confidence,
        method,
        &metadata,
    );

    metadata.processing_time_ms = started.elapsed().as_millis() as u64;
    metadata.stage_timings = timer.timings;

    let result = ClassificationResult {
        request_id: request.request_id.clone(),
        classification,
        codes,
        metadata,
        confidence_score: final_confidence,
        cached_at: chrono::Utc::now(),
    };

    state.cache.store(fp, &result).await;
    state.publish_breaker_metrics();
    info!(
        request_id = %request.request_id,
        industry = %result.classification.primary_industry_name,
        confidence = final_confidence,
        early_exit = result.metadata.early_exit,
        elapsed_ms = result.metadata.processing_time_ms,
        "classification complete"
    );
    Ok(result)
}

fn classification_method(classification: &BlendedClassification) -> ClassificationMethod {
    let survivors: Vec<&StrategyResult> = classification
        .strategy_results
        .iter()
        .filter(|r| r.primary_industry_id.is_some())
        .collect();
    if survivors.len() == 1 && survivors[0].strategy == StrategyName::Keyword {
        ClassificationMethod::KeywordDominant
    } else {
        ClassificationMethod::MultiStrategy
    }
}

/// The explanation's supporting keywords must overlap the winner's
/// canonical keyword set; zero overlap lowers confidence and logs
/// `keyword_industry_mismatch`.
async fn keyword_overlap(state: &Arc<AppState>, classification: &BlendedClassification) -> bool {
    let supporting: Vec<&String> = classification
        .strategy_results
        .iter()
        .filter(|r| r.primary_industry_id == Some(classification.primary_industry_id))
        .flat_map(|r| r.supporting_keywords.iter())
        .collect();
    if supporting.is_empty() {
        return true;
    }
    let canonical = match state
        .repository
        .search_keywords_by_industry(classification.primary_industry_id)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, "canonical keyword lookup failed, skipping mismatch check");
            return true;
        }
    };
    if canonical.is_empty() {
        return true;
    }
    supporting.iter().any(|s| {
        canonical
            .iter()
            .any(|c| c.term == **s || c.term.split(' ').any(|w| w == *s))
    })
}

async fn resolve_industry_by_name(state: &Arc<AppState>, name: &str) -> Option<IndustryId> {
    let needle = name.trim().to_lowercase();
    let industries = state.repository.list_industries().await.ok()?;
    industries
        .iter()
        .find(|i| {
            i.name.to_lowercase() == needle
                || i.aliases.iter().any(|a| a.to_lowercase() == needle)
        })
        .map(|i| i.industry_id)
}

async fn adopt_industry(
    state: &Arc<AppState>,
    classification: &mut BlendedClassification,
    industry_id: IndustryId,
    confidence: f64,
) {
    let previous = SecondaryIndustry {
        industry_id: classification.primary_industry_id,
        name: classification.primary_industry_name.clone(),
        score: classification.confidence,
    };
    let name = state
        .repository
        .get_industry(industry_id)
        .await
        .ok()
        .flatten()
        .map(|i| i.name)
        .unwrap_or_else(|| format!("industry-{industry_id}"));
    classification.primary_industry_id = industry_id;
    classification.primary_industry_name = name;
    classification.confidence = confidence;
    classification
        .secondary_industries
        .retain(|s| s.industry_id != industry_id);
    classification.secondary_industries.insert(0, previous);
    classification.secondary_industries.truncate(3);
}

async fn fallback_classification(
    state: &Arc<AppState>,
) -> Result<BlendedClassification, ClassifyError> {
    let industries = state
        .repository
        .list_industries()
        .await
        .map_err(|e| ClassifyError::Internal(format!("industry lookup failed: {e}")))?;
    let generic = industries
        .iter()
        .find(|i| i.name == crate::classify::GENERIC_INDUSTRY_NAME)
        .or_else(|| industries.first())
        .ok_or_else(|| ClassifyError::Internal("no industries configured".to_string()))?;
    Ok(BlendedClassification {
        primary_industry_id: generic.industry_id,
        primary_industry_name: generic.name.clone(),
        confidence: NO_SIGNAL_CONFIDENCE,
        secondary_industries: vec![],
        strategy_results: vec![],
        explanation: Explanation {
            factors: vec![ExplanationFactor {
                factor: "no_signal".to_string(),
                detail: "no strategy produced a candidate".to_string(),
            }],
            summary_text: String::new(),
        },
    })
}

fn summary_text(
    industry: &str,
    confidence: f64,
    method: ClassificationMethod,
    metadata: &ResultMetadata,
) -> String {
    let method_name = match method {
        ClassificationMethod::MultiStrategy => "multi-strategy blend",
        ClassificationMethod::MlDominant => "external ML classifier",
        ClassificationMethod::KeywordDominant => "keyword analysis",
    };
    let mut summary = format!("Classified as {industry} ({confidence:.2}) via {method_name}");
    if metadata.early_exit {
        summary.push_str("; high-confidence early exit");
    }
    if let Some(fallback) = &metadata.fallback_used {
        summary.push_str(&format!("; fallback: {fallback}"));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_failures_map_back_to_error_kinds() {
        let cases = [
            ("invalid_request", "invalid_request"),
            ("timeout", "timeout"),
            ("dependency_failure", "dependency_failure"),
            ("rate_limited", "rate_limited"),
            ("overloaded", "overloaded"),
            ("internal", "internal"),
            ("unknown_kind", "internal"),
        ];
        for (kind, expected) in cases {
            let err = shared_to_error(SharedFailure {
                kind: kind.to_string(),
                message: "m".to_string(),
            });
            assert_eq!(err.kind(), expected);
        }
    }

    #[test]
    fn summary_mentions_early_exit_and_fallback() {
        let mut metadata = ResultMetadata {
            early_exit: true,
            ..Default::default()
        };
        let s = summary_text("Restaurants", 0.9, ClassificationMethod::MultiStrategy, &metadata);
        assert!(s.contains("Restaurants"));
        assert!(s.contains("early exit"));

        metadata.early_exit = false;
        metadata.fallback_used = Some("description_only".to_string());
        let s = summary_text("Technology", 0.7, ClassificationMethod::KeywordDominant, &metadata);
        assert!(s.contains("description_only"));
    }
}
