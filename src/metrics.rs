//! Prometheus metric families exposed on `GET /metrics`.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

pub const CLASSIFY_REQUESTS_TOTAL: &str = "classify_requests_total";
pub const CLASSIFY_DURATION_SECONDS: &str = "classify_duration_seconds";
pub const SCRAPE_STRATEGY_TOTAL: &str = "scrape_strategy_total";
pub const CIRCUIT_BREAKER_STATE: &str = "circuit_breaker_state";
pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
pub const ML_SKIPPED_REASON_TOTAL: &str = "ml_skipped_reason_total";

pub fn describe_metrics() {
    describe_counter!(
        CLASSIFY_REQUESTS_TOTAL,
        "Classification requests by outcome status"
    );
    describe_histogram!(
        CLASSIFY_DURATION_SECONDS,
        "Per-stage classification latency in seconds"
    );
    describe_counter!(
        SCRAPE_STRATEGY_TOTAL,
        "Scrape strategy attempts by strategy and outcome"
    );
    describe_gauge!(
        CIRCUIT_BREAKER_STATE,
        "Circuit breaker state per service (0=closed, 1=open, 2=half-open)"
    );
    describe_counter!(CACHE_HITS_TOTAL, "Cache hits by tier");
    describe_counter!(
        ML_SKIPPED_REASON_TOTAL,
        "ML escalation skips by reason"
    );
}

pub fn record_request(status: &'static str) {
    counter!(CLASSIFY_REQUESTS_TOTAL, 1, "status" => status);
}

pub fn record_stage_duration(stage: &'static str, seconds: f64) {
    histogram!(CLASSIFY_DURATION_SECONDS, seconds, "stage" => stage);
}

pub fn record_scrape_attempt(strategy: &'static str, outcome: &'static str) {
    counter!(SCRAPE_STRATEGY_TOTAL, 1, "strategy" => strategy, "outcome" => outcome);
}

pub fn record_breaker_state(service: &'static str, state: f64) {
    gauge!(CIRCUIT_BREAKER_STATE, state, "service" => service);
}

pub fn record_cache_hit(tier: &'static str) {
    counter!(CACHE_HITS_TOTAL, 1, "tier" => tier);
}

pub fn record_ml_skip(reason: &'static str) {
    counter!(ML_SKIPPED_REASON_TOTAL, 1, "reason" => reason);
}
