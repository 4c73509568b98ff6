use crate::core::errors::ClassifyError;
use crate::core::types::*;
use crate::core::AppState;
use crate::orchestrator;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use futures::FutureExt;
use metrics_exporter_prometheus::PrometheusHandle;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

pub fn build_router(state: Arc<AppState>, prometheus: PrometheusHandle) -> Router {
    Router::new()
        .route("/api/v1/classify", post(classify))
        .route("/health", get(health))
        .route("/health/cache", get(cache_health))
        .route(
            "/metrics",
            get(move || {
                let handle = prometheus.clone();
                async move { handle.render() }
            }),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type ErrorReply = (StatusCode, Json<ErrorEnvelope>);

async fn classify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<ClassificationResult>, ErrorReply> {
    let request_id = request.request_id.clone();
    let outcome = AssertUnwindSafe(orchestrator::classify(&state, request))
        .catch_unwind()
        .await;
    match outcome {
        Ok(Ok(result)) => Ok(Json(result)),
        Ok(Err(e)) => {
            let (status, envelope) = e.into_envelope(request_id);
            Err((status, Json(envelope)))
        }
        Err(_) => {
            error!("panic captured at classify handler boundary");
            let e = ClassifyError::Internal("unexpected fault".to_string());
            let (status, envelope) = e.into_envelope(request_id);
            Err((status, Json(envelope)))
        }
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_s: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn cache_health(State(state): State<Arc<AppState>>) -> Json<CacheHealthResponse> {
    let health = state.cache.health().await;
    Json(CacheHealthResponse {
        cache_enabled: health.cache_enabled,
        redis_enabled: health.redis_enabled,
        redis_connected: health.redis_connected,
        in_memory_size: health.in_memory_size,
        healthy: health.healthy(),
    })
}
