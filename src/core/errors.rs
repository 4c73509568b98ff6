use crate::core::types::ErrorEnvelope;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

/// Stable error taxonomy surfaced in logs and `metadata.error_kind`.
///
/// `UpstreamUnavailable` never reaches a response on its own: the pipeline
/// degrades and records it in metadata instead. It exists here so client
/// modules classify their failures exactly once.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("deadline exceeded in stage `{stage}`")]
    Timeout { stage: &'static str },

    #[error("all scraping strategies failed: {summary}")]
    DependencyFailure { summary: String },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("server overloaded")]
    Overloaded,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ClassifyError {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifyError::InvalidRequest(_) => "invalid_request",
            ClassifyError::Timeout { .. } => "timeout",
            ClassifyError::DependencyFailure { .. } => "dependency_failure",
            ClassifyError::UpstreamUnavailable(_) => "upstream_unavailable",
            ClassifyError::RateLimited(_) => "rate_limited",
            ClassifyError::Overloaded => "overloaded",
            ClassifyError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ClassifyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ClassifyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ClassifyError::DependencyFailure { .. } => StatusCode::BAD_GATEWAY,
            ClassifyError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ClassifyError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ClassifyError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            ClassifyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_envelope(self, request_id: Option<String>) -> (StatusCode, ErrorEnvelope) {
        let status = self.status();
        let envelope = ErrorEnvelope {
            error_kind: self.kind().to_string(),
            message: self.to_string(),
            request_id,
        };
        (status, envelope)
    }
}

impl IntoResponse for ClassifyError {
    fn into_response(self) -> Response {
        let (status, envelope) = self.into_envelope(None);
        (status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(ClassifyError::Overloaded.kind(), "overloaded");
        assert_eq!(
            ClassifyError::Timeout { stage: "scrape" }.kind(),
            "timeout"
        );
        assert_eq!(
            ClassifyError::InvalidRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ClassifyError::DependencyFailure { summary: "x".into() }.status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ClassifyError::RateLimited("ml".into()).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
