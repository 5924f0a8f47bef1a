//! HTTP responses: the 429 contract and API errors

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use ratelimit::RateLimitDecision;
use serde::Serialize;
use serde_json::json;
use shared::{GovernanceError, InvalidFilterError, RateLimitExceededError};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitBody {
    error: &'static str,
    message: String,
    retry_after: u64,
    reset_at: i64,
}

/// Add `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    for (name, value) in decision.headers() {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
            headers.insert(name, value);
        }
    }
}

/// 429 response for a rejecting decision
pub fn rate_limited_response(decision: &RateLimitDecision, now_ms: i64) -> Response {
    too_many_requests(decision, decision.retry_after_secs(now_ms))
}

fn too_many_requests(decision: &RateLimitDecision, retry_after: u64) -> Response {
    let body = RateLimitBody {
        error: "rate_limit_exceeded",
        message: format!("Too many requests. Try again in {retry_after} seconds."),
        retry_after,
        reset_at: decision.reset_at_epoch_ms,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    apply_rate_limit_headers(response.headers_mut(), decision);
    response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

/// Errors returned by gateway handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Role '{0}' may not read the audit trail")]
    Forbidden(String),

    #[error(transparent)]
    InvalidFilter(#[from] InvalidFilterError),

    #[error(transparent)]
    RateLimited(#[from] RateLimitExceededError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Service temporarily unavailable")]
    Unavailable,
}

impl From<GovernanceError> for ApiError {
    fn from(err: GovernanceError) -> Self {
        match err {
            GovernanceError::InvalidFilter(e) => ApiError::InvalidFilter(e),
            GovernanceError::RateLimitExceeded(e) => ApiError::RateLimited(e),
            other => {
                error!(error = %other, "Governance backend failure");
                ApiError::Unavailable
            }
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidFilter(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::InvalidFilter(_) => "invalid_filter",
            ApiError::RateLimited(_) => "rate_limit_exceeded",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unavailable => "unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::RateLimited(e) = &self {
            let decision = RateLimitDecision {
                allowed: false,
                limit: e.limit,
                remaining: 0,
                reset_at_epoch_ms: e.reset_at_ms,
            };
            return too_many_requests(&decision, e.retry_after_secs);
        }

        let body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
