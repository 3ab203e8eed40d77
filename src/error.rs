//! Request-facing error taxonomy

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::ai::{GenerationError, ImageError};
use crate::billing::{IssueError, UsageStoreError};

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("invalid image: {0}")]
    InvalidImage(#[from] ImageError),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("free usage limit reached")]
    QuotaExhausted,

    #[error("missing or invalid admin key")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("too many requests")]
    RateLimited { retry_after: Duration },

    #[error("image generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StagingError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidImage(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::QuotaExhausted => StatusCode::PAYMENT_REQUIRED,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Generation(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body; internal details stay in the logs
    pub fn body(&self) -> Value {
        match self {
            Self::InvalidImage(e) => json!({ "success": false, "error": format!("Invalid image: {}", e) }),
            Self::BadRequest(msg) => json!({ "success": false, "error": msg }),
            Self::QuotaExhausted => json!({
                "success": false,
                "error": "Free usage limit reached",
                "redirect": crate::billing::UPGRADE_REDIRECT,
            }),
            Self::Unauthorized => json!({ "success": false, "error": "Unauthorized" }),
            Self::NotFound(what) => json!({ "success": false, "error": format!("{} not found", what) }),
            Self::RateLimited { retry_after } => json!({
                "success": false,
                "error": "Too many requests. Please slow down.",
                "retryAfter": retry_after_secs(*retry_after),
            }),
            Self::Generation(_) => json!({
                "success": false,
                "error": "Image generation failed. Please try again.",
            }),
            Self::Internal(_) => json!({ "success": false, "error": "Internal server error" }),
        }
    }
}

/// Whole seconds, rounded up so clients never retry early
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

impl IntoResponse for StagingError {
    fn into_response(self) -> Response {
        let mut response = (self.status_code(), Json(self.body())).into_response();
        if let Self::RateLimited { retry_after } = self {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_secs(retry_after)),
            );
        }
        response
    }
}

impl From<UsageStoreError> for StagingError {
    fn from(err: UsageStoreError) -> Self {
        match err {
            UsageStoreError::EntitlementNotFound(id) => Self::NotFound(format!("Entitlement {}", id)),
            UsageStoreError::NoUsageRemaining(_) => Self::QuotaExhausted,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<IssueError> for StagingError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::UnknownPlan(plan) => Self::BadRequest(format!("Unknown plan: {}", plan)),
            IssueError::Token(e) => Self::Internal(e.to_string()),
            IssueError::Ledger(e) => e.into(),
        }
    }
}
