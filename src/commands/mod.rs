//! HTTP commands exposed by the service

pub mod billing;
pub mod staging;

#[cfg(test)]
mod tests;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::ai::{ImageGenerator, LayoutAnalyzer};
use crate::billing::{CookieDirective, CookieSettings, GovernanceOutcome, Governor};
use crate::error::StagingError;
use crate::rate_limit::RateLimiter;
use crate::staging::RoomConstraintComposer;

/// Everything a request handler needs, shared across requests
pub struct AppState {
    pub governor: Arc<Governor>,
    pub rate_limiter: Arc<RateLimiter>,
    pub composer: RoomConstraintComposer,
    pub generator: Arc<dyn ImageGenerator>,
    pub analyzer: Arc<dyn LayoutAnalyzer>,
    pub cookie: CookieSettings,
    pub admin_api_key: Option<String>,
    pub layout_timeout: Duration,
    pub max_image_bytes: usize,
}

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    // Base64 inflates by 4/3 and a mask may ride along
    let body_limit = state.max_image_bytes.saturating_mul(3);

    Router::new()
        .route("/health", get(billing::health))
        .route("/api/generate-staged-room", post(staging::generate_staged_room))
        .route("/api/usage-status", get(billing::usage_status))
        .route("/api/check-token", get(billing::check_token))
        .route("/api/access-tokens", post(billing::issue_access_token))
        .route("/api/entitlements/:token_id", get(billing::get_entitlement))
        .route("/api/entitlements/:token_id/credits", post(billing::grant_credits))
        .route("/api/usage/reset", post(billing::reset_usage))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Run ledger work off the async workers; SQLite calls block
pub async fn run_blocking<T, F>(f: F) -> Result<T, StagingError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StagingError::Internal(format!("Blocking task failed: {}", e)))
}

/// First `X-Forwarded-For` hop, else the socket peer
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Admin routes are disabled entirely when no key is configured
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), StagingError> {
    let expected = state.admin_api_key.as_deref().ok_or(StagingError::Unauthorized)?;
    let provided = headers
        .get("x-admin-key")
        .and_then(|value| value.to_str().ok())
        .ok_or(StagingError::Unauthorized)?;

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        warn!("Rejected admin request with a bad key");
        Err(StagingError::Unauthorized)
    }
}

/// Attach a cookie directive to a response
pub fn with_cookie(
    mut response: Response,
    directive: Option<CookieDirective>,
    settings: &CookieSettings,
) -> Response {
    let Some(directive) = directive else {
        return response;
    };
    match HeaderValue::from_str(&directive.to_header_value(settings)) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => warn!(error = %e, "Could not encode Set-Cookie header"),
    }
    response
}

/// Render a governance outcome
pub fn respond(outcome: GovernanceOutcome, settings: &CookieSettings) -> Response {
    let response = (outcome.status, Json(outcome.body)).into_response();
    with_cookie(response, outcome.cookie, settings)
}
