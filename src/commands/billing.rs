//! Usage, token and entitlement commands

use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use super::{client_ip, require_admin, run_blocking, with_cookie, SharedState};
use crate::billing::{
    read_cookie, set_access_token_cookie, CookieDirective, UsageEntitlement, ACCESS_TOKEN_COOKIE,
};
use crate::error::StagingError;

/// Liveness plus the global bypass flag
pub async fn health(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "limitsDisabled": state.governor.config().limits_disabled,
    }))
}

/// Current entitlement snapshot for the caller
pub async fn usage_status(
    State(state): State<SharedState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let now = Utc::now().timestamp();
    let cookie = read_cookie(&headers, ACCESS_TOKEN_COOKIE);
    let ctx = state
        .governor
        .check_token(cookie.as_deref(), &client_ip(&headers, Some(peer)), now);

    let response = Json(state.governor.usage_status(&ctx, now)).into_response();
    with_cookie(
        response,
        ctx.clear_stale_cookie.then_some(CookieDirective::Clear),
        &state.cookie,
    )
}

/// Diagnostic view of the caller's access token
pub async fn check_token(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let now = Utc::now().timestamp();
    let cookie = read_cookie(&headers, ACCESS_TOKEN_COOKIE);
    // The IP is irrelevant to the token check
    let ctx = state.governor.check_token(cookie.as_deref(), "", now);
    Json(state.governor.token_check(&ctx)).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenRequest {
    pub plan_id: String,
}

/// Called by the checkout flow once a purchase completes
pub async fn issue_access_token(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<IssueTokenRequest>,
) -> Result<Response, StagingError> {
    require_admin(&state, &headers)?;

    let now = Utc::now().timestamp();
    let governor = Arc::clone(&state.governor);
    let issued = run_blocking(move || governor.issue_for_plan(&request.plan_id, now)).await??;
    let body = Json(json!({
        "success": true,
        "planId": issued.payload.plan_id,
        "expiresAt": issued.payload.expires_at,
        "usesLeft": issued.payload.uses_left,
    }));

    let directive = set_access_token_cookie(&issued.token, issued.payload.expires_at, now);
    Ok(with_cookie(body.into_response(), Some(directive), &state.cookie))
}

#[derive(Debug, Deserialize)]
pub struct GrantCreditsRequest {
    pub credits: u32,
}

pub async fn grant_credits(
    State(state): State<SharedState>,
    Path(token_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<GrantCreditsRequest>,
) -> Result<Json<UsageEntitlement>, StagingError> {
    require_admin(&state, &headers)?;
    if request.credits == 0 {
        return Err(StagingError::BadRequest("credits must be positive".into()));
    }

    let governor = Arc::clone(&state.governor);
    let credits = request.credits;
    let target = token_id.clone();
    let entitlement =
        run_blocking(move || governor.ledger().grant_paid_credits(&target, credits)).await??;
    info!(token_id = %token_id, credits, "Granted paid credits");
    Ok(Json(entitlement))
}

pub async fn get_entitlement(
    State(state): State<SharedState>,
    Path(token_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<UsageEntitlement>, StagingError> {
    require_admin(&state, &headers)?;
    let governor = Arc::clone(&state.governor);
    let lookup = token_id.clone();
    run_blocking(move || governor.ledger().get_usage_entitlement(&lookup))
        .await??
        .map(Json)
        .ok_or_else(|| StagingError::NotFound(format!("Entitlement {}", token_id)))
}

#[derive(Debug, Deserialize)]
pub struct ResetUsageRequest {
    pub ip: String,
}

pub async fn reset_usage(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<ResetUsageRequest>,
) -> Result<Json<serde_json::Value>, StagingError> {
    require_admin(&state, &headers)?;
    state.governor.ip_usage().reset(&request.ip);
    info!(ip = %request.ip, "Reset anonymous usage counter");
    Ok(Json(json!({ "success": true, "ip": request.ip })))
}
