//! `POST /api/generate-staged-room`

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{client_ip, respond, run_blocking, AppState, SharedState};
use crate::ai::{analyze_with_fallback, decode_upload, GenerationRequest};
use crate::billing::{read_cookie, GateDecision, GovernanceOutcome, Quality, ACCESS_TOKEN_COOKIE};
use crate::error::StagingError;
use crate::staging::normalize_room_type;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRoomRequest {
    pub image: String,
    #[serde(default)]
    pub room_type: String,
    #[serde(default)]
    pub mask: Option<String>,
}

pub async fn generate_staged_room(
    State(state): State<SharedState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<StageRoomRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => return StagingError::BadRequest(rejection.body_text()).into_response(),
    };
    let ip = client_ip(&headers, Some(peer));
    let cookie = read_cookie(&headers, ACCESS_TOKEN_COOKIE);

    match stage_room(&state, cookie.as_deref(), &ip, request, Utc::now().timestamp()).await {
        Ok(outcome) => respond(outcome, &state.cookie),
        Err(e) => e.into_response(),
    }
}

/// Run one staging request through the full governance chain
///
/// Only a burst rate-limit rejection or a lost blocking task comes back as
/// `Err`; every other outcome, failures included, has passed through
/// `finalize` so cookie hygiene and consumption rules apply uniformly.
pub async fn stage_room(
    state: &AppState,
    cookie: Option<&str>,
    client_ip: &str,
    request: StageRoomRequest,
    now: i64,
) -> Result<GovernanceOutcome, StagingError> {
    let mut ctx = state.governor.check_token(cookie, client_ip, now);

    let rate_key = match ctx.access.as_ref().and_then(|p| p.jti.as_deref()) {
        Some(jti) => format!("token:{}", jti),
        None => format!("ip:{}", client_ip),
    };
    state
        .rate_limiter
        .check(&rate_key)
        .map_err(|retry_after| StagingError::RateLimited { retry_after })?;

    let governor = Arc::clone(&state.governor);
    let (ctx, decision) = run_blocking(move || {
        let decision = governor.access_gate(&mut ctx);
        (ctx, decision)
    })
    .await?;
    let source = match decision {
        GateDecision::Allow(source) => source,
        GateDecision::Deny(outcome) => return Ok(outcome),
    };
    debug!(ip = client_ip, source = ?source, "Staging request admitted");

    let quality = ctx
        .access
        .as_ref()
        .map(|payload| payload.quality)
        .unwrap_or(Quality::Standard);

    let (status, body) = match generate(state, &request, quality).await {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (e.status_code(), e.body()),
    };

    let governor = Arc::clone(&state.governor);
    run_blocking(move || governor.finalize(&ctx, status, body, now)).await
}

async fn generate(
    state: &AppState,
    request: &StageRoomRequest,
    quality: Quality,
) -> Result<Value, StagingError> {
    let image = decode_upload(&request.image, state.max_image_bytes)?;
    let mask = request
        .mask
        .as_deref()
        .filter(|mask| !mask.trim().is_empty())
        .map(|mask| decode_upload(mask, state.max_image_bytes))
        .transpose()?;

    let room_type = normalize_room_type(&request.room_type);
    let constraints = analyze_with_fallback(
        state.analyzer.as_ref(),
        &image,
        room_type.label(),
        state.layout_timeout,
    )
    .await;

    let staged = state.composer.compose(&request.room_type, &constraints);
    let request_id = Uuid::new_v4().to_string();
    let prompt_hash = staged.prompt_hash();
    info!(
        request_id = %request_id,
        room = %staged.room_type,
        tier = staged.assessment.tier().label(),
        prompt_hash = %prompt_hash,
        "Staging room"
    );

    let generated = state
        .generator
        .generate(GenerationRequest {
            prompt: &staged.prompt,
            image: &image,
            mask: mask.as_ref(),
            quality,
        })
        .await
        .map_err(|e| {
            error!(request_id = %request_id, error = %e, "Image generation failed");
            StagingError::from(e)
        })?;

    Ok(json!({
        "success": true,
        "imageUrl": generated.image_url,
        "requestId": request_id,
        "promptHash": prompt_hash,
        "roomType": staged.room_type.label(),
        "profile": staged.assessment.profile,
        "isConstrained": staged.assessment.is_constrained,
    }))
}
