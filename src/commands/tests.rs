//! Request-flow scenarios for the staging endpoint

use super::*;
use crate::ai::vision::tests::png_base64;
use crate::ai::{
    AnalyzerError, DecodedImage, GeneratedImage, GenerationError, GenerationRequest,
    LayoutConstraints,
};
use crate::billing::{
    CookieDirective, DefaultGrants, GovernanceConfig, InMemoryIpUsage, PlanId, Quality,
    TokenCodec, UsageStore,
};
use crate::commands::staging::{stage_room, StageRoomRequest};
use async_trait::async_trait;
use axum::http::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const SECRET: &[u8] = b"scenario-test-secret-0123456789abcdef";
const NOW: i64 = 1_700_000_000;
const IP: &str = "198.51.100.20";

#[derive(Default)]
struct FakeGenerator {
    calls: AtomicUsize,
    fail: bool,
    prompts: Mutex<Vec<String>>,
    qualities: Mutex<Vec<Quality>>,
}

#[async_trait]
impl ImageGenerator for FakeGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<GeneratedImage, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        self.qualities.lock().unwrap().push(request.quality);
        if self.fail {
            return Err(GenerationError::Api {
                status: 503,
                body: "upstream unavailable".into(),
            });
        }
        Ok(GeneratedImage {
            image_url: "https://cdn.example.com/staged.png".into(),
        })
    }
}

enum FakeAnalyzer {
    Returns(LayoutConstraints),
    Fails,
}

#[async_trait]
impl LayoutAnalyzer for FakeAnalyzer {
    async fn analyze(&self, _: &DecodedImage, _: &str) -> Result<LayoutConstraints, AnalyzerError> {
        match self {
            FakeAnalyzer::Returns(constraints) => Ok(constraints.clone()),
            FakeAnalyzer::Fails => Err(AnalyzerError::Parse("not json".into())),
        }
    }
}

struct Harness {
    state: Arc<AppState>,
    generator: Arc<FakeGenerator>,
}

fn harness_with(
    governance: GovernanceConfig,
    generator: FakeGenerator,
    analyzer: FakeAnalyzer,
    max_requests: usize,
) -> Harness {
    let generator = Arc::new(generator);
    let governor = Governor::new(
        TokenCodec::new(SECRET).unwrap(),
        Arc::new(InMemoryIpUsage::new()),
        Arc::new(UsageStore::open_in_memory(DefaultGrants::default()).unwrap()),
        governance,
    );
    let state = AppState {
        governor: Arc::new(governor),
        rate_limiter: Arc::new(RateLimiter::new(max_requests, Duration::from_secs(60))),
        composer: RoomConstraintComposer::default(),
        generator: generator.clone(),
        analyzer: Arc::new(analyzer),
        cookie: CookieSettings::default(),
        admin_api_key: Some("admin-secret".into()),
        layout_timeout: Duration::from_secs(5),
        max_image_bytes: 1024 * 1024,
    };
    Harness {
        state: Arc::new(state),
        generator,
    }
}

fn harness() -> Harness {
    harness_with(
        GovernanceConfig::default(),
        FakeGenerator::default(),
        FakeAnalyzer::Returns(LayoutConstraints::default()),
        100,
    )
}

fn request(room_type: &str) -> StageRoomRequest {
    StageRoomRequest {
        image: format!("data:image/png;base64,{}", png_base64(32, 24)),
        room_type: room_type.into(),
        mask: None,
    }
}

async fn stage(h: &Harness, cookie: Option<&str>) -> GovernanceOutcome {
    stage_room(&h.state, cookie, IP, request("living room"), NOW)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_anonymous_free_tier_then_upgrade() {
    let h = harness();

    let first = stage(&h, None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["usage"]["usageCount"], 1);
    assert_eq!(first.body["usage"]["remaining"], 1);

    let second = stage(&h, None).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["usage"]["remaining"], 0);

    let third = stage(&h, None).await;
    assert!(third.handled);
    assert_eq!(third.status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(third.body["redirect"], "/upgrade");
    assert!(third.body["usage"]["usageCount"].as_u64().unwrap() <= 3);

    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_success_body_shape() {
    let h = harness();
    let outcome = stage(&h, None).await;

    assert_eq!(outcome.body["success"], true);
    assert_eq!(outcome.body["imageUrl"], "https://cdn.example.com/staged.png");
    assert_eq!(outcome.body["promptHash"].as_str().unwrap().len(), 16);
    assert_eq!(outcome.body["roomType"], "living room");
    assert_eq!(outcome.body["profile"], "standard");
    assert_eq!(outcome.body["isConstrained"], false);
    assert!(uuid::Uuid::parse_str(outcome.body["requestId"].as_str().unwrap()).is_ok());
    assert_eq!(h.generator.qualities.lock().unwrap()[0], Quality::Standard);
}

#[tokio::test]
async fn test_last_paid_use_then_ip_governance() {
    let h = harness();
    let codec = TokenCodec::new(SECRET).unwrap();
    let issued = h.state.governor.issue_for_plan("pack-10", NOW).unwrap();
    let mut payload = issued.payload.clone();
    payload.uses_left = 1;
    let token = codec.sign(&payload, NOW).unwrap();

    let outcome = stage(&h, Some(&token)).await;
    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(outcome.body["accessToken"]["usageLeft"], 0);
    assert_eq!(h.generator.qualities.lock().unwrap()[0], Quality::Hd);

    let Some(CookieDirective::Set { token: reissued, .. }) = outcome.cookie else {
        panic!("expected the re-issued token in the cookie");
    };
    let next = codec.verify_token_at(&reissued, NOW).unwrap();
    assert_eq!(next.uses_left, 0);
    assert_eq!(next.plan_id, PlanId::Pack10);
    assert_eq!(next.jti, issued.payload.jti);

    // Exhausted token: governed by IP and the cookie gets cleared
    let follow_up = stage(&h, Some(&reissued)).await;
    assert_eq!(follow_up.status, StatusCode::OK);
    assert_eq!(follow_up.body["usage"]["usageCount"], 1);
    assert_eq!(follow_up.cookie, Some(CookieDirective::Clear));
}

#[tokio::test]
async fn test_failed_generation_does_not_spend_paid_use() {
    let h = harness_with(
        GovernanceConfig::default(),
        FakeGenerator {
            fail: true,
            ..Default::default()
        },
        FakeAnalyzer::Returns(LayoutConstraints::default()),
        100,
    );
    let issued = h.state.governor.issue_for_plan("pack-5", NOW).unwrap();
    let jti = issued.payload.jti.clone().unwrap();

    let outcome = stage(&h, Some(&issued.token)).await;
    assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(outcome.body["success"], false);
    assert!(!outcome.body["error"].as_str().unwrap().contains("upstream"));
    assert!(outcome.cookie.is_none());

    let row = h.state.governor.ledger().get_usage_entitlement(&jti).unwrap().unwrap();
    assert_eq!(row.paid_used, 0);
    assert_eq!(row.paid_granted, 5);
}

#[tokio::test]
async fn test_failed_generation_still_counts_anonymous_attempt() {
    let h = harness_with(
        GovernanceConfig::default(),
        FakeGenerator {
            fail: true,
            ..Default::default()
        },
        FakeAnalyzer::Returns(LayoutConstraints::default()),
        100,
    );
    stage(&h, None).await;
    stage(&h, None).await;
    let third = stage(&h, None).await;
    assert_eq!(third.status, StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn test_malformed_image_is_bad_request() {
    let h = harness();
    let mut bad = request("bedroom");
    bad.image = "data:image/png;base64,@@@not-base64@@@".into();

    let outcome = stage_room(&h.state, None, IP, bad, NOW).await.unwrap();
    assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
    assert_eq!(outcome.body["success"], false);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.state.governor.ip_usage().get(IP), 1);
}

#[tokio::test]
async fn test_malformed_mask_is_bad_request() {
    let h = harness();
    let mut bad = request("bedroom");
    bad.mask = Some("not an image".into());

    let outcome = stage_room(&h.state, None, IP, bad, NOW).await.unwrap();
    assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analyzer_failure_degrades_to_unconstrained_prompt() {
    let h = harness_with(
        GovernanceConfig::default(),
        FakeGenerator::default(),
        FakeAnalyzer::Fails,
        100,
    );
    let outcome = stage(&h, None).await;
    assert_eq!(outcome.status, StatusCode::OK);
    let prompts = h.generator.prompts.lock().unwrap();
    assert!(prompts[0].contains("no analysis available"));
}

#[tokio::test]
async fn test_layout_analysis_drives_profile() {
    let h = harness_with(
        GovernanceConfig::default(),
        FakeGenerator::default(),
        FakeAnalyzer::Returns(LayoutConstraints {
            notes: vec!["powder room with limited space".into()],
            ..Default::default()
        }),
        100,
    );
    let outcome = stage_room(&h.state, None, IP, request("powder room"), NOW)
        .await
        .unwrap();
    assert_eq!(outcome.body["roomType"], "bathroom");
    assert_eq!(outcome.body["profile"], "standard");
    assert_eq!(outcome.body["isConstrained"], true);
    assert!(h.generator.prompts.lock().unwrap()[0].contains("BATHROOM (constrained profile)"));
}

#[tokio::test]
async fn test_unlimited_mode_bypasses_everything() {
    let h = harness_with(
        GovernanceConfig {
            free_limit: 2,
            limits_disabled: true,
        },
        FakeGenerator::default(),
        FakeAnalyzer::Returns(LayoutConstraints::default()),
        100,
    );
    for _ in 0..5 {
        let outcome = stage(&h, None).await;
        assert_eq!(outcome.status, StatusCode::OK);
        assert_eq!(outcome.body["usage"]["status"], "unlimited");
    }
    assert_eq!(h.state.governor.ip_usage().get(IP), 0);
}

#[tokio::test]
async fn test_burst_rate_limit_returns_retry_after() {
    let h = harness_with(
        GovernanceConfig {
            free_limit: 100,
            limits_disabled: false,
        },
        FakeGenerator::default(),
        FakeAnalyzer::Returns(LayoutConstraints::default()),
        2,
    );
    stage(&h, None).await;
    stage(&h, None).await;

    let err = stage_room(&h.state, None, IP, request("kitchen"), NOW)
        .await
        .unwrap_err();
    assert!(matches!(err, StagingError::RateLimited { .. }));
    assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    // Rejected before the free-tier counter
    assert_eq!(h.state.governor.ip_usage().get(IP), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_anonymous_requests_cannot_exceed_allowance() {
    let h = harness();
    let mut handles = Vec::new();
    for _ in 0..10 {
        let state = h.state.clone();
        handles.push(tokio::spawn(async move {
            stage_room(&state, None, IP, request("bedroom"), NOW)
                .await
                .unwrap()
                .status
        }));
    }

    let mut ok = 0;
    let mut denied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::PAYMENT_REQUIRED => denied += 1,
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(ok, 2);
    assert_eq!(denied, 8);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_replayed_cookie_spends_only_purchased_uses() {
    let h = harness();
    let issued = h.state.governor.issue_for_plan("pack-5", NOW).unwrap();
    let jti = issued.payload.jti.clone().unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let state = h.state.clone();
        let token = issued.token.clone();
        handles.push(tokio::spawn(async move {
            stage_room(&state, Some(&token), IP, request("bedroom"), NOW)
                .await
                .unwrap()
        }));
    }

    let mut paid = 0;
    let mut free = 0;
    let mut denied = 0;
    for handle in handles {
        let outcome = handle.await.unwrap();
        match outcome.status {
            StatusCode::OK if outcome.body.get("accessToken").is_some() => paid += 1,
            StatusCode::OK => free += 1,
            StatusCode::PAYMENT_REQUIRED => denied += 1,
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!((paid, free, denied), (5, 2, 3));

    let row = h.state.governor.ledger().get_usage_entitlement(&jti).unwrap().unwrap();
    assert_eq!((row.paid_granted, row.paid_used), (5, 5));
}

#[tokio::test]
async fn test_run_blocking_returns_closure_value() {
    let h = harness();
    let governor = Arc::clone(&h.state.governor);
    let row = run_blocking(move || governor.ledger().get_or_create_usage_entitlement("tok"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.token_id, "tok");
    assert_eq!(row.total_remaining(), 0);
}

#[test]
fn test_client_ip_prefers_forwarded_header() {
    let peer: SocketAddr = "10.0.0.1:5555".parse().unwrap();
    let mut headers = HeaderMap::new();
    assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.1");

    headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.9 , 10.0.0.2"));
    assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.9");

    headers.insert("x-forwarded-for", HeaderValue::from_static(""));
    assert_eq!(client_ip(&headers, None), "unknown");
}

#[test]
fn test_require_admin() {
    let h = harness();
    let mut headers = HeaderMap::new();
    assert!(require_admin(&h.state, &headers).is_err());

    headers.insert("x-admin-key", HeaderValue::from_static("wrong"));
    assert!(require_admin(&h.state, &headers).is_err());

    headers.insert("x-admin-key", HeaderValue::from_static("admin-secret"));
    assert!(require_admin(&h.state, &headers).is_ok());
}

#[tokio::test]
async fn test_respond_writes_status_body_and_cookie() {
    let outcome = GovernanceOutcome {
        handled: false,
        status: StatusCode::OK,
        body: serde_json::json!({ "success": true }),
        cookie: Some(CookieDirective::Clear),
    };
    let response = respond(outcome, &CookieSettings::default());
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("access_token=;"));
    assert!(cookie.contains("Max-Age=0"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], true);
}
