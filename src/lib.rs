pub mod ai;
pub mod billing;
mod commands;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod staging;

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai::{HttpImageGenerator, VisionLayoutAnalyzer};
use billing::{Governor, InMemoryIpUsage, TokenCodec, TokenError, UsageStore, UsageStoreError};
use commands::AppState;
use config::{AppConfig, ConfigError};
use rate_limit::RateLimiter;
use staging::RoomConstraintComposer;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("token codec error: {0}")]
    Token(#[from] TokenError),
    #[error("usage database error: {0}")]
    Store(#[from] UsageStoreError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

fn build_state(config: &AppConfig) -> Result<AppState, StartupError> {
    let codec = TokenCodec::new(&config.token_secret)?;
    let ledger = UsageStore::open(&config.usage_db_path, config.ledger_defaults)?;
    let governor = Governor::new(
        codec,
        Arc::new(InMemoryIpUsage::new()),
        Arc::new(ledger),
        config.governance,
    );

    Ok(AppState {
        governor: Arc::new(governor),
        rate_limiter: Arc::new(RateLimiter::new(
            config.rate_limit_max_requests,
            config.rate_limit_window,
        )),
        composer: RoomConstraintComposer::default(),
        generator: Arc::new(HttpImageGenerator::new(config.generation.clone())),
        analyzer: Arc::new(VisionLayoutAnalyzer::new(config.vision.clone())),
        cookie: config.cookie.clone(),
        admin_api_key: config.admin_api_key.clone(),
        layout_timeout: config.layout_timeout,
        max_image_bytes: config.max_image_bytes,
    })
}

pub async fn run() -> Result<(), StartupError> {
    // Load .env file - current directory first, then the parent
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }

    // Default: warn for dependencies, info for our crate
    // Use RUST_LOG=roomstage_lib=debug for per-request governance logs
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,roomstage_lib=info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let state = Arc::new(build_state(&config)?);

    if config.governance.limits_disabled {
        tracing::warn!("Usage limits are disabled; every request is unlimited");
    }
    if config.admin_api_key.is_none() {
        info!("ADMIN_API_KEY not set, admin routes will reject every request");
    }

    rate_limit::spawn_cleanup_task(state.rate_limiter.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        db = %config.usage_db_path.display(),
        free_limit = config.governance.free_limit,
        "Staging service listening"
    );

    axum::serve(
        listener,
        commands::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
