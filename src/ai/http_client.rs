//! Shared HTTP clients
//!
//! Lazily initialised, pooled clients for the external model APIs. Reusing one
//! client per provider keeps TLS sessions and TCP connections warm.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Client for the image generation API
///
/// Generation calls can take well over a minute, so the timeout is generous.
pub static GENERATION_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(180))
        .pool_max_idle_per_host(16)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
        .expect("Failed to create generation HTTP client")
});

/// Client for the layout analysis (vision) API
///
/// The analyzer runs under its own soft timeout; this is only an upper bound.
pub static VISION_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(16)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_nodelay(true)
        .build()
        .expect("Failed to create vision HTTP client")
});

#[inline]
pub fn generation_client() -> &'static Client {
    &GENERATION_CLIENT
}

#[inline]
pub fn vision_client() -> &'static Client {
    &VISION_CLIENT
}
