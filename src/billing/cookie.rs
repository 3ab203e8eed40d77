//! `access_token` cookie handling

use axum::http::{header, HeaderMap};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Attributes shared by every cookie the service writes
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub domain: Option<String>,
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            domain: None,
            secure: true,
        }
    }
}

/// What the response should do with the client's `access_token` cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieDirective {
    Set { token: String, max_age: i64 },
    Clear,
}

impl CookieDirective {
    /// Render as a `Set-Cookie` header value
    pub fn to_header_value(&self, settings: &CookieSettings) -> String {
        let (value, max_age) = match self {
            Self::Set { token, max_age } => (token.as_str(), *max_age),
            Self::Clear => ("", 0),
        };

        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            ACCESS_TOKEN_COOKIE, value, max_age
        );
        if let Some(domain) = &settings.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if settings.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Cookie for a freshly signed token; an already-expired grant clears instead
pub fn set_access_token_cookie(token: &str, expires_at: i64, now: i64) -> CookieDirective {
    let max_age = expires_at - now;
    if max_age <= 0 {
        return CookieDirective::Clear;
    }
    CookieDirective::Set {
        token: token.to_string(),
        max_age,
    }
}

/// Read a cookie value from the request's `Cookie` headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
