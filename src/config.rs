//! Service configuration loaded from the environment

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::ai::{HttpGeneratorConfig, VisionAnalyzerConfig};
use crate::billing::{CookieSettings, DefaultGrants, GovernanceConfig, UsageStore, MIN_SECRET_LEN};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_GENERATION_API_URL: &str = "http://127.0.0.1:8001/generate";
const DEFAULT_VISION_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{key} must be at least {min} bytes")]
    SecretTooShort { key: &'static str, min: usize },
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("could not determine a location for the usage database; set USAGE_DB_PATH")]
    NoDataDir,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub token_secret: Vec<u8>,
    pub cookie: CookieSettings,
    pub governance: GovernanceConfig,
    pub usage_db_path: PathBuf,
    pub ledger_defaults: DefaultGrants,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window: Duration,
    pub admin_api_key: Option<String>,
    pub generation: HttpGeneratorConfig,
    pub vision: VisionAnalyzerConfig,
    pub layout_timeout: Duration,
    pub max_image_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let token_secret = get("ACCESS_TOKEN_SECRET")
            .ok_or(ConfigError::Missing("ACCESS_TOKEN_SECRET"))?
            .into_bytes();
        if token_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::SecretTooShort {
                key: "ACCESS_TOKEN_SECRET",
                min: MIN_SECRET_LEN,
            });
        }

        let bind_addr = parse_or("BIND_ADDR", get("BIND_ADDR"), || {
            DEFAULT_BIND_ADDR.parse().map_err(|_| ConfigError::Invalid {
                key: "BIND_ADDR",
                value: DEFAULT_BIND_ADDR.to_string(),
            })
        })?;

        let usage_db_path = match get("USAGE_DB_PATH") {
            Some(path) => PathBuf::from(path),
            None => UsageStore::default_path().ok_or(ConfigError::NoDataDir)?,
        };

        Ok(Self {
            bind_addr,
            token_secret,
            cookie: CookieSettings {
                domain: get("COOKIE_DOMAIN"),
                secure: parse_bool("COOKIE_SECURE", get("COOKIE_SECURE"), true)?,
            },
            governance: GovernanceConfig {
                free_limit: parse_or("FREE_USAGE_LIMIT", get("FREE_USAGE_LIMIT"), || Ok(2))?,
                limits_disabled: parse_bool(
                    "DISABLE_USAGE_LIMITS",
                    get("DISABLE_USAGE_LIMITS"),
                    false,
                )?,
            },
            usage_db_path,
            ledger_defaults: DefaultGrants {
                free: parse_or("LEDGER_FREE_GRANT", get("LEDGER_FREE_GRANT"), || Ok(0))?,
                paid: 0,
            },
            rate_limit_max_requests: parse_positive(
                "RATE_LIMIT_MAX_REQUESTS",
                get("RATE_LIMIT_MAX_REQUESTS"),
                10,
            )?,
            rate_limit_window: Duration::from_secs(parse_positive(
                "RATE_LIMIT_WINDOW_SECS",
                get("RATE_LIMIT_WINDOW_SECS"),
                60,
            )?),
            admin_api_key: get("ADMIN_API_KEY"),
            generation: HttpGeneratorConfig {
                api_url: get("GENERATION_API_URL")
                    .unwrap_or_else(|| DEFAULT_GENERATION_API_URL.to_string()),
                api_key: get("GENERATION_API_KEY"),
            },
            vision: VisionAnalyzerConfig {
                api_url: get("VISION_API_URL").unwrap_or_else(|| DEFAULT_VISION_API_URL.to_string()),
                api_key: get("VISION_API_KEY"),
                model: get("VISION_MODEL").unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            },
            layout_timeout: Duration::from_secs(parse_or(
                "LAYOUT_ANALYSIS_TIMEOUT_SECS",
                get("LAYOUT_ANALYSIS_TIMEOUT_SECS"),
                || Ok(20),
            )?),
            max_image_bytes: parse_or("MAX_IMAGE_BYTES", get("MAX_IMAGE_BYTES"), || {
                Ok(10 * 1024 * 1024)
            })?,
        })
    }
}

fn parse_or<T, D>(key: &'static str, raw: Option<String>, default: D) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    D: FnOnce() -> Result<T, ConfigError>,
{
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => default(),
    }
}

/// Zero would reject every request or stall the cleanup timer
fn parse_positive<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let value = parse_or(key, raw.clone(), || Ok(default))?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: raw.unwrap_or_default(),
        });
    }
    Ok(value)
}

fn parse_bool(key: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = raw else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("ACCESS_TOKEN_SECRET", SECRET), ("USAGE_DB_PATH", "/tmp/u.db")]).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.cookie.secure);
        assert!(config.cookie.domain.is_none());
        assert_eq!(config.governance.free_limit, 2);
        assert!(!config.governance.limits_disabled);
        assert_eq!(config.ledger_defaults, DefaultGrants::default());
        assert_eq!(config.rate_limit_max_requests, 10);
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert!(config.admin_api_key.is_none());
        assert_eq!(config.vision.model, "gpt-4o-mini");
        assert_eq!(config.layout_timeout, Duration::from_secs(20));
        assert_eq!(config.max_image_bytes, 10_485_760);
    }

    #[test]
    fn test_secret_required_and_strong() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing("ACCESS_TOKEN_SECRET"))));
        assert!(matches!(
            load(&[("ACCESS_TOKEN_SECRET", "short")]),
            Err(ConfigError::SecretTooShort { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("ACCESS_TOKEN_SECRET", SECRET),
            ("USAGE_DB_PATH", "/tmp/u.db"),
            ("BIND_ADDR", "127.0.0.1:3000"),
            ("COOKIE_DOMAIN", ".example.com"),
            ("COOKIE_SECURE", "off"),
            ("DISABLE_USAGE_LIMITS", "YES"),
            ("FREE_USAGE_LIMIT", "5"),
            ("ADMIN_API_KEY", "admin-key"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(config.cookie.domain.as_deref(), Some(".example.com"));
        assert!(!config.cookie.secure);
        assert!(config.governance.limits_disabled);
        assert_eq!(config.governance.free_limit, 5);
        assert_eq!(config.usage_db_path, PathBuf::from("/tmp/u.db"));
        assert_eq!(config.admin_api_key.as_deref(), Some("admin-key"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = load(&[("ACCESS_TOKEN_SECRET", SECRET), ("USAGE_DB_PATH", "/tmp/u.db"), ("FREE_USAGE_LIMIT", "two")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "FREE_USAGE_LIMIT", .. }));

        let err = load(&[("ACCESS_TOKEN_SECRET", SECRET), ("USAGE_DB_PATH", "/tmp/u.db"), ("COOKIE_SECURE", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "COOKIE_SECURE", .. }));

        let err = load(&[("ACCESS_TOKEN_SECRET", SECRET), ("BIND_ADDR", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "BIND_ADDR", .. }));

        let err = load(&[
            ("ACCESS_TOKEN_SECRET", SECRET),
            ("USAGE_DB_PATH", "/tmp/u.db"),
            ("RATE_LIMIT_WINDOW_SECS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RATE_LIMIT_WINDOW_SECS", .. }));

        let err = load(&[
            ("ACCESS_TOKEN_SECRET", SECRET),
            ("USAGE_DB_PATH", "/tmp/u.db"),
            ("RATE_LIMIT_MAX_REQUESTS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RATE_LIMIT_MAX_REQUESTS", .. }));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = load(&[
            ("ACCESS_TOKEN_SECRET", SECRET),
            ("USAGE_DB_PATH", "/tmp/u.db"),
            ("ADMIN_API_KEY", "   "),
            ("FREE_USAGE_LIMIT", ""),
        ])
        .unwrap();
        assert!(config.admin_api_key.is_none());
        assert_eq!(config.governance.free_limit, 2);
    }
}
