//! Configuration management

use crate::guard::RedirectTargets;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend REST API base URL
    pub api_base_url: String,

    /// Per-request timeout for backend calls
    pub api_timeout_secs: u64,

    /// Where auth failures send the browser
    pub redirects: RedirectTargets,

    /// Re-authentication surface for unauthenticated navigation
    pub login_path: String,

    /// Role that bypasses every access rule
    pub super_admin_role: String,

    /// Enable response caching
    pub cache_enabled: bool,

    /// Cache TTL in seconds
    pub cache_ttl_secs: u64,

    /// Maximum cached responses
    pub cache_max_entries: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:9000/api".to_string(),
            api_timeout_secs: 15,
            redirects: RedirectTargets::default(),
            login_path: "/login".to_string(),
            super_admin_role: crate::access::SUPER_ADMIN_ROLE.to_string(),
            cache_enabled: true,
            cache_ttl_secs: 60,
            cache_max_entries: 10_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_base_url = std::env::var("CONSOLE_API_BASE_URL").unwrap_or(defaults.api_base_url);
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                name: "CONSOLE_API_BASE_URL",
                value: api_base_url,
            });
        }

        let api_timeout_secs = parse_var("CONSOLE_API_TIMEOUT_SECS", defaults.api_timeout_secs)?;

        let redirects = RedirectTargets {
            session_expired: std::env::var("CONSOLE_SESSION_EXPIRED_PATH")
                .unwrap_or(defaults.redirects.session_expired),
            forbidden: std::env::var("CONSOLE_FORBIDDEN_PATH")
                .unwrap_or(defaults.redirects.forbidden),
        };

        let login_path = std::env::var("CONSOLE_LOGIN_PATH").unwrap_or(defaults.login_path);

        let super_admin_role =
            std::env::var("CONSOLE_SUPER_ADMIN_ROLE").unwrap_or(defaults.super_admin_role);

        let cache_enabled = std::env::var("CONSOLE_CACHE_ENABLED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(defaults.cache_enabled);

        let cache_ttl_secs = parse_var("CONSOLE_CACHE_TTL", defaults.cache_ttl_secs)?;
        let cache_max_entries = parse_var("CONSOLE_CACHE_MAX_ENTRIES", defaults.cache_max_entries)?;

        Ok(Self {
            api_base_url,
            api_timeout_secs,
            redirects,
            login_path,
            super_admin_role,
            cache_enabled,
            cache_ttl_secs,
            cache_max_entries,
        })
    }
}

fn parse_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}
