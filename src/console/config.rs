//! Console Server Configuration
//!
//! Provides configuration for the console server with security-first defaults.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Console server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Bind address (default: 127.0.0.1 for security)
    pub bind_addr: IpAddr,
    /// Port number (default: 8080)
    pub port: u16,
    /// Secure cookies (requires HTTPS)
    pub secure_cookies: bool,
    /// Enable request logging
    pub log_requests: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            secure_cookies: false,
            log_requests: true,
        }
    }
}

impl ConsoleConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("CONSOLE_BIND_ADDR") {
            if let Ok(parsed) = addr.parse() {
                config.bind_addr = parsed;
            }
        }

        if let Ok(port) = std::env::var("CONSOLE_PORT") {
            if let Ok(parsed) = port.parse() {
                config.port = parsed;
            }
        }

        if let Ok(val) = std::env::var("CONSOLE_SECURE_COOKIES") {
            config.secure_cookies = val == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("CONSOLE_LOG_REQUESTS") {
            config.log_requests = val == "true" || val == "1";
        }

        if !config.is_localhost() && !config.secure_cookies {
            tracing::warn!(
                "Console binding to {} without secure cookies - terminate TLS in front of it",
                config.bind_addr
            );
        }

        config
    }

    /// Check if bound to localhost only
    pub fn is_localhost(&self) -> bool {
        match self.bind_addr {
            IpAddr::V4(addr) => addr.is_loopback(),
            IpAddr::V6(addr) => addr.is_loopback(),
        }
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> String {
        let scheme = if self.secure_cookies { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.bind_addr, self.port)
    }

    /// Configuration for a deployment behind a TLS proxy
    pub fn public() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            secure_cookies: true,
            ..Default::default()
        }
    }
}
