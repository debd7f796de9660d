//! Admin Console Web Module
//!
//! Server-side surface of the admin console. Every page and action is a thin
//! pass-through to the backend API, gated by the access engine and wrapped in
//! the auth-failure guard.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                Console Server                │
//! ├──────────────────────────────────────────────┤
//! │  session_middleware      → cookie → snapshot │
//! │  route_access_middleware → RouteRegistry     │
//! ├──────────────────────────────────────────────┤
//! │  GET  /login /logout /forbidden → pages      │
//! │  POST /auth/login|logout|refresh → session   │
//! │  GET  /api/me            → current user      │
//! │  GET  /api/access/check  → component access  │
//! │  GET  /api/access/route  → route access      │
//! │  *    /api/{resource}/…  → guarded actions   │
//! │  GET  /api/health|healthz|readyz             │
//! └──────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod pages;
pub mod server;

use crate::access::{AccessEngine, RouteRegistry};
use crate::api::ApiClient;
use crate::cache::ApiCache;
use crate::config::Config;
use crate::guard::{AuthGuard, RedirectTargets};
use crate::session::{Session, SessionStore};
use std::sync::Arc;
use std::time::Instant;

pub use auth::{
    auth_router, route_access_middleware, session_middleware, ConsoleError, CurrentSession,
    ErrorResponse, LoginRequest, LoginResponse, MaybeSession,
};
pub use config::ConsoleConfig;
pub use server::ConsoleServer;

/// Shared state for every console handler
#[derive(Clone)]
pub struct ConsoleState {
    pub api: ApiClient,
    pub cache: ApiCache,
    pub sessions: Arc<SessionStore>,
    pub routes: Arc<RouteRegistry>,
    pub engine: AccessEngine,
    pub redirects: Arc<RedirectTargets>,
    pub login_path: String,
    pub secure_cookies: bool,
    pub start_time: Instant,
}

impl ConsoleState {
    /// Build state from application config with the default admin route table
    pub fn from_config(config: &Config, secure_cookies: bool) -> Result<Self, crate::api::ApiError> {
        let cache = ApiCache::new(
            config.cache_max_entries,
            config.cache_ttl_secs,
            config.cache_enabled,
        );
        let api = ApiClient::from_config(config, cache.clone())?;

        Ok(Self {
            api,
            cache,
            sessions: Arc::new(SessionStore::new()),
            routes: Arc::new(RouteRegistry::admin_defaults()),
            engine: AccessEngine::new(config.super_admin_role.clone()),
            redirects: Arc::new(config.redirects.clone()),
            login_path: config.login_path.clone(),
            secure_cookies,
            start_time: Instant::now(),
        })
    }

    /// Guard bound to the caller's session
    pub fn guard_for(&self, session: &Session) -> AuthGuard {
        AuthGuard::new(self.redirects.clone(), self.cache.clone())
            .for_session(self.sessions.clone(), session.id.clone())
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
