//! Console JSON API
//!
//! Everything under `/api`. Access checks, health checks and resource
//! actions are merged into one router; static segments win over the
//! `{resource}` captures.

pub mod access;
pub mod actions;
pub mod health;

use crate::console::{auth::me_handler, ConsoleState};
use axum::{routing::get, Router};

pub use access::access_router;
pub use actions::actions_router;
pub use health::health_router;

/// Create the combined API router
pub fn api_router() -> Router<ConsoleState> {
    Router::new()
        .route("/me", get(me_handler))
        .merge(health_router())
        .merge(access_router())
        .merge(actions_router())
}
