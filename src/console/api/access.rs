//! Access Check API
//!
//! Lets the rendering layer ask whether the current principal may see a UI
//! fragment or navigate to a route. Evaluated fresh on every call against the
//! caller's latest session snapshot.
//!
//! # Endpoints
//!
//! - `GET /api/access/check?permissions=a,b&roles=admin&require_all=true`
//! - `GET /api/access/route?path=/proxies/new`

use crate::access::{AccessDecision, AccessSpec, Combinator};
use crate::console::{ConsoleState, CurrentSession};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

/// Component check query
#[derive(Debug, Default, Deserialize)]
pub struct ComponentQuery {
    /// Comma separated permission list
    pub permissions: Option<String>,
    /// Comma separated role list
    pub roles: Option<String>,
    #[serde(default)]
    pub require_all: bool,
}

/// Route check query
#[derive(Debug, Deserialize)]
pub struct RouteQuery {
    pub path: String,
}

/// Parse a comma separated list into a spec
///
/// Empty or missing input means no requirement; one item is a single spec.
pub fn parse_spec(raw: Option<&str>, combinator: Combinator) -> AccessSpec {
    let items: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    match items.len() {
        0 => AccessSpec::None,
        1 => AccessSpec::Single(items.into_iter().next().unwrap_or_default()),
        _ => AccessSpec::List(items, combinator),
    }
}

/// Component access for the current principal
pub async fn check_component(
    State(state): State<ConsoleState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<ComponentQuery>,
) -> Json<AccessDecision> {
    let combinator = Combinator::from_require_all(query.require_all);
    let permission_spec = parse_spec(query.permissions.as_deref(), combinator);
    let role_spec = parse_spec(query.roles.as_deref(), combinator);

    Json(state.engine.decide_component(
        &session.principal,
        &permission_spec,
        &role_spec,
        query.require_all,
    ))
}

/// Route access for the current principal
pub async fn check_route(
    State(state): State<ConsoleState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<RouteQuery>,
) -> Json<AccessDecision> {
    Json(
        state
            .routes
            .decide(&state.engine, &session.principal, &query.path),
    )
}

/// Create the access check router
pub fn access_router() -> Router<ConsoleState> {
    Router::new()
        .route("/access/check", get(check_component))
        .route("/access/route", get(check_route))
}
