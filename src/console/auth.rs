//! Console Authentication
//!
//! Cookie-backed sessions over backend bearer tokens.
//!
//! # Flow
//!
//! - `POST /auth/login` exchanges credentials with the backend, stores an
//!   immutable [`Session`] snapshot and sets an httpOnly session cookie
//! - `session_middleware` resolves the cookie to the latest snapshot
//! - `route_access_middleware` checks the snapshot's principal against the
//!   route table before any handler runs
//! - `POST /auth/refresh` re-fetches the profile and swaps in a new snapshot
//! - `POST /auth/logout` drops the snapshot and clears the cookie

use super::ConsoleState;
use crate::access::{AccessDecision, Principal};
use crate::api::ApiError;
use crate::guard::{derive_message, Interrupt};
use crate::session::{Session, UserInfo, SESSION_MAX_AGE_HOURS};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Session cookie name
pub const SESSION_COOKIE: &str = "console_session";


/// Console errors
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Backend error: {0}")]
    Api(#[from] ApiError),
}

impl IntoResponse for ConsoleError {
    fn into_response(self) -> Response {
        let (status, message, details) = match &self {
            ConsoleError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string(), None)
            }
            ConsoleError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "Authentication required".to_string(), None)
            }
            ConsoleError::Forbidden => {
                (StatusCode::FORBIDDEN, "Insufficient permissions".to_string(), None)
            }
            ConsoleError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string(), None),
            ConsoleError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone(), None),
            ConsoleError::Api(err) => {
                let status = match err {
                    ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    ApiError::Unauthenticated { .. } | ApiError::MissingToken => {
                        StatusCode::UNAUTHORIZED
                    }
                    ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
                    ApiError::Status { status, .. } if (400..500).contains(status) => {
                        StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
                    }
                    _ => StatusCode::BAD_GATEWAY,
                };
                let details = err
                    .field_errors()
                    .and_then(|errors| serde_json::to_value(errors).ok());
                (status, derive_message(err, "Backend request failed"), details)
            }
        };

        let body = Json(ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Extractor for the caller's session snapshot
///
/// Rejects with 401 when no session is attached.
pub struct CurrentSession(pub Arc<Session>);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = ConsoleError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<Session>>()
            .cloned()
            .map(CurrentSession)
            .ok_or(ConsoleError::Unauthenticated)
    }
}

/// Extractor for pages that render with or without a session
pub struct MaybeSession(pub Option<Arc<Session>>);

impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(parts.extensions.get::<Arc<Session>>().cloned()))
    }
}

/// Build the session cookie
pub fn build_session_cookie(session_id: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(cookie::time::Duration::hours(SESSION_MAX_AGE_HOURS))
        .build()
}

/// Build the cookie that clears the session
pub fn build_logout_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(cookie::time::Duration::ZERO)
        .build()
}

// ============================================================================
// Middleware
// ============================================================================

/// Attach the caller's session snapshot to the request
pub async fn session_middleware(
    State(state): State<ConsoleState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match state.sessions.get(cookie.value()) {
            Some(session) => {
                req.extensions_mut().insert(session);
            }
            None => debug!("Unknown or expired session cookie"),
        }
    }

    next.run(req).await
}

/// Route-level access control
///
/// Anonymous callers on protected routes go to the login surface; callers
/// whose principal fails the route requirement go to the forbidden surface.
/// `/api/*` paths get JSON 401/403 bodies instead of redirects.
pub async fn route_access_middleware(
    State(state): State<ConsoleState>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let is_api = path.starts_with("/api/");
    let session = req.extensions().get::<Arc<Session>>().cloned();

    if session.is_none() && state.routes.is_protected(&path) {
        debug!(path = %path, "Protected route without session");
        if is_api {
            return ConsoleError::Unauthenticated.into_response();
        }
        return Redirect::to(&state.login_path).into_response();
    }

    let anonymous = Principal::anonymous();
    let principal = session.as_ref().map(|s| &s.principal).unwrap_or(&anonymous);
    let decision: AccessDecision = state.routes.decide(&state.engine, principal, &path);

    if !decision.allowed {
        warn!(
            path = %path,
            rule = ?decision.rule,
            user = session.as_ref().map(|s| s.user.username.as_str()).unwrap_or("anonymous"),
            "Route access denied"
        );
        if is_api {
            return ConsoleError::Forbidden.into_response();
        }
        return Redirect::to(&state.redirects.forbidden).into_response();
    }

    next.run(req).await
}

// ============================================================================
// API Handlers
// ============================================================================

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login / refresh / me response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
}

impl LoginResponse {
    fn for_session(session: &Session) -> Self {
        Self {
            success: true,
            user: Some(session.user.clone()),
            principal: Some(session.principal.clone()),
        }
    }
}

/// Login handler
pub async fn login_handler(
    State(state): State<ConsoleState>,
    jar: CookieJar,
    Json(login_req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ConsoleError> {
    let grant = state
        .api
        .login(&login_req.username, &login_req.password)
        .await
        .map_err(|err| match err {
            ApiError::Unauthenticated { .. } | ApiError::Forbidden { .. } => {
                ConsoleError::InvalidCredentials
            }
            other => ConsoleError::Api(other),
        })?;

    let session = state.sessions.insert(Session::new(grant.token, &grant.user));
    info!(user = %session.user.username, "Console login");

    let jar = jar.add(build_session_cookie(&session.id, state.secure_cookies));

    Ok((jar, Json(LoginResponse::for_session(&session))))
}

/// Logout handler
pub async fn logout_handler(
    State(state): State<ConsoleState>,
    jar: CookieJar,
) -> (CookieJar, Json<LoginResponse>) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(session) = state.sessions.remove(cookie.value()) {
            if let Err(e) = state.api.logout(&session.token).await {
                debug!("Backend logout failed: {}", e);
            }
            info!(user = %session.user.username, "Console logout");
        }
    }

    let jar = jar.add(build_logout_cookie(state.secure_cookies));

    (
        jar,
        Json(LoginResponse {
            success: true,
            user: None,
            principal: None,
        }),
    )
}

/// Refresh handler
///
/// Rebuilds the session snapshot from the backend profile.
pub async fn refresh_handler(
    State(state): State<ConsoleState>,
    CurrentSession(session): CurrentSession,
) -> Result<Response, ConsoleError> {
    let guard = state.guard_for(&session);
    let outcome = guard
        .run(|| async { Ok::<_, Interrupt>(state.api.profile(&session.token).await?) })
        .await;

    match outcome {
        Ok(profile) => {
            let current = state
                .sessions
                .replace(session.refreshed(&profile))
                .ok_or(ConsoleError::Unauthenticated)?;
            debug!(user = %current.user.username, "Session refreshed");
            Ok(Json(LoginResponse::for_session(&current)).into_response())
        }
        Err(Interrupt::Redirect(redirect)) => Ok(redirect.into_response()),
        Err(Interrupt::Failure(err)) => Err(ConsoleError::Api(err)),
    }
}

/// Me handler (get current user)
pub async fn me_handler(CurrentSession(session): CurrentSession) -> Json<LoginResponse> {
    Json(LoginResponse::for_session(&session))
}

// ============================================================================
// Router
// ============================================================================

/// Create the authentication router
pub fn auth_router() -> Router<ConsoleState> {
    Router::new()
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/refresh", post(refresh_handler))
}
