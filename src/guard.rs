//! Auth-Failure Guard
//!
//! Wraps privileged operations against the backend API and funnels auth
//! failures to exactly two terminal surfaces:
//!
//! - **401 / Unauthenticated**: clear cached state, drop the session, redirect
//!   to the session-expired surface
//! - **403 / Unauthorized**: clear cached state, redirect to the forbidden surface
//! - **anything else**: returned to the caller unchanged
//!
//! Redirects are terminal. They travel as [`Interrupt::Redirect`] through `?`
//! and are never re-classified by an outer guard.

use crate::api::{ApiError, FieldErrors};
use crate::cache::ApiCache;
use crate::session::{SessionId, SessionStore};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Unauthenticated,
    Unauthorized,
    Other,
}

impl FailureClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => FailureClass::Unauthenticated,
            403 => FailureClass::Unauthorized,
            _ => FailureClass::Other,
        }
    }
}

impl ApiError {
    pub fn classify(&self) -> FailureClass {
        match self {
            ApiError::Unauthenticated { .. } | ApiError::MissingToken => {
                FailureClass::Unauthenticated
            }
            ApiError::Forbidden { .. } => FailureClass::Unauthorized,
            other => other
                .status()
                .map(FailureClass::from_status)
                .unwrap_or(FailureClass::Other),
        }
    }
}

/// Configured terminal surfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectTargets {
    pub session_expired: String,
    pub forbidden: String,
}

impl Default for RedirectTargets {
    fn default() -> Self {
        Self {
            session_expired: "/logout?reason=session_expired".to_string(),
            forbidden: "/forbidden".to_string(),
        }
    }
}

/// Terminal redirect decided by the guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub target: String,
    pub class: FailureClass,
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        axum::response::Redirect::to(&self.target).into_response()
    }
}

/// Early exit out of a guarded operation
#[derive(Debug)]
pub enum Interrupt {
    Redirect(Redirect),
    Failure(ApiError),
}

impl From<ApiError> for Interrupt {
    fn from(err: ApiError) -> Self {
        Interrupt::Failure(err)
    }
}

/// Outcome of a guarded operation
pub type Guarded<T> = Result<T, Interrupt>;

/// Auth-failure guard for one request
#[derive(Clone)]
pub struct AuthGuard {
    targets: Arc<RedirectTargets>,
    cache: ApiCache,
    session: Option<(Arc<SessionStore>, SessionId)>,
}

impl AuthGuard {
    pub fn new(targets: Arc<RedirectTargets>, cache: ApiCache) -> Self {
        Self {
            targets,
            cache,
            session: None,
        }
    }

    /// Bind the guard to the caller's session so a 401 can drop it
    pub fn for_session(mut self, store: Arc<SessionStore>, id: impl Into<SessionId>) -> Self {
        self.session = Some((store, id.into()));
        self
    }

    pub fn targets(&self) -> &RedirectTargets {
        &self.targets
    }

    /// Run `operation` and classify its failure
    pub async fn run<T, F, Fut>(&self, operation: F) -> Guarded<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Guarded<T>>,
    {
        match operation().await {
            Ok(value) => Ok(value),
            // Already decided by a nested guard
            Err(Interrupt::Redirect(redirect)) => Err(Interrupt::Redirect(redirect)),
            Err(Interrupt::Failure(err)) => match err.classify() {
                FailureClass::Unauthenticated => {
                    warn!(error = %err, target = %self.targets.session_expired, "Session rejected by backend");
                    self.invalidate(true);
                    Err(Interrupt::Redirect(Redirect {
                        target: self.targets.session_expired.clone(),
                        class: FailureClass::Unauthenticated,
                    }))
                }
                FailureClass::Unauthorized => {
                    warn!(error = %err, target = %self.targets.forbidden, "Operation forbidden by backend");
                    self.invalidate(false);
                    Err(Interrupt::Redirect(Redirect {
                        target: self.targets.forbidden.clone(),
                        class: FailureClass::Unauthorized,
                    }))
                }
                FailureClass::Other => Err(Interrupt::Failure(err)),
            },
        }
    }

    fn invalidate(&self, drop_session: bool) {
        self.cache.invalidate_all();
        debug!("Cleared cached API responses");

        if drop_session {
            if let Some((store, id)) = &self.session {
                store.remove(id);
                debug!(session = %id, "Dropped session");
            }
        }
    }
}

/// Human-readable message for a failure
///
/// Prefers the server-supplied message, otherwise `fallback`.
pub fn derive_message(error: &ApiError, fallback: &str) -> String {
    error
        .server_message()
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

/// Structured result returned to the action's caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            errors: None,
            data: Some(data),
        }
    }

    pub fn failed(error: &ApiError, fallback: &str) -> Self {
        Self {
            success: false,
            message: Some(derive_message(error, fallback)),
            errors: error.field_errors().cloned(),
            data: None,
        }
    }

    /// Turn a guarded outcome into a result, or the terminal redirect
    pub fn settle(outcome: Guarded<T>, fallback: &str) -> Result<Self, Redirect> {
        match outcome {
            Ok(data) => Ok(Self::ok(data)),
            Err(Interrupt::Failure(err)) => {
                debug!(error = %err, "Action failed");
                Ok(Self::failed(&err, fallback))
            }
            Err(Interrupt::Redirect(redirect)) => Err(redirect),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Profile;
    use crate::cache::CachedResponse;
    use crate::session::Session;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn guard() -> AuthGuard {
        AuthGuard::new(Arc::new(RedirectTargets::default()), ApiCache::new(100, 3600, true))
    }

    fn unauthenticated() -> ApiError {
        ApiError::from_response(401, r#"{"message":"token expired"}"#)
    }

    #[test]
    fn test_classification() {
        assert_eq!(FailureClass::from_status(401), FailureClass::Unauthenticated);
        assert_eq!(FailureClass::from_status(403), FailureClass::Unauthorized);
        assert_eq!(FailureClass::from_status(500), FailureClass::Other);
        assert_eq!(FailureClass::from_status(404), FailureClass::Other);

        assert_eq!(ApiError::MissingToken.classify(), FailureClass::Unauthenticated);
        assert_eq!(
            ApiError::from_response(422, r#"{"errors":{"a":"b"}}"#).classify(),
            FailureClass::Other
        );
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let result = guard().run(|| async { Ok::<_, Interrupt>(vec![1, 2, 3]) }).await;
        assert_eq!(result.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_unauthenticated_redirects_and_clears() {
        let cache = ApiCache::new(100, 3600, true);
        let store = Arc::new(SessionStore::new());
        let profile = Profile {
            id: "1".into(),
            username: "ops".into(),
            roles: vec![],
            permissions: vec![],
        };
        let session = store.insert(Session::new("tok".into(), &profile));

        let key = ApiCache::compute_key("tok", "/devices");
        cache
            .set(&key, CachedResponse { path: "/devices".into(), body: serde_json::json!([]) })
            .await;

        let guard = AuthGuard::new(Arc::new(RedirectTargets::default()), cache.clone())
            .for_session(store.clone(), session.id.clone());

        let result: Guarded<()> = guard.run(|| async { Err(Interrupt::from(unauthenticated())) }).await;

        match result {
            Err(Interrupt::Redirect(r)) => {
                assert_eq!(r.target, "/logout?reason=session_expired");
                assert_eq!(r.class, FailureClass::Unauthenticated);
            }
            other => panic!("expected redirect, got {:?}", other),
        }
        assert!(cache.get(&key).await.is_none());
        assert!(store.get(&session.id).is_none());
    }

    #[tokio::test]
    async fn test_forbidden_redirects_keeps_session() {
        let store = Arc::new(SessionStore::new());
        let profile = Profile {
            id: "1".into(),
            username: "ops".into(),
            roles: vec![],
            permissions: vec![],
        };
        let session = store.insert(Session::new("tok".into(), &profile));
        let guard = guard().for_session(store.clone(), session.id.clone());

        let result: Guarded<()> = guard
            .run(|| async { Err(Interrupt::from(ApiError::from_response(403, ""))) })
            .await;

        match result {
            Err(Interrupt::Redirect(r)) => assert_eq!(r.target, "/forbidden"),
            other => panic!("expected redirect, got {:?}", other),
        }
        assert!(store.get(&session.id).is_some());
    }

    #[tokio::test]
    async fn test_other_errors_returned_unchanged() {
        let result: Guarded<()> = guard()
            .run(|| async { Err(Interrupt::from(ApiError::from_response(502, r#"{"message":"upstream down"}"#))) })
            .await;

        match result {
            Err(Interrupt::Failure(ApiError::Status { status, message })) => {
                assert_eq!(status, 502);
                assert_eq!(message.as_deref(), Some("upstream down"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_nested_guards_redirect_once() {
        let outer = guard();
        let inner = outer.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result: Guarded<u32> = outer
            .run(|| async move {
                let value: u32 = inner
                    .run(|| async {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(Interrupt::from(ApiError::from_response(403, "")))
                    })
                    .await?;
                // Unreachable after the inner redirect
                counter.fetch_add(100, Ordering::SeqCst);
                Ok::<u32, Interrupt>(value + 1)
            })
            .await;

        match result {
            Err(Interrupt::Redirect(r)) => {
                assert_eq!(r.target, "/forbidden");
                assert_eq!(r.class, FailureClass::Unauthorized);
            }
            other => panic!("expected redirect, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_derive_message() {
        let with_message = ApiError::from_response(500, r#"{"message":"Proxy pool exhausted"}"#);
        let without = ApiError::from_response(500, "");

        assert_eq!(derive_message(&with_message, "Could not save"), "Proxy pool exhausted");
        assert_eq!(derive_message(&without, "Could not save"), "Could not save");
    }

    #[test]
    fn test_settle_failure() {
        let outcome: Guarded<()> = Err(ApiError::from_response(
            422,
            r#"{"message":"Invalid","errors":{"host":["required"]}}"#,
        )
        .into());

        let result = ActionResult::settle(outcome, "Could not save").unwrap();
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("Invalid"));
        assert_eq!(result.errors.unwrap()["host"], vec!["required"]);
    }

    #[test]
    fn test_settle_transport_style_failure_uses_fallback() {
        let outcome: Guarded<()> = Err(ApiError::from_response(503, "").into());
        let result = ActionResult::settle(outcome, "Service unavailable").unwrap();

        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("Service unavailable"));
        assert!(result.errors.is_none());
    }

    #[test]
    fn test_settle_redirect_is_terminal() {
        let outcome: Guarded<()> = Err(Interrupt::Redirect(Redirect {
            target: "/forbidden".into(),
            class: FailureClass::Unauthorized,
        }));
        assert!(ActionResult::settle(outcome, "x").is_err());
    }

    #[test]
    fn test_action_result_serialization() {
        let json = serde_json::to_value(ActionResult::ok(serde_json::json!({"id": 7}))).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], 7);
        assert!(json.get("message").is_none());
    }
}
