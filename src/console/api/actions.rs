//! Resource Actions
//!
//! Server-side actions for the admin resources. Each one is a thin
//! pass-through to the backend, run under the caller's auth-failure guard.
//! Auth failures end in a redirect; every other failure comes back as an
//! [`ActionResult`] with `success: false`.
//!
//! # Endpoints
//!
//! | Method | Path                              | Permission         |
//! |--------|-----------------------------------|--------------------|
//! | GET    | `/api/{resource}`                 | `{scope}.view`     |
//! | GET    | `/api/{resource}/{id}`            | `{scope}.view`     |
//! | POST   | `/api/{resource}`                 | `{scope}.create`   |
//! | PUT    | `/api/{resource}/{id}`            | `{scope}.update`   |
//! | DELETE | `/api/{resource}/{id}`            | `{scope}.delete`   |
//! | POST   | `/api/{resource}/{id}/{action}`   | `{scope}.{action}` |
//!
//! The view permission is enforced by the route table. Role records are
//! mutated under `role.manage`.

use crate::access::routes::{permission_scope, ADMIN_RESOURCES};
use crate::access::AccessRequirement;
use crate::api::ApiError;
use crate::console::{ConsoleError, ConsoleState, CurrentSession};
use crate::guard::{ActionResult, Interrupt};
use crate::session::Session;
use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::future::Future;
use tracing::{debug, warn};

/// Roles resource, managed outside the per-resource permission scheme
const ROLES_RESOURCE: &str = "roles";

/// Verbs that need a permission beyond the route's view gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb<'a> {
    Create,
    Update,
    Delete,
    Custom(&'a str),
}

impl Verb<'_> {
    fn as_str(&self) -> &str {
        match self {
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
            Verb::Custom(name) => name,
        }
    }

    fn fallback(&self) -> &'static str {
        match self {
            Verb::Create => "Could not create record",
            Verb::Update => "Could not save changes",
            Verb::Delete => "Could not delete record",
            Verb::Custom(_) => "Action failed",
        }
    }
}

/// Reject anything outside the admin surface
fn known_resource(resource: &str) -> Result<(), ConsoleError> {
    if resource == ROLES_RESOURCE || ADMIN_RESOURCES.contains(&resource) {
        Ok(())
    } else {
        Err(ConsoleError::NotFound)
    }
}

/// Permission a mutation on `resource` requires
pub fn required_permission(resource: &str, verb: &str) -> String {
    if resource == ROLES_RESOURCE {
        "role.manage".to_string()
    } else {
        format!("{}.{}", permission_scope(resource), verb)
    }
}

fn authorize(
    state: &ConsoleState,
    session: &Session,
    resource: &str,
    verb: Verb<'_>,
) -> Result<(), ConsoleError> {
    known_resource(resource)?;

    let permission = required_permission(resource, verb.as_str());
    let decision = state.engine.decide(
        &session.principal,
        &AccessRequirement::permissions([permission.as_str()]),
    );

    if decision.allowed {
        debug!(resource, permission = %permission, rule = ?decision.rule, "Action allowed");
        Ok(())
    } else {
        warn!(
            resource,
            permission = %permission,
            user = %session.user.username,
            "Action denied"
        );
        Err(ConsoleError::Forbidden)
    }
}

/// Run a backend call under the session's guard and settle it
async fn guarded<Fut>(
    state: &ConsoleState,
    session: &Session,
    fallback: &str,
    call: Fut,
) -> Response
where
    Fut: Future<Output = Result<Value, ApiError>>,
{
    let outcome = state
        .guard_for(session)
        .run(|| async move { Ok::<_, Interrupt>(call.await?) })
        .await;

    match ActionResult::settle(outcome, fallback) {
        Ok(result) => Json(result).into_response(),
        Err(redirect) => redirect.into_response(),
    }
}

/// Accept a path capture only if it stays one backend path segment
fn path_segment(raw: &str) -> Result<&str, ConsoleError> {
    let invalid = raw.is_empty()
        || raw == "."
        || raw == ".."
        || raw.contains(['/', '\\', '?', '#']);

    if invalid {
        warn!(segment = %raw, "Rejected path segment");
        Err(ConsoleError::NotFound)
    } else {
        Ok(raw)
    }
}

fn backend_path(
    resource: &str,
    id: Option<&str>,
    query: Option<&str>,
) -> Result<String, ConsoleError> {
    let mut path = format!("/{}", path_segment(resource)?);
    if let Some(id) = id {
        path.push('/');
        path.push_str(path_segment(id)?);
    }
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        path.push('?');
        path.push_str(query);
    }
    Ok(path)
}

// ============================================================================
// Handlers
// ============================================================================

/// List records, forwarding filters and pagination
pub async fn list_records(
    State(state): State<ConsoleState>,
    CurrentSession(session): CurrentSession,
    Path(resource): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, ConsoleError> {
    known_resource(&resource)?;
    let path = backend_path(&resource, None, query.as_deref())?;

    Ok(guarded(&state, &session, "Could not load records", async {
        state.api.get_json::<Value>(&path, &session.token).await
    })
    .await)
}

/// Fetch one record
pub async fn get_record(
    State(state): State<ConsoleState>,
    CurrentSession(session): CurrentSession,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Response, ConsoleError> {
    known_resource(&resource)?;
    let path = backend_path(&resource, Some(&id), None)?;

    Ok(guarded(&state, &session, "Could not load record", async {
        state.api.get_json::<Value>(&path, &session.token).await
    })
    .await)
}

/// Create a record
pub async fn create_record(
    State(state): State<ConsoleState>,
    CurrentSession(session): CurrentSession,
    Path(resource): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, ConsoleError> {
    let verb = Verb::Create;
    authorize(&state, &session, &resource, verb)?;
    let path = backend_path(&resource, None, None)?;

    Ok(guarded(&state, &session, verb.fallback(), async {
        state.api.post_json::<_, Value>(&path, &session.token, &body).await
    })
    .await)
}

/// Replace a record
pub async fn update_record(
    State(state): State<ConsoleState>,
    CurrentSession(session): CurrentSession,
    Path((resource, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, ConsoleError> {
    let verb = Verb::Update;
    authorize(&state, &session, &resource, verb)?;
    let path = backend_path(&resource, Some(&id), None)?;

    Ok(guarded(&state, &session, verb.fallback(), async {
        state.api.put_json::<_, Value>(&path, &session.token, &body).await
    })
    .await)
}

/// Delete a record
pub async fn delete_record(
    State(state): State<ConsoleState>,
    CurrentSession(session): CurrentSession,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Response, ConsoleError> {
    let verb = Verb::Delete;
    authorize(&state, &session, &resource, verb)?;
    let path = backend_path(&resource, Some(&id), None)?;

    Ok(guarded(&state, &session, verb.fallback(), async {
        state
            .api
            .delete(&path, &session.token)
            .await
            .map(|_| Value::Null)
    })
    .await)
}

/// Domain action on a record, e.g. `POST /api/proxies/3/rotate`
pub async fn record_action(
    State(state): State<ConsoleState>,
    CurrentSession(session): CurrentSession,
    Path((resource, id, action)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Response, ConsoleError> {
    let verb = Verb::Custom(path_segment(&action)?);
    authorize(&state, &session, &resource, verb)?;
    let path = format!("{}/{}", backend_path(&resource, Some(&id), None)?, action);
    // Actions like `rotate` are usually posted without a body
    let body: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ConsoleError::BadRequest(format!("Invalid JSON body: {e}")))?
    };

    Ok(guarded(&state, &session, verb.fallback(), async {
        state.api.post_json::<_, Value>(&path, &session.token, &body).await
    })
    .await)
}

/// Create the resource action router
pub fn actions_router() -> Router<ConsoleState> {
    Router::new()
        .route("/{resource}", get(list_records).post(create_record))
        .route(
            "/{resource}/{id}",
            get(get_record).put(update_record).delete(delete_record),
        )
        .route("/{resource}/{id}/{action}", post(record_action))
}
