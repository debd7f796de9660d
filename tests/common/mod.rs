//! Stub backend API for integration tests
//!
//! Serves a small slice of the backend REST API on an ephemeral port.
//!
//! | Route                  | Behavior                                   |
//! |------------------------|--------------------------------------------|
//! | `POST /auth/login`     | password `secret` -> token, else 401       |
//! | `GET  /auth/me`        | current stub profile, 401 for `expired`    |
//! | `POST /auth/logout`    | 204                                        |
//! | `GET  /devices`        | device list, counts hits                   |
//! | `POST /devices`        | 422 with field errors                      |
//! | `DELETE /devices/{id}` | 204                                        |
//! | `GET  /proxies`        | 401 (session rejected)                     |
//! | `GET  /tasks`          | 403 (operation forbidden)                  |
//! | `GET  /transactions`   | 500 with a server message                  |
//! | `POST /accounts`       | 503 with an empty body                     |

#![allow(dead_code)]

use admin_console::{ConsoleConfig, ConsoleServer, ConsoleState};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const TOKEN: &str = "tok-1";
pub const PASSWORD: &str = "secret";

/// Mutable stub state shared with the test
#[derive(Default)]
pub struct Backend {
    pub device_hits: AtomicUsize,
    pub roles: Mutex<Vec<String>>,
    pub permissions: Mutex<Vec<String>>,
}

impl Backend {
    pub fn grant(&self, roles: &[&str], permissions: &[&str]) {
        *self.roles.lock() = roles.iter().map(|r| r.to_string()).collect();
        *self.permissions.lock() = permissions.iter().map(|p| p.to_string()).collect();
    }

    pub fn device_hits(&self) -> usize {
        self.device_hits.load(Ordering::SeqCst)
    }

    fn profile(&self) -> Value {
        json!({
            "id": "42",
            "username": "ops",
            "roles": self.roles.lock().clone(),
            "permissions": self.permissions.lock().clone(),
        })
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn login(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> impl IntoResponse {
    if body["password"] == PASSWORD {
        (
            StatusCode::OK,
            Json(json!({ "access_token": TOKEN, "user": backend.profile() })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid credentials" })),
        )
    }
}

async fn me(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> impl IntoResponse {
    match bearer(&headers) {
        Some("expired") | None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Token expired" })),
        ),
        Some(_) => (StatusCode::OK, Json(backend.profile())),
    }
}

async fn list_devices(State(backend): State<Arc<Backend>>) -> Json<Value> {
    backend.device_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!([{ "id": 1, "serial": "A-1" }, { "id": 2, "serial": "B-2" }]))
}

async fn create_device() -> impl IntoResponse {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "message": "Validation failed",
            "errors": { "serial": ["required"], "model": "unknown model" }
        })),
    )
}

async fn rejected() -> impl IntoResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Token expired" })),
    )
}

async fn forbidden() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "message": "Missing task.view" })),
    )
}

async fn broken() -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Ledger unavailable" })),
    )
}

async fn unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Start the stub backend; returns its base URL and shared state
pub async fn spawn_backend() -> (String, Arc<Backend>) {
    let backend = Arc::new(Backend::default());

    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/logout", post(no_content))
        .route("/devices", get(list_devices).post(create_device))
        .route("/devices/{id}", delete(no_content))
        .route("/proxies", get(rejected))
        .route("/tasks", get(forbidden))
        .route("/transactions", get(broken))
        .route("/accounts", post(unavailable))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), backend)
}

/// Console server wired to a fresh stub backend
pub async fn spawn_console() -> (ConsoleServer, Arc<Backend>) {
    let (base_url, backend) = spawn_backend().await;
    (console_for(base_url), backend)
}

/// Console server pointed at an arbitrary backend URL
pub fn console_for(base_url: String) -> ConsoleServer {
    let config = admin_console::Config {
        api_base_url: base_url,
        api_timeout_secs: 5,
        ..Default::default()
    };
    let state = ConsoleState::from_config(&config, false).unwrap();
    ConsoleServer::new(
        ConsoleConfig {
            log_requests: false,
            ..Default::default()
        },
        state,
    )
}
