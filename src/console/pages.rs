//! Console Pages
//!
//! Server-rendered shells for the console screens. Route gating happens in
//! `route_access_middleware` before any of these run; the index page also
//! filters its navigation through the access engine so links the caller
//! cannot follow are never shown.

use crate::access::routes::ADMIN_RESOURCES;
use crate::console::auth::{build_logout_cookie, SESSION_COOKIE};
use crate::console::{ConsoleError, ConsoleState, MaybeSession};
use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::info;

/// Reason attached to the logout surface
#[derive(Debug, Default, Deserialize)]
pub struct LogoutQuery {
    pub reason: Option<String>,
}

/// Reason value the guard uses for expired sessions
pub const SESSION_EXPIRED_REASON: &str = "session_expired";

/// Landing page with navigation filtered by route access
pub async fn index_page(
    State(state): State<ConsoleState>,
    MaybeSession(session): MaybeSession,
) -> Response {
    let Some(session) = session else {
        return Redirect::to(&state.login_path).into_response();
    };

    let links: String = ADMIN_RESOURCES
        .iter()
        .map(|resource| format!("/{resource}"))
        .chain(std::iter::once("/rbac".to_string()))
        .filter(|path| {
            state
                .routes
                .decide(&state.engine, &session.principal, path)
                .allowed
        })
        .map(|path| format!(r#"<li><a href="{path}">{}</a></li>"#, &path[1..]))
        .collect();

    let body = format!(
        "<p>Signed in as <strong>{}</strong></p><ul>{}</ul>{}",
        escape_html(&session.user.username),
        links,
        LOGOUT_FORM
    );

    Html(render("Admin Console", &body)).into_response()
}

/// Login form
pub async fn login_page() -> Html<String> {
    Html(render("Sign in", LOGIN_FORM))
}

/// Logout surface
///
/// Drops the caller's session and clears the cookie. Reached directly by
/// the guard when the backend rejects a session.
pub async fn logout_page(
    State(state): State<ConsoleState>,
    jar: CookieJar,
    Query(query): Query<LogoutQuery>,
) -> (CookieJar, Html<String>) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(session) = state.sessions.remove(cookie.value()) {
            info!(user = %session.user.username, reason = ?query.reason, "Session ended");
        }
    }

    let message = match query.reason.as_deref() {
        Some(SESSION_EXPIRED_REASON) => "Your session has expired. Please sign in again.",
        _ => "You have been signed out.",
    };
    let body = format!(
        r#"<p class="notice">{message}</p><p><a href="{}">Sign in</a></p>"#,
        escape_html(&state.login_path)
    );

    (
        jar.add(build_logout_cookie(state.secure_cookies)),
        Html(render("Signed out", &body)),
    )
}

/// Forbidden surface
pub async fn forbidden_page() -> Html<String> {
    Html(render(
        "Access denied",
        r#"<p class="notice">You do not have permission to view this page.</p><p><a href="/">Back to console</a></p>"#,
    ))
}

/// Resource screen shell
pub async fn resource_page(Path(resource): Path<String>) -> Result<Html<String>, ConsoleError> {
    if !ADMIN_RESOURCES.contains(&resource.as_str()) {
        return Err(ConsoleError::NotFound);
    }
    Ok(Html(render(
        &resource,
        &format!(r#"<div id="records" data-source="/api/{resource}"></div>"#),
    )))
}

/// Single record or `new` form shell
pub async fn record_page(
    Path((resource, id)): Path<(String, String)>,
) -> Result<Html<String>, ConsoleError> {
    if !ADMIN_RESOURCES.contains(&resource.as_str()) {
        return Err(ConsoleError::NotFound);
    }
    let body = if id == "new" {
        format!(r#"<form id="record" data-action="/api/{resource}" method="post"></form>"#)
    } else {
        format!(
            r#"<div id="record" data-source="/api/{resource}/{}"></div>"#,
            escape_html(&id)
        )
    };
    Ok(Html(render(&resource, &body)))
}

/// Role management shell
pub async fn rbac_page() -> Html<String> {
    Html(render(
        "Roles",
        r#"<div id="roles" data-source="/api/roles"></div>"#,
    ))
}

/// Create the page router
pub fn pages_router() -> Router<ConsoleState> {
    Router::new()
        .route("/", get(index_page))
        .route("/login", get(login_page))
        .route("/logout", get(logout_page))
        .route("/forbidden", get(forbidden_page))
        .route("/rbac", get(rbac_page))
        .route("/{resource}", get(resource_page))
        .route("/{resource}/{id}", get(record_page))
}

fn render(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
    <main><h1>{title}</h1>{body}</main>
</body>
</html>"#,
        title = escape_html(title),
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

const STYLE: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #0f172a; color: #e2e8f0; }
main { max-width: 40rem; margin: 4rem auto; padding: 2rem; }
h1 { color: #38bdf8; margin-bottom: 1rem; text-transform: capitalize; }
a { color: #38bdf8; }
li { margin: 0.25rem 0 0.25rem 1.5rem; text-transform: capitalize; }
.notice { color: #94a3b8; margin-bottom: 1rem; }
input, button { display: block; margin: 0.5rem 0; padding: 0.5rem; }
"#;

const LOGIN_FORM: &str = r#"<form id="login">
    <input name="username" placeholder="Username" autocomplete="username" required>
    <input name="password" type="password" placeholder="Password" autocomplete="current-password" required>
    <button type="submit">Sign in</button>
    <p class="notice" id="login-error"></p>
</form>
<script>
document.getElementById('login').addEventListener('submit', async (e) => {
    e.preventDefault();
    const form = new FormData(e.target);
    const res = await fetch('/auth/login', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ username: form.get('username'), password: form.get('password') }),
    });
    if (res.ok) { window.location = '/'; return; }
    const err = await res.json().catch(() => ({}));
    document.getElementById('login-error').textContent = err.message || 'Sign in failed';
});
</script>"#;

const LOGOUT_FORM: &str = r#"<form method="get" action="/logout"><button type="submit">Sign out</button></form>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"x\" & 'y'</b>"), "&lt;b&gt;&quot;x&quot; &amp; &#x27;y&#x27;&lt;/b&gt;");
        assert_eq!(escape_html("ops"), "ops");
    }

    #[test]
    fn test_render_escapes_title() {
        let html = render("<proxies>", "<p>ok</p>");
        assert!(html.contains("&lt;proxies&gt;"));
        assert!(html.contains("<p>ok</p>"));
    }

    #[tokio::test]
    async fn test_unknown_resource_page() {
        let result = resource_page(Path("secrets".to_string())).await;
        assert!(matches!(result, Err(ConsoleError::NotFound)));

        let page = resource_page(Path("devices".to_string())).await.unwrap();
        assert!(page.0.contains("/api/devices"));
    }
}
