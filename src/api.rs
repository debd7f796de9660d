//! Remote API Client
//!
//! Thin bearer-token client over the backend REST API.
//! Every non-2xx response is mapped into an [`ApiError`] carrying the
//! server-supplied message when the body has one.
//!
//! GET responses go through the [`ApiCache`]; mutations revalidate the
//! path they touched.

use crate::cache::{ApiCache, CachedResponse};
use crate::config::Config;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Field name -> validation messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Remote API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Session expired or missing")]
    Unauthenticated { message: Option<String> },

    #[error("Insufficient permissions")]
    Forbidden { message: Option<String> },

    #[error("Validation failed")]
    Validation {
        message: Option<String>,
        errors: FieldErrors,
    },

    #[error("API error {status}")]
    Status { status: u16, message: Option<String> },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No API token available")]
    MissingToken,
}

impl ApiError {
    /// Build an error from a failed response status and its body
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
        let message = parsed.as_ref().and_then(ErrorBody::message);

        match status {
            401 => ApiError::Unauthenticated { message },
            403 => ApiError::Forbidden { message },
            400 | 422 => match parsed.and_then(|b| b.errors).filter(|e| !e.is_empty()) {
                Some(errors) => ApiError::Validation { message, errors },
                None => ApiError::Status { status, message },
            },
            _ => ApiError::Status { status, message },
        }
    }

    /// Server-supplied human readable message, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthenticated { message }
            | ApiError::Forbidden { message }
            | ApiError::Validation { message, .. }
            | ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// HTTP status behind this error, when it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthenticated { .. } => Some(401),
            ApiError::Forbidden { .. } => Some(403),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ApiError::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

/// Error body shapes returned by the backend
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<serde_json::Value>,
    detail: Option<String>,
    #[serde(default, deserialize_with = "deserialize_field_errors")]
    errors: Option<FieldErrors>,
}

impl ErrorBody {
    fn message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.detail.clone())
            .or_else(|| match &self.error {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(serde_json::Value::Object(o)) => o
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string),
                _ => None,
            })
            .filter(|m| !m.trim().is_empty())
    }
}

/// Accepts `{"field": "msg"}` as well as `{"field": ["msg", ...]}`
fn deserialize_field_errors<'de, D>(deserializer: D) -> Result<Option<FieldErrors>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|map| {
        map.into_iter()
            .map(|(field, value)| {
                let messages = match value {
                    serde_json::Value::String(s) => vec![s],
                    serde_json::Value::Array(items) => items
                        .into_iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                    other => vec![other.to_string()],
                };
                (field, messages)
            })
            .collect()
    }))
}

/// Authenticated user profile returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Successful login payload
#[derive(Debug, Clone, Deserialize)]
pub struct LoginGrant {
    #[serde(alias = "access_token", alias = "accessToken")]
    pub token: String,
    #[serde(alias = "profile")]
    pub user: Profile,
}

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

/// Backend API client
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    cache: ApiCache,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, cache: ApiCache) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
        })
    }

    /// Create from config
    pub fn from_config(config: &Config, cache: ApiCache) -> Result<Self, ApiError> {
        Self::new(
            &config.api_base_url,
            Duration::from_secs(config.api_timeout_secs),
            cache,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache(&self) -> &ApiCache {
        &self.cache
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Check the backend answers at all
    ///
    /// Any HTTP status counts as reachable; only transport failures do not.
    pub async fn ping(&self) -> Result<(), ApiError> {
        let response = self.client.get(&self.base_url).send().await?;
        debug!(status = response.status().as_u16(), "Backend reachable");
        Ok(())
    }

    /// Send one request and return the decoded JSON body
    async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, ApiError> {
        if token.is_some_and(|t| t.trim().is_empty()) {
            warn!(method = %method, path = %path, "Backend call without a token");
            return Err(ApiError::MissingToken);
        }

        debug!(method = %method, path = %path, "Calling backend API");

        let mut request = self
            .client
            .request(method.clone(), self.url(path))
            .header("accept", "application/json");

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(method = %method, path = %path, status = status.as_u16(), "Backend API error");
            return Err(ApiError::from_response(status.as_u16(), &text));
        }

        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// GET through the response cache
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, ApiError> {
        let key = ApiCache::compute_key(token, path);

        if let Some(cached) = self.cache.get(&key).await {
            return Ok(serde_json::from_value(cached.body)?);
        }

        let body = self.send(Method::GET, path, Some(token), None).await?;
        self.cache
            .set(
                &key,
                CachedResponse {
                    path: path.to_string(),
                    body: body.clone(),
                },
            )
            .await;

        Ok(serde_json::from_value(body)?)
    }

    pub async fn post_json<B, T>(&self, path: &str, token: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.mutate(Method::POST, path, token, Some(serde_json::to_value(body)?))
            .await
    }

    pub async fn put_json<B, T>(&self, path: &str, token: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.mutate(Method::PUT, path, token, Some(serde_json::to_value(body)?))
            .await
    }

    pub async fn delete(&self, path: &str, token: &str) -> Result<(), ApiError> {
        self.mutate::<serde_json::Value>(Method::DELETE, path, token, None)
            .await
            .map(|_| ())
    }

    /// Mutating call; revalidates the collection the path belongs to
    async fn mutate<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let response = self.send(method, path, Some(token), body.as_ref()).await?;
        self.cache.revalidate_path(collection_path(path));
        Ok(serde_json::from_value(response)?)
    }

    /// Exchange credentials for a bearer token
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginGrant, ApiError> {
        let body = serde_json::to_value(LoginBody { username, password })?;
        let response = self.send(Method::POST, "/auth/login", None, Some(&body)).await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Fetch the current profile, bypassing the cache
    pub async fn profile(&self, token: &str) -> Result<Profile, ApiError> {
        let response = self.send(Method::GET, "/auth/me", Some(token), None).await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Tell the backend to drop the token; failures are ignored by callers
    pub async fn logout(&self, token: &str) -> Result<(), ApiError> {
        self.send(Method::POST, "/auth/logout", Some(token), None)
            .await
            .map(|_| ())
    }
}

/// First path segment: `/proxies/3/rotate` -> `/proxies`
pub fn collection_path(path: &str) -> &str {
    let trimmed = path.split('?').next().unwrap_or(path);
    let end = trimmed
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '/')
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}
