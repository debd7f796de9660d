//! Backend API Client Integration Tests
//!
//! Tests for request caching, revalidation and error mapping against a stub
//! backend.

mod common;

use admin_console::api::ApiError;
use admin_console::{ApiCache, ApiClient};
use serde_json::{json, Value};
use std::time::Duration;

async fn client() -> (ApiClient, std::sync::Arc<common::Backend>) {
    let (base_url, backend) = common::spawn_backend().await;
    let cache = ApiCache::new(100, 60, true);
    let client = ApiClient::new(&base_url, Duration::from_secs(5), cache).unwrap();
    (client, backend)
}

#[tokio::test]
async fn test_login_accepts_access_token_alias() {
    let (client, backend) = client().await;
    backend.grant(&["operator"], &["device.view"]);

    let grant = client.login("ops", common::PASSWORD).await.unwrap();

    assert_eq!(grant.token, common::TOKEN);
    assert_eq!(grant.user.username, "ops");
    assert_eq!(grant.user.permissions, vec!["device.view"]);
}

#[tokio::test]
async fn test_login_rejected() {
    let (client, _backend) = client().await;

    let err = client.login("ops", "wrong").await.unwrap_err();

    assert!(matches!(err, ApiError::Unauthenticated { .. }));
    assert_eq!(err.server_message(), Some("Invalid credentials"));
}

#[tokio::test]
async fn test_get_is_cached_per_token() {
    let (client, backend) = client().await;

    let first: Value = client.get_json("/devices", common::TOKEN).await.unwrap();
    let second: Value = client.get_json("/devices", common::TOKEN).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(backend.device_hits(), 1);

    // A different token never sees another caller's cached response
    let _: Value = client.get_json("/devices", "tok-2").await.unwrap();
    assert_eq!(backend.device_hits(), 2);
}

#[tokio::test]
async fn test_mutation_revalidates_collection() {
    let (client, backend) = client().await;

    let _: Value = client.get_json("/devices", common::TOKEN).await.unwrap();
    assert_eq!(backend.device_hits(), 1);

    client.delete("/devices/1", common::TOKEN).await.unwrap();
    client.cache().sync().await;

    let _: Value = client.get_json("/devices", common::TOKEN).await.unwrap();
    assert_eq!(backend.device_hits(), 2);
}

#[tokio::test]
async fn test_validation_error_carries_field_errors() {
    let (client, _backend) = client().await;

    let err = client
        .post_json::<_, Value>("/devices", common::TOKEN, &json!({}))
        .await
        .unwrap_err();

    let errors = err.field_errors().unwrap();
    assert_eq!(errors["serial"], vec!["required"]);
    assert_eq!(errors["model"], vec!["unknown model"]);
    assert_eq!(err.server_message(), Some("Validation failed"));
}

#[tokio::test]
async fn test_status_errors_mapped() {
    let (client, _backend) = client().await;

    let err = client.get_json::<Value>("/proxies", common::TOKEN).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthenticated { .. }));

    let err = client.get_json::<Value>("/tasks", common::TOKEN).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden { .. }));

    let err = client.get_json::<Value>("/transactions", common::TOKEN).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.server_message(), Some("Ledger unavailable"));

    let err = client
        .post_json::<_, Value>("/accounts", common::TOKEN, &json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.server_message(), None);
}

#[tokio::test]
async fn test_failed_get_is_not_cached() {
    let (client, _backend) = client().await;

    let _ = client.get_json::<Value>("/transactions", common::TOKEN).await;
    client.cache().sync().await;

    assert_eq!(client.cache().stats().entries, 0);
}

#[tokio::test]
async fn test_profile_expired_token() {
    let (client, _backend) = client().await;

    let err = client.profile("expired").await.unwrap_err();

    assert!(matches!(err, ApiError::Unauthenticated { .. }));
}

#[tokio::test]
async fn test_blank_token_is_refused_locally() {
    let (client, backend) = client().await;

    let err = client.get_json::<Value>("/devices", "").await.unwrap_err();
    assert!(matches!(err, ApiError::MissingToken));

    let err = client.delete("/devices/1", "  ").await.unwrap_err();
    assert!(matches!(err, ApiError::MissingToken));

    assert_eq!(backend.device_hits(), 0);
}
