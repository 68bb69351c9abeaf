//! Integration tests for sign-in, sign-up and sign-out flows
use anyhow::Result;
use mockito::Matcher;
use serde_json::json;

use crate::test_harness::{client_for, temp_session_file, TestEnvironment};
use finmind_client::{FinMindError, StorageConfig};

/// Login, then an expired access token is refreshed without the caller noticing
#[tokio::test]
async fn test_login_expiry_and_transparent_refresh() -> Result<()> {
    let mut env = TestEnvironment::new().await;

    let login = env
        .server
        .mock("POST", "/auth/login")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::Json(json!({ "email": "ada@example.com", "password": "secret123" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "access_token": "A1", "refresh_token": "R1" }).to_string())
        .create_async()
        .await;

    env.client.auth().sign_in("ada@example.com", "secret123").await?;
    login.assert_async().await;
    assert_eq!(env.client.tokens().access_token().as_deref(), Some("A1"));
    assert_eq!(env.client.tokens().refresh_token().as_deref(), Some("R1"));

    // A1 has expired by the time the next request goes out
    let expired = env
        .mock_json("GET", "/auth/me", Some("A1"), 401, json!({ "msg": "Token has expired" }))
        .await;
    let refresh = env
        .mock_refresh("R1", 200, json!({ "access_token": "A2" }))
        .await;
    let me = env
        .mock_json(
            "GET",
            "/auth/me",
            Some("A2"),
            200,
            json!({ "id": 42, "email": "ada@example.com", "preferred_currency": "INR" }),
        )
        .await;

    let principal = env.client.auth().me().await?;

    assert_eq!(principal.email, "ada@example.com");
    assert_eq!(principal.id, json!(42));
    assert_eq!(env.client.tokens().access_token().as_deref(), Some("A2"));
    expired.assert_async().await;
    refresh.assert_async().await;
    me.assert_async().await;
    Ok(())
}

/// Wrong credentials report the backend's message, not Unauthorized
#[tokio::test]
async fn test_failed_login_reports_backend_message() -> Result<()> {
    let mut env = TestEnvironment::new().await;
    let _mock = env
        .mock_json("POST", "/auth/login", None, 401, json!({ "error": "invalid credentials" }))
        .await;

    let err = env
        .client
        .auth()
        .sign_in("ada@example.com", "nope")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "invalid credentials");
    assert!(!env.client.tokens().has_access_token());
    Ok(())
}

/// Registration that answers with a message is followed by a login
#[tokio::test]
async fn test_sign_up_registers_then_signs_in() -> Result<()> {
    let mut env = TestEnvironment::new().await;
    let register = env
        .mock_json("POST", "/auth/register", None, 201, json!({ "message": "registered" }))
        .await;
    let login = env.mock_login("A", "R").await;

    env.client.auth().sign_up("grace@example.com", "longpassword").await?;

    register.assert_async().await;
    login.assert_async().await;
    assert!(env.client.tokens().has_access_token());

    let err = env
        .client
        .auth()
        .sign_up("grace@example.com", "short")
        .await
        .unwrap_err();
    assert!(matches!(err, FinMindError::InvalidInput { .. }));
    Ok(())
}

/// Sign-out revokes the refresh token and clears the store
#[tokio::test]
async fn test_sign_out_revokes_refresh_token() -> Result<()> {
    let mut env = TestEnvironment::new().await;
    env.client.tokens().store_session("A", Some("R"))?;
    let logout = env
        .mock_json("POST", "/auth/logout", Some("R"), 200, json!({ "message": "logged out" }))
        .await;

    env.client.auth().sign_out().await?;

    logout.assert_async().await;
    assert_eq!(env.client.tokens().access_token(), None);
    assert_eq!(env.client.tokens().refresh_token(), None);
    Ok(())
}

/// File-backed sessions are picked up by a new client
#[tokio::test]
async fn test_file_session_survives_new_client() -> Result<()> {
    let path = temp_session_file();
    let storage = StorageConfig::File { path: path.clone() };
    let mut env = TestEnvironment::with_storage(storage.clone()).await;
    let _mock = env.mock_login("A", "R").await;

    env.client.auth().sign_in("ada@example.com", "secret123").await?;

    let restarted = client_for(&env.server.url(), storage);
    assert_eq!(restarted.tokens().access_token().as_deref(), Some("A"));
    assert_eq!(restarted.tokens().refresh_token().as_deref(), Some("R"));

    std::fs::remove_dir_all(path.parent().expect("session file has a parent"))?;
    Ok(())
}
