//! Integration tests for request execution and refresh-on-401
use anyhow::Result;
use mockito::Matcher;
use serde_json::{json, Value};

use crate::test_harness::TestEnvironment;
use finmind_client::{FinMindError, RequestOptions, ResponseBody};

/// A 401 with a valid refresh token is invisible to the caller
#[tokio::test]
async fn test_expired_access_token_is_refreshed_and_retried() -> Result<()> {
    let mut env = TestEnvironment::new().await;
    env.client.tokens().store_session("OLD", Some("R"))?;

    let stale = env
        .mock_json("GET", "/expenses", Some("OLD"), 401, json!({ "msg": "Token has expired" }))
        .await;
    let refresh = env
        .mock_refresh("R", 200, json!({ "access_token": "NEW" }))
        .await;
    let fresh = env
        .mock_json("GET", "/expenses", Some("NEW"), 200, json!([{ "id": 1, "amount": 12.5 }]))
        .await;

    let expenses: Value = env.client.api().get("/expenses").await?;

    assert_eq!(expenses, json!([{ "id": 1, "amount": 12.5 }]));
    assert_eq!(env.client.tokens().access_token().as_deref(), Some("NEW"));
    assert_eq!(env.client.tokens().refresh_token().as_deref(), Some("R"));

    stale.assert_async().await;
    refresh.assert_async().await;
    fresh.assert_async().await;
    Ok(())
}

/// A rejected refresh clears the session and reports Unauthorized
#[tokio::test]
async fn test_rejected_refresh_clears_session() -> Result<()> {
    let mut env = TestEnvironment::new().await;
    env.client.tokens().store_session("OLD", Some("R"))?;

    let _mock = env.mock_json("GET", "/bills", Some("OLD"), 401, json!({})).await;
    let refresh = env
        .mock_refresh("R", 401, json!({ "msg": "Token has been revoked" }))
        .await;

    let err = env
        .client
        .api()
        .request("/bills", RequestOptions::get())
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(env.client.tokens().access_token(), None);
    assert_eq!(env.client.tokens().refresh_token(), None);
    refresh.assert_async().await;
    Ok(())
}

/// Backend error bodies become the error message
#[tokio::test]
async fn test_backend_error_message_is_surfaced() -> Result<()> {
    let mut env = TestEnvironment::new().await;
    env.client.tokens().set_access_token("A")?;

    let _mock = env
        .mock_json("POST", "/expenses", Some("A"), 400, json!({ "error": "amount must be positive" }))
        .await;

    let err = env
        .client
        .api()
        .request("/expenses", RequestOptions::post(json!({ "amount": -1 })))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "amount must be positive");
    assert!(matches!(err, FinMindError::Request { status: 400, .. }));
    Ok(())
}

/// Requests without a stored token carry no Authorization header
#[tokio::test]
async fn test_anonymous_request_and_text_body() -> Result<()> {
    let mut env = TestEnvironment::new().await;

    let health = env
        .server
        .mock("GET", "/health")
        .match_header("authorization", Matcher::Missing)
        .match_header("content-type", "application/json")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("ok")
        .create_async()
        .await;

    let body = env
        .client
        .api()
        .request("/health", RequestOptions::get())
        .await?;

    assert_eq!(body, ResponseBody::Text("ok".to_string()));
    health.assert_async().await;
    Ok(())
}

/// Concurrent 401s trigger a single refresh under the default policy
#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() -> Result<()> {
    let mut env = TestEnvironment::new().await;
    env.client.tokens().store_session("OLD", Some("R"))?;

    let _mock = env.mock_json("GET", "/budgets", Some("OLD"), 401, json!({})).await;
    let refresh = env
        .server
        .mock("POST", "/auth/refresh")
        .match_header("authorization", "Bearer R")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "access_token": "NEW" }).to_string())
        .expect(1)
        .create_async()
        .await;
    let fresh = env
        .server
        .mock("GET", "/budgets")
        .match_header("authorization", "Bearer NEW")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .expect(3)
        .create_async()
        .await;

    let api = env.client.api();
    let results = futures::future::join_all(
        (0..3).map(|_| api.request("/budgets", RequestOptions::get())),
    )
    .await;

    for result in results {
        assert_eq!(result?, ResponseBody::Json(json!([])));
    }
    refresh.assert_async().await;
    fresh.assert_async().await;
    Ok(())
}
