//! Integration tests for the route guard and auth observer
use anyhow::Result;
use serde_json::json;

use crate::test_harness::TestEnvironment;
use finmind_client::{GuardState, GuardView, Location};

/// A stored refresh token lets the guard restore the session
#[tokio::test]
async fn test_guard_restores_session_from_refresh_token() -> Result<()> {
    let mut env = TestEnvironment::new().await;
    env.client.tokens().set_refresh_token("R")?;
    let refresh = env
        .mock_refresh("R", 200, json!({ "access_token": "A" }))
        .await;

    let observer = env.client.observer();
    assert!(!observer.is_signed_in());

    let mut mounted = env.client.route_guard().mount(Location::new("/dashboard"));
    assert_eq!(mounted.view(), GuardView::Pending);

    assert_eq!(mounted.resolved().await, GuardState::Authenticated);
    assert_eq!(mounted.view(), GuardView::Protected);
    assert!(observer.is_signed_in());
    refresh.assert_async().await;
    Ok(())
}

/// A rejected refresh sends the visitor to sign-in with their origin
#[tokio::test]
async fn test_guard_redirects_after_rejected_refresh() -> Result<()> {
    let mut env = TestEnvironment::new().await;
    env.client.tokens().set_refresh_token("R")?;
    let _mock = env
        .mock_refresh("R", 401, json!({ "msg": "Token has expired" }))
        .await;

    let mut mounted = env.client.route_guard().mount(Location::new("/bills?due=soon"));
    assert_eq!(mounted.resolved().await, GuardState::Unauthenticated);

    let GuardView::Redirect(redirect) = mounted.view() else {
        panic!("expected a redirect");
    };
    assert_eq!(redirect.to, "/signin");
    assert_eq!(redirect.return_path(), "/bills");
    assert!(redirect.replace);
    assert_eq!(env.client.tokens().refresh_token(), None);
    Ok(())
}

/// With an access token the guard makes no request at all
#[tokio::test]
async fn test_guard_with_access_token_skips_network() -> Result<()> {
    let mut env = TestEnvironment::new().await;
    env.client.tokens().set_access_token("A")?;
    let refresh = env
        .server
        .mock("POST", "/auth/refresh")
        .expect(0)
        .create_async()
        .await;

    let mounted = env.client.route_guard().mount(Location::new("/expenses"));

    assert_eq!(mounted.view(), GuardView::Protected);
    refresh.assert_async().await;
    Ok(())
}
