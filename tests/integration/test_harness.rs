//! Integration test harness for the FinMind client
//! Runs the real reqwest transport against a mockito backend

use std::path::PathBuf;

use mockito::{Mock, Server, ServerGuard};
use serde_json::{json, Value};

use finmind_client::{ClientConfig, FinMindClient, StorageConfig};

/// Test environment: a mock backend plus a client pointed at it
pub struct TestEnvironment {
    /// Mock FinMind backend
    pub server: ServerGuard,
    /// Client under test
    pub client: FinMindClient,
}

impl TestEnvironment {
    /// Create an environment with in-memory token storage
    pub async fn new() -> Self {
        Self::with_storage(StorageConfig::Memory).await
    }

    /// Create an environment with the given storage backend
    pub async fn with_storage(storage: StorageConfig) -> Self {
        let server = Server::new_async().await;
        let client = client_for(&server.url(), storage);
        Self { server, client }
    }

    /// Mock a JSON endpoint, optionally requiring a bearer token
    pub async fn mock_json(
        &mut self,
        method: &str,
        path: &str,
        bearer: Option<&str>,
        status: usize,
        body: Value,
    ) -> Mock {
        let mut mock = self
            .server
            .mock(method, path)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string());

        if let Some(token) = bearer {
            mock = mock.match_header("authorization", format!("Bearer {}", token).as_str());
        }

        mock.create_async().await
    }

    /// Mock `POST /auth/login` answering with the given tokens
    pub async fn mock_login(&mut self, access: &str, refresh: &str) -> Mock {
        self.mock_json(
            "POST",
            "/auth/login",
            None,
            200,
            json!({ "access_token": access, "refresh_token": refresh }),
        )
        .await
    }

    /// Mock `POST /auth/refresh` for one refresh token
    pub async fn mock_refresh(&mut self, refresh: &str, status: usize, body: Value) -> Mock {
        self.mock_json("POST", "/auth/refresh", Some(refresh), status, body)
            .await
    }
}

/// Build a client for `url` with refresh coordination left at its default
pub fn client_for(url: &str, storage: StorageConfig) -> FinMindClient {
    let config = ClientConfig {
        api_url: url.to_string(),
        sign_in_path: "/signin".to_string(),
        default_return_path: "/dashboard".to_string(),
        single_flight_refresh: true,
        storage,
    };
    FinMindClient::from_config(config).expect("client should build")
}

/// Unique session file path under the temp directory
pub fn temp_session_file() -> PathBuf {
    std::env::temp_dir()
        .join(format!("finmind-it-{}", uuid::Uuid::new_v4()))
        .join("session.json")
}
