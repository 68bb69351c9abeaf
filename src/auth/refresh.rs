use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::auth::token::RefreshResponse;
use crate::error::{FinMindError, FinMindResult};
use crate::http_client::{HttpClient, HttpMethod, HttpRequest};

/// Path of the refresh endpoint, relative to the API base URL
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Exchanges a refresh token for a new access token
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    /// Ask the backend for a new access token
    ///
    /// Any non-OK answer is a rejection. No retry is attempted.
    async fn refresh(&self, refresh_token: &str) -> FinMindResult<RefreshResponse>;
}

/// Refresher calling `POST /auth/refresh` directly on the transport
///
/// It never goes through [`crate::api::ApiClient`], so a 401 here cannot
/// trigger another refresh.
pub struct HttpSessionRefresher {
    http: Arc<dyn HttpClient>,
    base_url: String,
}

impl HttpSessionRefresher {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, REFRESH_PATH)
    }
}

#[async_trait]
impl SessionRefresher for HttpSessionRefresher {
    async fn refresh(&self, refresh_token: &str) -> FinMindResult<RefreshResponse> {
        let url = self.endpoint();
        debug!(url = %url, "Requesting access token refresh");

        // flask-jwt-extended reads the refresh JWT from the header
        let request = HttpRequest::new(HttpMethod::Post, url)
            .with_header("Content-Type", "application/json")
            .with_header("Authorization", format!("Bearer {}", refresh_token))
            .with_body(json!({ "refresh_token": refresh_token }).to_string());

        let response = self.http.send(request).await?;

        if !response.is_success() {
            let message = response.error_message();
            warn!(status = response.status(), message = %message, "Refresh rejected");
            return Err(FinMindError::request(response.status(), message));
        }

        Ok(response.json::<RefreshResponse>()?)
    }
}
