use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::refresh::{HttpSessionRefresher, SessionRefresher, REFRESH_PATH};
use crate::auth::token_store::TokenStore;
use crate::error::{FinMindError, FinMindResult};
use crate::http_client::{HttpClient, HttpMethod, HttpRequest, HttpResponse};

/// Logout endpoint, also exempt from refresh handling
pub const LOGOUT_PATH: &str = "/auth/logout";

/// How concurrent 401s share refresh attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Refreshes are serialized; a request that waited on another's refresh
    /// reuses the new token instead of refreshing again
    #[default]
    SingleFlight,
    /// Every 401 refreshes on its own
    Independent,
}

impl RefreshPolicy {
    pub fn from_single_flight(enabled: bool) -> Self {
        if enabled {
            RefreshPolicy::SingleFlight
        } else {
            RefreshPolicy::Independent
        }
    }
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    /// Send without the access token and skip refresh handling
    pub anonymous: bool,
}

impl RequestOptions {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(HttpMethod::Get)
    }

    pub fn post(body: Value) -> Self {
        Self::new(HttpMethod::Post).with_body(body)
    }

    pub fn patch(body: Value) -> Self {
        Self::new(HttpMethod::Patch).with_body(body)
    }

    pub fn delete() -> Self {
        Self::new(HttpMethod::Delete)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header; caller headers override the JSON content type
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }
}

/// Decoded body of a successful response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    /// The body as JSON; text bodies become a JSON string
    pub fn into_json(self) -> Value {
        match self {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            ResponseBody::Json(_) => None,
        }
    }
}

/// Authenticated request wrapper with refresh-and-retry on 401
#[derive(Clone)]
pub struct ApiClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    tokens: TokenStore,
    refresher: Arc<dyn SessionRefresher>,
    policy: RefreshPolicy,
    refresh_gate: Arc<Mutex<()>>,
    unguarded: Vec<String>,
}

impl ApiClient {
    /// Create a client refreshing through `POST {base_url}/auth/refresh`
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>, tokens: TokenStore) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let refresher = Arc::new(HttpSessionRefresher::new(Arc::clone(&http), base_url.clone()));
        Self::with_parts(http, base_url, tokens, refresher)
    }

    /// Create a client with an explicit refresher
    pub fn with_parts(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        tokens: TokenStore,
        refresher: Arc<dyn SessionRefresher>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            refresher,
            policy: RefreshPolicy::default(),
            refresh_gate: Arc::new(Mutex::new(())),
            unguarded: vec![REFRESH_PATH.to_string(), LOGOUT_PATH.to_string()],
        }
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.policy
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Perform a request, refreshing the session once on 401
    ///
    /// A 401 with no refresh token, or a rejected refresh, clears the session
    /// and fails with [`FinMindError::Unauthorized`]. After a successful
    /// refresh the request is resent exactly once and that answer is final.
    pub async fn request(&self, path: &str, options: RequestOptions) -> FinMindResult<ResponseBody> {
        let sent_token = if options.anonymous {
            None
        } else {
            usable(self.tokens.access_token())
        };

        let mut response = self.send(path, &options, sent_token.as_deref()).await?;

        if response.is_unauthorized() && !options.anonymous && self.is_guarded(path) {
            response = self.recover(path, &options, sent_token).await?;
        }

        decode(path, response)
    }

    /// Perform a request and deserialize the JSON body
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> FinMindResult<T> {
        let value = self.request(path, options).await?.into_json();
        serde_json::from_value(value).map_err(|e| FinMindError::Transport(e.into()))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> FinMindResult<T> {
        self.request_json(path, RequestOptions::get()).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> FinMindResult<T> {
        self.request_json(path, RequestOptions::post(to_value(body)?)).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> FinMindResult<T> {
        self.request_json(path, RequestOptions::patch(to_value(body)?)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> FinMindResult<T> {
        self.request_json(path, RequestOptions::delete()).await
    }

    fn is_guarded(&self, path: &str) -> bool {
        let bare = path.split(['?', '#']).next().unwrap_or(path);
        !self.unguarded.iter().any(|exempt| exempt == bare)
    }

    fn build_request(&self, path: &str, options: &RequestOptions, token: Option<&str>) -> HttpRequest {
        let mut headers: HashMap<String, String> = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        for (key, value) in &options.headers {
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case(key));
            headers.insert(key.clone(), value.clone());
        }

        if let Some(token) = token {
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case("authorization"));
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }

        HttpRequest {
            method: options.method,
            url: format!("{}{}", self.base_url, path),
            headers,
            body: options
                .body
                .as_ref()
                .filter(|body| !body.is_null())
                .map(Value::to_string),
        }
    }

    async fn send(
        &self,
        path: &str,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> FinMindResult<HttpResponse> {
        let request = self.build_request(path, options, token);
        debug!(
            method = options.method.as_str(),
            path = %path,
            authenticated = token.is_some(),
            "Sending request"
        );

        let response = self.http.send(request).await?;
        debug!(path = %path, status = response.status(), "Received response");
        Ok(response)
    }

    /// Handle a 401 on a guarded path
    async fn recover(
        &self,
        path: &str,
        options: &RequestOptions,
        sent_token: Option<String>,
    ) -> FinMindResult<HttpResponse> {
        let access_token = match self.policy {
            RefreshPolicy::Independent => self.refresh_session(path).await?,
            RefreshPolicy::SingleFlight => {
                let _gate = self.refresh_gate.lock().await;
                match usable(self.tokens.access_token()) {
                    Some(current) if Some(&current) != sent_token.as_ref() => {
                        debug!(path = %path, "Session already refreshed by a concurrent request");
                        current
                    }
                    _ => self.refresh_session(path).await?,
                }
            }
        };

        let retried = self.send(path, options, Some(&access_token)).await?;
        if retried.is_unauthorized() {
            warn!(path = %path, "Request still unauthorized after refresh");
            return Err(FinMindError::Unauthorized);
        }
        Ok(retried)
    }

    /// Refresh the access token, clearing the session when that is impossible
    async fn refresh_session(&self, path: &str) -> FinMindResult<String> {
        let Some(refresh_token) = usable(self.tokens.refresh_token()) else {
            warn!(path = %path, "Unauthorized without a refresh token, clearing session");
            self.tokens.clear_session()?;
            return Err(FinMindError::Unauthorized);
        };

        match self.refresher.refresh(&refresh_token).await {
            Ok(refreshed) => {
                self.tokens.set_access_token(&refreshed.access_token)?;
                info!(path = %path, "Access token refreshed");
                Ok(refreshed.access_token)
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Refresh failed, clearing session");
                self.tokens.clear_session()?;
                Err(FinMindError::Unauthorized)
            }
        }
    }
}

/// Empty strings are treated as no token
fn usable(token: Option<String>) -> Option<String> {
    token.filter(|token| !token.is_empty())
}

fn to_value<B: Serialize>(body: &B) -> FinMindResult<Value> {
    serde_json::to_value(body).map_err(|e| FinMindError::Transport(e.into()))
}

fn decode(path: &str, response: HttpResponse) -> FinMindResult<ResponseBody> {
    if !response.is_success() {
        let message = response.error_message();
        debug!(path = %path, status = response.status(), message = %message, "Request failed");
        return Err(FinMindError::request(response.status(), message));
    }

    if response.is_json() {
        Ok(ResponseBody::Json(response.json()?))
    } else {
        Ok(ResponseBody::Text(response.text()))
    }
}
