use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiClient, RequestOptions, LOGOUT_PATH};
use crate::auth::token::{LoginResponse, Principal, RegisterResponse};
use crate::auth::token_store::TokenStore;
use crate::error::{FinMindError, FinMindResult};

/// Minimum password length accepted by [`AuthService::sign_up`]
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Session flows built on the auth endpoints
///
/// `login` and `register` are the raw endpoint calls; `sign_in`, `sign_up` and
/// `sign_out` also update the token store.
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn tokens(&self) -> &TokenStore {
        self.api.tokens()
    }

    /// Exchange credentials for tokens without storing them
    pub async fn login(&self, email: &str, password: &str) -> FinMindResult<LoginResponse> {
        self.api
            .request_json(
                "/auth/login",
                RequestOptions::post(json!({ "email": email, "password": password })).anonymous(),
            )
            .await
    }

    /// Create an account
    pub async fn register(&self, email: &str, password: &str) -> FinMindResult<RegisterResponse> {
        self.api
            .request_json(
                "/auth/register",
                RequestOptions::post(json!({ "email": email, "password": password })).anonymous(),
            )
            .await
    }

    /// Log in and store the returned session
    #[instrument(skip(self, password), level = "debug")]
    pub async fn sign_in(&self, email: &str, password: &str) -> FinMindResult<LoginResponse> {
        let session = self.login(email, password).await?;
        self.tokens()
            .store_session(&session.access_token, session.refresh_token.as_deref())?;
        info!("Signed in");
        Ok(session)
    }

    /// Validate, register, then make sure a session is stored
    ///
    /// Backends that answer registration with tokens are used directly;
    /// otherwise the new credentials are signed in.
    #[instrument(skip(self, password), level = "debug")]
    pub async fn sign_up(&self, email: &str, password: &str) -> FinMindResult<LoginResponse> {
        let email = email.trim();
        if email.is_empty() {
            return Err(FinMindError::invalid_input("Email is required"));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(FinMindError::invalid_input(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        match self.register(email, password).await? {
            RegisterResponse::Session(session) => {
                self.tokens()
                    .store_session(&session.access_token, session.refresh_token.as_deref())?;
                info!("Registered and signed in");
                Ok(session)
            }
            RegisterResponse::Message { message } => {
                debug!(message = %message, "Registered, signing in");
                self.sign_in(email, password).await
            }
        }
    }

    /// Current principal
    pub async fn me(&self) -> FinMindResult<Principal> {
        self.api.get("/auth/me").await
    }

    /// Revoke the refresh token if possible and always clear the session
    pub async fn sign_out(&self) -> FinMindResult<()> {
        if let Some(refresh_token) = self.tokens().refresh_token().filter(|t| !t.is_empty()) {
            let options = RequestOptions::post(json!({}))
                .anonymous()
                .header("Authorization", format!("Bearer {}", refresh_token));

            if let Err(e) = self.api.request(LOGOUT_PATH, options).await {
                warn!(error = %e, "Logout request failed, clearing session anyway");
            }
        }

        self.tokens().clear_session()?;
        info!("Signed out");
        Ok(())
    }
}
