use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Storage key for the access token
pub const TOKEN_KEY: &str = "fm_token";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "fm_refresh_token";

/// Body returned by `POST /auth/login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Short-lived bearer token
    pub access_token: String,
    /// Longer-lived token used to mint new access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Body returned by `POST /auth/register`
///
/// The backend currently answers with a plain message; deployments that log
/// the user in on registration return tokens instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegisterResponse {
    Session(LoginResponse),
    Message { message: String },
}

impl RegisterResponse {
    /// Tokens carried by the response, if any
    pub fn session(&self) -> Option<&LoginResponse> {
        match self {
            RegisterResponse::Session(session) => Some(session),
            RegisterResponse::Message { .. } => None,
        }
    }
}

/// Body returned by `POST /auth/refresh`
///
/// Only the access token is used; a rotated refresh token, if the backend
/// sends one, is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// The authenticated user, as returned by `GET /auth/me`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Value,
    pub email: String,
    /// Any further profile fields the backend includes
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}
