use std::sync::Arc;
use tracing::info;

// Export modules
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod guard;
pub mod http_client;
pub mod observer;

pub use api::{ApiClient, RefreshPolicy, RequestOptions, ResponseBody};
pub use auth::{
    AuthService, FileStorage, HttpSessionRefresher, KeyValueStorage, LoginResponse,
    MemoryStorage, Principal, RefreshResponse, RegisterResponse, SessionRefresher, TokenStore,
};
pub use config::{load_config, ClientConfig, StorageConfig};
pub use error::{ErrorCategory, FinMindError, FinMindResult, StorageError, TransportError};
pub use event_bus::{AuthChanged, AuthEventBus, Subscription};
pub use guard::{GuardState, GuardView, Location, MountedGuard, Redirect, RouteGuard};
pub use http_client::{HttpClient, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use observer::AuthObserver;

/// Everything a UI needs, wired from one [`ClientConfig`]
///
/// The API client, auth service and route guards share one token store, so a
/// refresh done by any of them is visible to the others.
#[derive(Clone)]
pub struct FinMindClient {
    config: ClientConfig,
    tokens: TokenStore,
    api: ApiClient,
    auth: AuthService,
    refresher: Arc<dyn SessionRefresher>,
}

impl FinMindClient {
    /// Build a client with the reqwest transport and the configured storage
    pub fn from_config(config: ClientConfig) -> FinMindResult<Self> {
        config.validate()?;
        let storage = config.open_storage()?;
        let http = Arc::new(ReqwestHttpClient::new()?);
        Ok(Self::with_parts(config, storage, http))
    }

    /// Build a client over an explicit storage backend and transport
    pub fn with_parts(
        config: ClientConfig,
        storage: Arc<dyn KeyValueStorage>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let tokens = TokenStore::new(storage);
        let refresher: Arc<dyn SessionRefresher> = Arc::new(HttpSessionRefresher::new(
            Arc::clone(&http),
            config.base_url(),
        ));
        let api = ApiClient::with_parts(http, config.base_url(), tokens.clone(), Arc::clone(&refresher))
            .with_refresh_policy(RefreshPolicy::from_single_flight(config.single_flight_refresh));
        let auth = AuthService::new(api.clone());

        info!(
            api_url = %config.base_url(),
            refresh_policy = ?api.refresh_policy(),
            "FinMind client ready"
        );

        Self {
            config,
            tokens,
            api,
            auth,
            refresher,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// A route guard using the configured sign-in and return paths
    pub fn route_guard(&self) -> RouteGuard {
        RouteGuard::new(self.tokens.clone(), Arc::clone(&self.refresher))
            .with_sign_in_path(self.config.sign_in_path.clone())
            .with_default_return_path(self.config.default_return_path.clone())
    }

    /// A signed-in flag that follows the token store
    pub fn observer(&self) -> AuthObserver {
        AuthObserver::new(&self.tokens)
    }
}
