use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

use crate::auth::storage::{FileStorage, KeyValueStorage, MemoryStorage};
use crate::error::{FinMindError, FinMindResult};
use crate::guard::{DEFAULT_RETURN_PATH, DEFAULT_SIGN_IN_PATH};

// Default configuration values
const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_SESSION_FILE: &str = "finmind.session.json";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the FinMind backend
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Where unauthenticated visitors are redirected
    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,
    /// Post sign-in destination when the origin is unknown
    #[serde(default = "default_return_path")]
    pub default_return_path: String,
    /// Share one refresh between concurrent 401s
    #[serde(default = "default_single_flight_refresh")]
    pub single_flight_refresh: bool,
    /// Token storage backend
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Token storage backend selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Tokens live only as long as the process
    Memory,
    /// Tokens persist in a JSON file
    File {
        #[serde(default = "default_session_file")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::File {
            path: default_session_file(),
        }
    }
}

// Default functions
fn default_api_url() -> String {
    std::env::var("FINMIND_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string())
}

fn default_sign_in_path() -> String {
    std::env::var("FINMIND_SIGN_IN_PATH").unwrap_or_else(|_| DEFAULT_SIGN_IN_PATH.to_string())
}

fn default_return_path() -> String {
    std::env::var("FINMIND_RETURN_PATH").unwrap_or_else(|_| DEFAULT_RETURN_PATH.to_string())
}

fn default_single_flight_refresh() -> bool {
    std::env::var("FINMIND_SINGLE_FLIGHT_REFRESH")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(true)
}

fn default_session_file() -> PathBuf {
    std::env::var("FINMIND_SESSION_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SESSION_FILE))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            sign_in_path: default_sign_in_path(),
            default_return_path: default_return_path(),
            single_flight_refresh: default_single_flight_refresh(),
            storage: StorageConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Base URL without trailing slashes
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    /// Check values that would otherwise fail on first use
    pub fn validate(&self) -> FinMindResult<()> {
        let url = self.base_url();
        let Some(host) = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
        else {
            return Err(FinMindError::config("api_url", "must start with http:// or https://"));
        };
        if host.is_empty() {
            return Err(FinMindError::config("api_url", "missing host"));
        }

        for (key, path) in [
            ("sign_in_path", &self.sign_in_path),
            ("default_return_path", &self.default_return_path),
        ] {
            if !path.starts_with('/') {
                return Err(FinMindError::config(key, format!("'{}' must be an absolute path", path)));
            }
        }

        if let StorageConfig::File { path } = &self.storage {
            if path.as_os_str().is_empty() {
                return Err(FinMindError::config("storage.path", "must not be empty"));
            }
        }

        Ok(())
    }

    /// Build the configured token storage backend
    pub fn open_storage(&self) -> FinMindResult<Arc<dyn KeyValueStorage>> {
        match &self.storage {
            StorageConfig::Memory => Ok(Arc::new(MemoryStorage::new())),
            StorageConfig::File { path } => Ok(Arc::new(FileStorage::open(path)?)),
        }
    }
}

/// Load configuration
///
/// Reads `path`, or `FINMIND_CONFIG_PATH` when no path is given. Without a
/// file the defaults (and their environment overrides) are used.
pub async fn load_config(path: Option<&Path>) -> FinMindResult<ClientConfig> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => std::env::var("FINMIND_CONFIG_PATH").ok().map(PathBuf::from),
    };

    let config = match path {
        Some(path) => read_config(&path).await?,
        None => {
            debug!("No configuration file, using defaults");
            ClientConfig::default()
        }
    };

    config.validate()?;
    Ok(config)
}

async fn read_config(path: &Path) -> FinMindResult<ClientConfig> {
    let config_str = fs::read_to_string(path)
        .await
        .map_err(|e| FinMindError::config(path.display().to_string(), e))?;
    let config: ClientConfig = serde_json::from_str(&config_str)
        .map_err(|e| FinMindError::config(path.display().to_string(), e))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}
