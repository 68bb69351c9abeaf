use std::sync::Arc;
use tracing::{debug, error, info};

use crate::auth::storage::{KeyValueStorage, MemoryStorage};
use crate::auth::token::{REFRESH_TOKEN_KEY, TOKEN_KEY};
use crate::error::FinMindResult;
use crate::event_bus::{AuthChanged, AuthEventBus, Subscription};

/// Single source of truth for the access and refresh tokens
///
/// Every mutation is written to the storage backend first and then announced
/// with exactly one [`AuthChanged`] event. Clones share the same backend and
/// the same event bus.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
    events: AuthEventBus,
}

impl TokenStore {
    /// Create a token store over the given backend
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            events: AuthEventBus::new(),
        }
    }

    /// Create a token store that keeps tokens in memory only
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Current access token
    pub fn access_token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY)
    }

    /// Persist a new access token and notify listeners
    pub fn set_access_token(&self, token: &str) -> FinMindResult<()> {
        self.write(TOKEN_KEY, Some(token))
    }

    /// Remove the access token and notify listeners
    pub fn clear_access_token(&self) -> FinMindResult<()> {
        self.write(TOKEN_KEY, None)
    }

    /// Current refresh token
    pub fn refresh_token(&self) -> Option<String> {
        self.storage.get(REFRESH_TOKEN_KEY)
    }

    /// Persist a new refresh token and notify listeners
    pub fn set_refresh_token(&self, token: &str) -> FinMindResult<()> {
        self.write(REFRESH_TOKEN_KEY, Some(token))
    }

    /// Remove the refresh token and notify listeners
    pub fn clear_refresh_token(&self) -> FinMindResult<()> {
        self.write(REFRESH_TOKEN_KEY, None)
    }

    /// Store the tokens returned by a login
    ///
    /// Each token is written with its own setter, so listeners see one event
    /// per token.
    pub fn store_session(&self, access_token: &str, refresh_token: Option<&str>) -> FinMindResult<()> {
        self.set_access_token(access_token)?;
        if let Some(refresh_token) = refresh_token {
            self.set_refresh_token(refresh_token)?;
        }
        info!(with_refresh = refresh_token.is_some(), "Session stored");
        Ok(())
    }

    /// Remove both tokens, announcing the change once both are gone
    pub fn clear_session(&self) -> FinMindResult<()> {
        if let Err(e) = self.storage.remove_all(&[TOKEN_KEY, REFRESH_TOKEN_KEY]) {
            error!(error = %e, "Failed to clear session tokens");
            return Err(e.into());
        }
        info!("Session cleared");
        self.events.emit();
        Ok(())
    }

    /// Check whether a non-empty access token is stored
    pub fn has_access_token(&self) -> bool {
        self.access_token().is_some_and(|token| !token.is_empty())
    }

    /// Register a listener for token mutations
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(AuthChanged) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    /// The event bus announcing token mutations
    pub fn events(&self) -> &AuthEventBus {
        &self.events
    }

    fn write(&self, key: &str, value: Option<&str>) -> FinMindResult<()> {
        let result = match value {
            Some(value) => self.storage.set(key, value),
            None => self.storage.remove(key),
        };

        if let Err(e) = result {
            error!(key = key, error = %e, "Failed to write token");
            return Err(e.into());
        }

        debug!(key = key, cleared = value.is_none(), "Token store updated");
        self.events.emit();
        Ok(())
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FinMindError, StorageError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Storage whose writes always fail
    struct BrokenStorage;

    impl KeyValueStorage for BrokenStorage {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }
    }

    fn counting(store: &TokenStore) -> (Arc<AtomicUsize>, Subscription) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sub = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (hits, sub)
    }

    #[test]
    fn test_every_mutation_emits_exactly_one_event() {
        let store = TokenStore::in_memory();
        let (hits, _sub) = counting(&store);

        store.set_access_token("abc").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(store.access_token().as_deref(), Some("abc"));

        store.set_refresh_token("ref").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(store.refresh_token().as_deref(), Some("ref"));

        store.clear_access_token().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(store.access_token(), None);

        store.clear_refresh_token().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert_eq!(store.refresh_token(), None);
    }

    #[test]
    fn test_setting_overwrites_previous_token() {
        let store = TokenStore::in_memory();
        store.set_access_token("first").unwrap();
        store.set_access_token("second").unwrap();

        assert_eq!(store.access_token().as_deref(), Some("second"));
    }

    #[test]
    fn test_clearing_absent_token_still_emits() {
        let store = TokenStore::in_memory();
        let (hits, _sub) = counting(&store);

        store.clear_access_token().unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(store.access_token(), None);
    }

    #[test]
    fn test_event_is_emitted_after_write_completes() {
        let store = TokenStore::in_memory();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let reader = store.clone();
        let log = Arc::clone(&seen);
        let _sub = store.subscribe(move |_| {
            log.lock().unwrap().push(reader.access_token());
        });

        store.set_access_token("abc").unwrap();
        store.clear_access_token().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Some("abc".to_string()), None]);
    }

    #[test]
    fn test_clear_session_removes_both_before_single_event() {
        let store = TokenStore::in_memory();
        store.store_session("access", Some("refresh")).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let reader = store.clone();
        let log = Arc::clone(&seen);
        let _sub = store.subscribe(move |_| {
            log.lock()
                .unwrap()
                .push((reader.access_token(), reader.refresh_token()));
        });

        store.clear_session().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(None, None)]);
    }

    #[test]
    fn test_store_session_emits_once_per_token() {
        let store = TokenStore::in_memory();
        let (hits, _sub) = counting(&store);

        store.store_session("access", None).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(store.refresh_token(), None);

        store.store_session("access", Some("refresh")).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(store.has_access_token());
    }

    #[test]
    fn test_failed_write_emits_nothing() {
        let store = TokenStore::new(Arc::new(BrokenStorage));
        let (hits, _sub) = counting(&store);

        let result = store.set_access_token("abc");

        assert!(matches!(result, Err(FinMindError::Storage(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(store.clear_session().is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clones_share_backend_and_listeners() {
        let store = TokenStore::in_memory();
        let (hits, _sub) = counting(&store);

        let other = store.clone();
        other.set_access_token("shared").unwrap();

        assert_eq!(store.access_token().as_deref(), Some("shared"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
