//! Auth change notifications
//!
//! A small publish/subscribe subject owned by the token store. Listeners are
//! plain closures called synchronously, in registration order, every time the
//! store mutates. Async consumers can additionally take a broadcast receiver.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// Name of the notification, kept for log output
pub const AUTH_CHANGED_EVENT: &str = "auth_changed";

/// Capacity of the broadcast channel for async subscribers
pub const AUTH_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Zero-payload signal: "the token store mutated"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChanged;

/// Type for listener IDs
pub type ListenerId = Uuid;

type Listener = Arc<dyn Fn(AuthChanged) + Send + Sync>;
type ListenerList = RwLock<Vec<(ListenerId, Listener)>>;

/// Subject distributing [`AuthChanged`] to every registered listener
#[derive(Clone)]
pub struct AuthEventBus {
    /// Synchronous listeners in registration order
    listeners: Arc<ListenerList>,
    /// Broadcast sender for async subscribers
    sender: broadcast::Sender<AuthChanged>,
    /// Number of events emitted so far
    emitted: Arc<AtomicU64>,
}

impl AuthEventBus {
    /// Create a new, listener-less bus
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(AUTH_EVENT_CHANNEL_CAPACITY);
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
            sender,
            emitted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a listener; it stays attached until the returned
    /// [`Subscription`] is dropped or unsubscribed
    ///
    /// Events emitted before this call are not replayed, so callers should
    /// read the current token state right after subscribing.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(AuthChanged) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.push((id, Arc::new(listener)));
        trace!(listener_id = %id, listeners = listeners.len(), "Registered auth listener");

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Get a receiver for async consumption of auth change events
    pub fn subscribe_channel(&self) -> broadcast::Receiver<AuthChanged> {
        self.sender.subscribe()
    }

    /// Notify every listener, returning how many synchronous listeners ran
    pub fn emit(&self) -> usize {
        // Snapshot so listeners may subscribe/unsubscribe while being called
        let snapshot: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        self.emitted.fetch_add(1, Ordering::SeqCst);

        for listener in &snapshot {
            listener(AuthChanged);
        }

        // No receivers is fine; async subscribers are optional
        let _ = self.sender.send(AuthChanged);

        trace!(
            event = AUTH_CHANGED_EVENT,
            listeners = snapshot.len(),
            "Emitted auth change"
        );
        snapshot.len()
    }

    /// Get the current number of synchronous listeners
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Get the number of events emitted since creation
    pub fn emitted_count(&self) -> u64 {
        self.emitted.load(Ordering::SeqCst)
    }
}

impl Default for AuthEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle keeping a listener attached to an [`AuthEventBus`]
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    id: ListenerId,
    listeners: Weak<ListenerList>,
}

impl Subscription {
    /// ID of the attached listener
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Detach the listener now
    pub fn unsubscribe(self) {
        // Drop does the work
    }

    fn detach(&self) -> bool {
        let Some(listeners) = self.listeners.upgrade() else {
            return false;
        };
        let mut listeners = listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != self.id);
        before != listeners.len()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detach() {
            trace!(listener_id = %self.id, "Unregistered auth listener");
        }
    }
}
