use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::auth::token_store::TokenStore;
use crate::error::FinMindResult;
use crate::event_bus::Subscription;

/// Signed-in flag for navigation chrome, kept current by token store events
pub struct AuthObserver {
    tokens: TokenStore,
    signed_in: Arc<watch::Sender<bool>>,
    _subscription: Subscription,
}

impl AuthObserver {
    pub fn new(tokens: &TokenStore) -> Self {
        // Read eagerly; events emitted before subscribing are not replayed
        let (sender, _) = watch::channel(tokens.has_access_token());
        let signed_in = Arc::new(sender);

        let reader = tokens.clone();
        let publisher = Arc::clone(&signed_in);
        let subscription = tokens.subscribe(move |_| {
            let now = reader.has_access_token();
            publisher.send_if_modified(|current| {
                let changed = *current != now;
                *current = now;
                changed
            });
        });

        Self {
            tokens: tokens.clone(),
            signed_in,
            _subscription: subscription,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        *self.signed_in.borrow()
    }

    /// Receiver notified whenever the flag flips
    pub fn changes(&self) -> watch::Receiver<bool> {
        self.signed_in.subscribe()
    }

    /// Drop both tokens without contacting the backend
    pub fn sign_out_locally(&self) -> FinMindResult<()> {
        debug!("Local sign-out");
        self.tokens.clear_session()
    }
}
