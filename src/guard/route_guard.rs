use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::auth::refresh::SessionRefresher;
use crate::auth::token_store::TokenStore;
use crate::guard::cancel::{cancel_pair, CancelHandle, CancelToken};
use crate::guard::state::{
    GuardEvent, GuardState, GuardView, Location, Redirect, DEFAULT_RETURN_PATH, DEFAULT_SIGN_IN_PATH,
};

/// Decides, per mount, whether a protected route may render
///
/// The guard shares the token store with the API client but not its refresh
/// gate; a concurrent refresh from both simply writes the same token twice.
#[derive(Clone)]
pub struct RouteGuard {
    tokens: TokenStore,
    refresher: Arc<dyn SessionRefresher>,
    sign_in_path: String,
    default_return_path: String,
}

impl RouteGuard {
    pub fn new(tokens: TokenStore, refresher: Arc<dyn SessionRefresher>) -> Self {
        Self {
            tokens,
            refresher,
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_string(),
            default_return_path: DEFAULT_RETURN_PATH.to_string(),
        }
    }

    pub fn with_sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.sign_in_path = path.into();
        self
    }

    pub fn with_default_return_path(mut self, path: impl Into<String>) -> Self {
        self.default_return_path = path.into();
        self
    }

    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    /// Where sign-in should navigate afterwards
    pub fn return_path<'a>(&'a self, from: Option<&'a Location>) -> &'a str {
        from.map(|location| location.pathname.as_str())
            .filter(|path| !path.is_empty())
            .unwrap_or(self.default_return_path.as_str())
    }

    /// The decision that needs no network call, if there is one
    fn immediate_event(&self) -> Option<GuardEvent> {
        if usable(self.tokens.access_token()).is_some() {
            Some(GuardEvent::AccessTokenPresent)
        } else if usable(self.tokens.refresh_token()).is_none() {
            Some(GuardEvent::NoSession)
        } else {
            None
        }
    }

    /// Run the session check to completion
    ///
    /// Token effects of the refresh always happen. The resolved state is
    /// returned only if `cancel` has not fired by the time the refresh settles.
    pub async fn check(&self, cancel: CancelToken) -> Option<GuardState> {
        let event = match self.immediate_event() {
            Some(event) => event,
            None => self.refresh_event().await,
        };

        if cancel.is_cancelled() {
            debug!(?event, "Guard unmounted before check settled, dropping result");
            return None;
        }

        Some(GuardState::Checking.transition(event))
    }

    async fn refresh_event(&self) -> GuardEvent {
        let Some(refresh_token) = usable(self.tokens.refresh_token()) else {
            return GuardEvent::NoSession;
        };

        let stored = match self.refresher.refresh(&refresh_token).await {
            Ok(refreshed) => self.tokens.set_access_token(&refreshed.access_token),
            Err(e) => {
                warn!(error = %e, "Guard refresh rejected, clearing session");
                if let Err(e) = self.tokens.clear_session() {
                    error!(error = %e, "Failed to clear session after rejected refresh");
                }
                return GuardEvent::RefreshFailed;
            }
        };

        match stored {
            Ok(()) => {
                info!("Session restored by route guard");
                GuardEvent::RefreshSucceeded
            }
            Err(e) => {
                error!(error = %e, "Failed to store refreshed access token");
                GuardEvent::RefreshFailed
            }
        }
    }

    /// Start guarding `location`
    ///
    /// Resolves synchronously when the stored tokens decide the outcome;
    /// otherwise spawns the refresh check on the current tokio runtime.
    pub fn mount(&self, location: Location) -> MountedGuard {
        let (state_tx, state_rx) = watch::channel(GuardState::Checking);

        if let Some(event) = self.immediate_event() {
            let state = GuardState::Checking.transition(event);
            debug!(path = %location.pathname, ?state, "Guard resolved on mount");
            let _ = state_tx.send(state);
            return MountedGuard {
                location,
                sign_in_path: self.sign_in_path.clone(),
                state: state_rx,
                cancel: None,
                task: None,
            };
        }

        debug!(path = %location.pathname, "Guard checking session");
        let (handle, token) = cancel_pair();
        let guard = self.clone();
        let task = tokio::spawn(async move {
            if let Some(state) = guard.check(token).await {
                let _ = state_tx.send(state);
            }
        });

        MountedGuard {
            location,
            sign_in_path: self.sign_in_path.clone(),
            state: state_rx,
            cancel: Some(handle),
            task: Some(task),
        }
    }
}

/// A guard instance bound to one requested route
///
/// Dropping it has the same effect as [`MountedGuard::unmount`].
pub struct MountedGuard {
    location: Location,
    sign_in_path: String,
    state: watch::Receiver<GuardState>,
    cancel: Option<CancelHandle>,
    task: Option<JoinHandle<()>>,
}

impl MountedGuard {
    pub fn state(&self) -> GuardState {
        *self.state.borrow()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn view(&self) -> GuardView {
        match self.state() {
            GuardState::Checking => GuardView::Pending,
            GuardState::Authenticated => GuardView::Protected,
            GuardState::Unauthenticated => GuardView::Redirect(Redirect {
                to: self.sign_in_path.clone(),
                from: self.location.clone(),
                replace: true,
            }),
        }
    }

    /// Wait for the check to settle
    pub async fn resolved(&mut self) -> GuardState {
        if let Ok(state) = self.state.wait_for(GuardState::is_resolved).await {
            return *state;
        }
        // The check task ended without publishing
        *self.state.borrow()
    }

    /// Receiver following every state change
    pub fn changes(&self) -> watch::Receiver<GuardState> {
        self.state.clone()
    }

    /// Tear down; a pending check will not publish its result
    pub fn unmount(mut self) {
        if let Some(handle) = self.cancel.take() {
            debug!(path = %self.location.pathname, "Guard unmounted");
            handle.cancel();
        }
        // The task keeps running so its token effects still land
        self.task.take();
    }
}

fn usable(token: Option<String>) -> Option<String> {
    token.filter(|token| !token.is_empty())
}
