use serde::{Deserialize, Serialize};

/// Where to send the user after sign-in when no origin is known
pub const DEFAULT_RETURN_PATH: &str = "/dashboard";

/// Sign-in destination for redirects
pub const DEFAULT_SIGN_IN_PATH: &str = "/signin";

/// Session state of one mounted guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    /// Not yet known; nothing is rendered
    Checking,
    Authenticated,
    Unauthenticated,
}

/// Inputs driving [`GuardState::transition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardEvent {
    AccessTokenPresent,
    RefreshSucceeded,
    RefreshFailed,
    NoSession,
}

impl GuardState {
    /// Apply an event; resolved states ignore everything
    pub fn transition(self, event: GuardEvent) -> GuardState {
        match (self, event) {
            (GuardState::Checking, GuardEvent::AccessTokenPresent)
            | (GuardState::Checking, GuardEvent::RefreshSucceeded) => GuardState::Authenticated,
            (GuardState::Checking, GuardEvent::RefreshFailed)
            | (GuardState::Checking, GuardEvent::NoSession) => GuardState::Unauthenticated,
            (resolved, _) => resolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, GuardState::Checking)
    }
}

/// The route a visitor asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub pathname: String,
    /// Query string including the leading `?`, or empty
    #[serde(default)]
    pub search: String,
}

impl Location {
    /// Parse a path such as `/bills?month=3`; any `#fragment` is dropped
    pub fn new(path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        let path = path.split('#').next().unwrap_or(path);
        match path.find('?') {
            Some(index) => Self {
                pathname: path[..index].to_string(),
                search: path[index..].to_string(),
            },
            None => Self {
                pathname: path.to_string(),
                search: String::new(),
            },
        }
    }
}

/// Navigation to sign-in that remembers where the visitor was going
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub to: String,
    pub from: Location,
    /// Replace the history entry instead of pushing
    pub replace: bool,
}

impl Redirect {
    pub fn return_path(&self) -> &str {
        &self.from.pathname
    }
}

/// The origin captured by a redirect, or `/dashboard`
pub fn return_path_or_default(from: Option<&Location>) -> &str {
    from.map(|location| location.pathname.as_str())
        .filter(|path| !path.is_empty())
        .unwrap_or(DEFAULT_RETURN_PATH)
}

/// What the UI should show for a guarded route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardView {
    /// Render nothing yet
    Pending,
    Protected,
    Redirect(Redirect),
}
