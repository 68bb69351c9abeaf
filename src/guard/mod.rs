//! Route guard for protected views
//!
//! Each mount runs a small state machine (`Checking` to `Authenticated` or
//! `Unauthenticated`) and hands the UI a [`GuardView`] to render.

pub mod cancel;
pub mod route_guard;
pub mod state;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use route_guard::{MountedGuard, RouteGuard};
pub use state::{
    return_path_or_default, GuardEvent, GuardState, GuardView, Location, Redirect,
    DEFAULT_RETURN_PATH, DEFAULT_SIGN_IN_PATH,
};
