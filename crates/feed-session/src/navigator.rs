//! Navigation sink for session-driven redirects
//!
//! The session layer never renders anything; it only needs to know which
//! view is active (to avoid a redirect loop on the login surface) and to be
//! able to force the login view when the server rejects the session. The UI
//! observes view changes through a watch channel.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::info;

/// Application views the session layer distinguishes.
///
/// Only `Login` and `Register` matter to the redirect-loop guard; the rest
/// exist so the UI can drive the same channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Register,
    Home,
    Profile,
}

impl View {
    /// Views where a forced redirect to login would loop.
    fn is_auth_surface(self) -> bool {
        matches!(self, View::Login | View::Register)
    }
}

/// Tracks the active view and broadcasts forced navigation.
pub struct Navigator {
    tx: watch::Sender<View>,
    forced: AtomicU64,
}

impl Navigator {
    pub fn new(initial: View) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            tx,
            forced: AtomicU64::new(0),
        }
    }

    /// Record a user-driven navigation.
    pub fn set_view(&self, view: View) {
        self.tx.send_replace(view);
    }

    pub fn current_view(&self) -> View {
        *self.tx.borrow()
    }

    /// Force navigation to the login view after a session teardown.
    ///
    /// No-op when the login or registration surface is already active, so a
    /// rejected call issued from the login form cannot redirect in a loop.
    /// Returns whether a navigation actually happened.
    pub fn force_login(&self) -> bool {
        let navigated = self.tx.send_if_modified(|view| {
            if view.is_auth_surface() {
                false
            } else {
                *view = View::Login;
                true
            }
        });
        if navigated {
            self.forced.fetch_add(1, Ordering::Relaxed);
            info!("session rejected, navigating to login");
        }
        navigated
    }

    /// Subscribe to view changes.
    pub fn subscribe(&self) -> watch::Receiver<View> {
        self.tx.subscribe()
    }

    /// Number of forced navigations since construction.
    pub fn forced_navigations(&self) -> u64 {
        self.forced.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_login_navigates_from_other_views() {
        let navigator = Navigator::new(View::Home);
        assert!(navigator.force_login());
        assert_eq!(navigator.current_view(), View::Login);
        assert_eq!(navigator.forced_navigations(), 1);
    }

    #[test]
    fn force_login_is_a_noop_on_auth_surfaces() {
        let navigator = Navigator::new(View::Login);
        assert!(!navigator.force_login());
        assert_eq!(navigator.forced_navigations(), 0);

        navigator.set_view(View::Register);
        assert!(!navigator.force_login());
        assert_eq!(navigator.current_view(), View::Register);
        assert_eq!(navigator.forced_navigations(), 0);
    }

    #[tokio::test]
    async fn subscribers_observe_forced_navigation() {
        let navigator = Navigator::new(View::Profile);
        let mut rx = navigator.subscribe();

        navigator.force_login();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), View::Login);
    }
}
