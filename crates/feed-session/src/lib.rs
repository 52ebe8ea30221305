//! Session manager for the feedstream client
//!
//! Owns the authenticated session end to end: the facade the UI consumes
//! (login, register, logout, refresh, current user), the background
//! scheduler that renews the access credential before it expires, and the
//! request pipeline that injects the credential into protected calls and
//! tears the session down on server-side rejection.
//!
//! Session flow:
//! 1. `SessionManager::login()` calls the issuing endpoint and persists the
//!    returned pair via `feed_auth::TokenStore`
//! 2. `init()` spawns the scheduler, which probes the access record every
//!    minute and refreshes when it expires within the threshold
//! 3. `ProtectedClient` reads the store at send time and attaches the
//!    bearer credential; on 401/403 it clears the session and forces
//!    navigation to the login view
//! 4. Overlapping refresh triggers coalesce into one network call — every
//!    waiter observes the same outcome

pub mod error;
pub mod manager;
pub mod navigator;
pub mod pipeline;
pub mod scheduler;
pub mod users;

pub use error::{Error, Result};
pub use manager::{SessionConfig, SessionManager, SessionState};
pub use navigator::{Navigator, View};
pub use pipeline::ProtectedClient;
pub use scheduler::{DEFAULT_EXPIRY_THRESHOLD, DEFAULT_REFRESH_INTERVAL, is_expiring_soon};
pub use users::{ProfileUpdate, UserProfile, UsersApi};

#[cfg(test)]
pub(crate) mod testutil;
