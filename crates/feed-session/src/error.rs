//! Error types for session operations
//!
//! The taxonomy the UI relies on: transport and credential-rejection errors
//! pass through from `feed_auth`; `ProfileUnavailable` is the distinct
//! "credential issued but profile fetch failed" case; and
//! `AuthorizationRejected` is the sentinel for a 401/403 on a protected
//! call — the pipeline has already torn the session down when it surfaces,
//! so call sites are not expected to handle it individually.

/// Errors from session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure or issuing-endpoint rejection.
    #[error(transparent)]
    Auth(#[from] feed_auth::Error),

    /// No refresh record exists — refresh fails without a network call.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// Refresh was attempted and failed; the session has been cleared.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Token issuance succeeded but the subsequent profile fetch failed;
    /// the session has been rolled back rather than left half-authenticated.
    #[error("credential issued but profile unavailable: {0}")]
    ProfileUnavailable(String),

    /// A protected call returned 401/403; the interceptor has already
    /// cleared the session and redirected to login.
    #[error("authorization rejected by server ({0})")]
    AuthorizationRejected(u16),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
