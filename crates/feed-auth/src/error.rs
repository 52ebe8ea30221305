//! Error types for credential operations

/// Errors from credential decoding, storage, and issuing-endpoint calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Token is structurally malformed or its expiry claim is unreadable.
    /// Treated the same as an absent token: nothing is stored.
    #[error("expiry claim decode failed: {0}")]
    ClaimDecode(String),

    /// Transport-level failure (DNS, connect, timeout) or unreadable body.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The issuing endpoint returned a non-success status.
    #[error("request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("token file parse error: {0}")]
    StoreParse(String),
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
