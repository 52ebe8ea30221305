//! Credential layer for the feedstream client
//!
//! Provides the expiry-claim codec, the durable token store, and the client
//! for the unauthenticated credential-issuing endpoints (register, login,
//! token refresh, verify). This crate is a standalone library with no
//! dependency on the session manager — it can be tested and used
//! independently.
//!
//! Credential flow:
//! 1. Session manager calls `endpoints::AuthEndpoints::login()` (or register)
//! 2. Returned pair stored via `store::TokenStore::set_pair()` — expiry is
//!    derived by decoding each token's `exp` claim, never supplied externally
//! 3. Session manager reads `TokenStore::get(TokenKind::Access)` per request
//! 4. Refresh path calls `AuthEndpoints::refresh()` and rotates the records

pub mod claims;
pub mod endpoints;
pub mod error;
pub mod store;

pub use claims::decode_expiry;
pub use endpoints::{
    AuthEndpoints, LoginRequest, RefreshResponse, RegisterRequest, TokenPair, VerifyResponse,
};
pub use error::{Error, Result};
pub use store::{StoredToken, TokenKind, TokenStore, now_millis};
