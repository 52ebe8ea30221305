//! Protected users-service client
//!
//! The profile endpoints are the only protected routes the session layer
//! calls itself; everything else (posts, comments, likes) belongs to the
//! application and goes through its own `ProtectedClient`.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pipeline::ProtectedClient;

/// The authenticated user's profile, as returned by `GET /users/me`.
///
/// Held in memory only — after a restart it is re-derived from a valid
/// access credential, never read from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// Partial profile mutation for `PUT /users/me`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Users-service operations over the credential-injecting pipeline.
#[derive(Clone)]
pub struct UsersApi {
    client: ProtectedClient,
}

impl UsersApi {
    pub fn new(client: ProtectedClient) -> Self {
        Self { client }
    }

    /// Fetch the current user's profile (bearer credential required).
    pub async fn me(&self) -> Result<UserProfile> {
        self.client.get_json("/users/me").await
    }

    /// Update the current user's profile.
    pub async fn update_me(&self, update: &ProfileUpdate) -> Result<UserProfile> {
        self.client.put_json("/users/me", update).await
    }
}
