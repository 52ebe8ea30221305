//! Credential-issuing endpoint client
//!
//! Covers the four unauthenticated endpoints of the auth service: register,
//! login, token refresh, and token verification. These calls never carry a
//! bearer credential — injecting a stale token here would make login itself
//! fail, so the session manager routes them around the protected pipeline.
//!
//! The base URL is deployment configuration, not hard-coded.

use common::Secret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Fallback when the server rejects a request without a `detail` body.
const GENERIC_REJECTION: &str = "authentication request failed";

/// Body for `POST /login`.
///
/// The password stays wrapped for its whole lifetime: it serializes into the
/// request body but never appears in Debug output or logs.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: Secret<String>,
}

/// Body for `POST /register`.
#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: Secret<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
}

/// Response from register and login: a full credential pair.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Response from `POST /token/refresh`.
///
/// A new access token is always returned; the refresh token is only rotated
/// when the server chooses to.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Response from `POST /verify-token`.
#[derive(Debug, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Server-side rejection body shape: `{"detail": "..."}`.
#[derive(Debug, Deserialize)]
struct RejectionBody {
    detail: String,
}

/// Client for the credential-issuing service.
///
/// Clone is cheap — `reqwest::Client` shares its connection pool internally.
#[derive(Clone)]
pub struct AuthEndpoints {
    client: reqwest::Client,
    base_url: String,
}

impl AuthEndpoints {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    /// Register a new account and receive an initial credential pair.
    pub async fn register(&self, request: &RegisterRequest) -> Result<TokenPair> {
        self.post_json("/register", request).await
    }

    /// Exchange username/password for a credential pair.
    pub async fn login(&self, request: &LoginRequest) -> Result<TokenPair> {
        self.post_json("/login", request).await
    }

    /// Obtain a new access token (and possibly a rotated refresh token).
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse> {
        self.post_json(
            "/token/refresh",
            &serde_json::json!({ "refresh": refresh_token }),
        )
        .await
    }

    /// Ask the auth service whether a token is valid.
    ///
    /// Not part of the lifecycle path — exposed for other services and tools.
    pub async fn verify(&self, token: &str) -> Result<VerifyResponse> {
        self.post_json("/verify-token", &serde_json::json!({ "token": token }))
            .await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "issuing-endpoint request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Http(format!("request to {path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<RejectionBody>()
                .await
                .map(|b| b.detail)
                .unwrap_or_else(|_| GENERIC_REJECTION.to_owned());
            return Err(Error::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::Http(format!("invalid response from {path}: {e}")))
    }
}
