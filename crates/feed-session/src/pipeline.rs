//! Credential injection and failure interception for protected services
//!
//! `ProtectedClient` is the one way session-managed code talks to protected
//! services. The access credential is read from the store at send time, not
//! when the call is constructed, so a refresh that lands between the two is
//! picked up. When no credential exists the request goes out anonymously —
//! public-readable routes must keep working for logged-out users.
//!
//! The response side is the sole teardown path for server-side rejection:
//! a 401/403 clears the store, nulls the current user, and forces the login
//! view (unless the login/registration surface is already active).

use std::sync::Arc;

use feed_auth::{TokenKind, TokenStore};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::navigator::Navigator;
use crate::users::UserProfile;

/// Request pipeline for one protected service base URL.
///
/// Clone is cheap — the inner client and shared state are all reference
/// counted, and clones observe the same session.
#[derive(Clone)]
pub struct ProtectedClient {
    client: reqwest::Client,
    base_url: String,
    store: Arc<TokenStore>,
    navigator: Arc<Navigator>,
    current_user: Arc<RwLock<Option<UserProfile>>>,
}

impl ProtectedClient {
    pub(crate) fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        store: Arc<TokenStore>,
        navigator: Arc<Navigator>,
        current_user: Arc<RwLock<Option<UserProfile>>>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            store,
            navigator,
            current_user,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send::<()>(Method::GET, path, None).await?;
        decode_body(response, path).await
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(Method::POST, path, Some(body)).await?;
        decode_body(response, path).await
    }

    pub async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(Method::PUT, path, Some(body)).await?;
        decode_body(response, path).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send::<()>(Method::DELETE, path, None).await?;
        Ok(())
    }

    /// Send one request with credential injection and rejection handling.
    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response> {
        let request_id = Uuid::new_v4();
        let url = format!("{}{path}", self.base_url);

        let mut request = self.client.request(method.clone(), &url);

        // Credential read happens here, at send time. A missing or expired
        // record means the request goes out without an Authorization header.
        match self.store.get(TokenKind::Access).await {
            Some(token) => {
                request = request.bearer_auth(token);
                debug!(%request_id, %method, path, "sending with bearer credential");
            }
            None => {
                debug!(%request_id, %method, path, "sending without credential");
            }
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| feed_auth::Error::Http(format!("request to {path} failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(%request_id, %status, path, "authorization rejected, tearing down session");
            metrics::counter!("session_authorization_rejected_total").increment(1);
            self.teardown().await;
            return Err(Error::AuthorizationRejected(status.as_u16()));
        }

        if !status.is_success() {
            let detail = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_owned))
                .unwrap_or_else(|| format!("{method} {path} failed"));
            return Err(Error::Auth(feed_auth::Error::Rejected {
                status: status.as_u16(),
                detail,
            }));
        }

        Ok(response)
    }

    /// Clear every trace of the session and force the login view.
    async fn teardown(&self) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear token store during teardown");
        }
        *self.current_user.write().await = None;
        self.navigator.force_login();
    }
}

async fn decode_body<T: DeserializeOwned>(response: reqwest::Response, path: &str) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| Error::Auth(feed_auth::Error::Http(format!("invalid response from {path}: {e}"))))
}
