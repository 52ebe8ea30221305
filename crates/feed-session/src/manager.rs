//! Session facade and state machine
//!
//! `SessionManager` is constructed once per process and passed by reference
//! to whatever needs it — there is no ambient global session. `init()`
//! restores any persisted session and spawns the renewal scheduler;
//! `dispose()` aborts the scheduler so no timer leaks past teardown.
//!
//! Refresh is single-flight: the first trigger starts the network call and
//! parks the pending future; overlapping triggers (a timer tick while a
//! request-driven check is already refreshing) attach to the same future
//! and observe the same outcome. Refresh failure is terminal for the
//! session — the store is cleared and the user nulled, never retried
//! automatically.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use feed_auth::{AuthEndpoints, LoginRequest, RegisterRequest, TokenKind, TokenPair, TokenStore};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::navigator::{Navigator, View};
use crate::pipeline::ProtectedClient;
use crate::scheduler::{
    DEFAULT_EXPIRY_THRESHOLD, DEFAULT_REFRESH_INTERVAL, is_expiring_soon, spawn_refresh_task,
};
use crate::users::{ProfileUpdate, UserProfile, UsersApi};

/// Deployment-time settings for the session manager.
///
/// Base URLs come from configuration, never hard-coded into session logic.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub auth_base_url: String,
    pub users_base_url: String,
    /// Durable location of the credential pair.
    pub token_file: PathBuf,
    pub refresh_interval: Duration,
    pub expiry_threshold: Duration,
}

impl SessionConfig {
    pub fn new(
        auth_base_url: impl Into<String>,
        users_base_url: impl Into<String>,
        token_file: PathBuf,
    ) -> Self {
        Self {
            auth_base_url: auth_base_url.into(),
            users_base_url: users_base_url.into(),
            token_file,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            expiry_threshold: DEFAULT_EXPIRY_THRESHOLD,
        }
    }
}

/// Where the session currently stands.
///
/// Transitions:
/// - Unauthenticated → Authenticating → Authenticated (login/register)
/// - Authenticating → Unauthenticated (issuance or profile fetch failed)
/// - Authenticated → Refreshing → Authenticated (renewal succeeded)
/// - Refreshing → Unauthenticated (renewal failed, session cleared)
/// - Authenticated → Unauthenticated (logout or server-side rejection)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Refreshing,
}

/// Outcome shared between coalesced refresh triggers.
type SharedRefresh = Shared<BoxFuture<'static, std::result::Result<(), Arc<Error>>>>;

struct Inner {
    endpoints: AuthEndpoints,
    users: UsersApi,
    store: Arc<TokenStore>,
    navigator: Arc<Navigator>,
    current_user: Arc<RwLock<Option<UserProfile>>>,
    state: Mutex<SessionState>,
    last_error: Mutex<Option<String>>,
    refresh_inflight: Mutex<Option<SharedRefresh>>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
    refresh_interval: Duration,
    expiry_threshold: Duration,
    http_client: reqwest::Client,
}

impl Inner {
    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap() = state;
    }

    fn record_error(&self, error: &Error) {
        *self.last_error.lock().unwrap() = Some(error.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.lock().unwrap() = None;
    }

    /// Remove both records and the in-memory user.
    async fn clear_session(&self) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear token store");
        }
        *self.current_user.write().await = None;
    }

    /// One actual refresh attempt. Only ever runs inside the single-flight
    /// future; callers go through `SessionManager::refresh`.
    async fn run_refresh(&self) -> Result<()> {
        self.set_state(SessionState::Refreshing);

        let Some(refresh_token) = self.store.get(TokenKind::Refresh).await else {
            // Nothing to present: fail immediately, no network call
            self.clear_session().await;
            self.set_state(SessionState::Unauthenticated);
            metrics::counter!("session_refresh_total", "outcome" => "no_token").increment(1);
            return Err(Error::NoRefreshToken);
        };

        match self.endpoints.refresh(&refresh_token).await {
            Ok(response) => {
                let persisted = match response.refresh.as_deref() {
                    // Server rotated the refresh token: replace the pair as a unit
                    Some(rotated) => self.store.set_pair(&response.access, rotated).await,
                    None => self.store.set(TokenKind::Access, &response.access).await,
                };
                if let Err(e) = persisted {
                    warn!(error = %e, "renewed credential failed to persist, clearing session");
                    self.clear_session().await;
                    self.set_state(SessionState::Unauthenticated);
                    metrics::counter!("session_refresh_total", "outcome" => "failure").increment(1);
                    return Err(Error::Auth(e));
                }
                debug!("access credential renewed");
                metrics::counter!("session_refresh_total", "outcome" => "success").increment(1);
                self.set_state(SessionState::Authenticated);
                Ok(())
            }
            Err(e) => {
                // Terminal: a rejected or unreachable refresh endpoint ends the session
                warn!(error = %e, "token refresh failed, clearing session");
                self.clear_session().await;
                self.set_state(SessionState::Unauthenticated);
                metrics::counter!("session_refresh_total", "outcome" => "failure").increment(1);
                Err(Error::Auth(e))
            }
        }
    }
}

/// The public session surface.
///
/// Clone is cheap and all clones observe the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Build a manager from deployment config and a shared HTTP client.
    ///
    /// Loads (or cold-starts) the token file; does not spawn anything —
    /// call `init()` for that.
    pub async fn new(config: SessionConfig, http_client: reqwest::Client) -> Result<Self> {
        let store = Arc::new(TokenStore::load(config.token_file).await?);
        let navigator = Arc::new(Navigator::new(View::Home));
        let current_user = Arc::new(RwLock::new(None));

        let endpoints = AuthEndpoints::new(http_client.clone(), config.auth_base_url);
        let protected = ProtectedClient::new(
            http_client.clone(),
            config.users_base_url,
            store.clone(),
            navigator.clone(),
            current_user.clone(),
        );

        Ok(Self {
            inner: Arc::new(Inner {
                endpoints,
                users: UsersApi::new(protected),
                store,
                navigator,
                current_user,
                state: Mutex::new(SessionState::Unauthenticated),
                last_error: Mutex::new(None),
                refresh_inflight: Mutex::new(None),
                scheduler: Mutex::new(None),
                refresh_interval: config.refresh_interval,
                expiry_threshold: config.expiry_threshold,
                http_client,
            }),
        })
    }

    /// Restore any persisted session, then start the renewal scheduler.
    ///
    /// Idempotent: a second call while the scheduler is running does nothing.
    pub async fn init(&self) {
        let restored = self.restore().await;

        let mut scheduler = self.inner.scheduler.lock().unwrap();
        if scheduler.is_none() {
            *scheduler = Some(spawn_refresh_task(
                self.clone(),
                self.inner.refresh_interval,
            ));
            info!(restored, "session manager started");
        }
    }

    /// Stop the renewal scheduler. Safe to call more than once.
    pub fn dispose(&self) {
        if let Some(handle) = self.inner.scheduler.lock().unwrap().take() {
            handle.abort();
            info!("session manager stopped");
        }
    }

    /// Re-derive the session from the durable records after a restart.
    ///
    /// Returns whether a usable session came back. Failure to restore is not
    /// an error — the process simply starts logged out.
    pub async fn restore(&self) -> bool {
        match self.check_and_refresh().await {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn!(error = %e, "stored session could not be renewed");
                return false;
            }
        }

        match self.inner.users.me().await {
            Ok(profile) => {
                info!(username = %profile.username, "session restored");
                *self.inner.current_user.write().await = Some(profile);
                self.inner.set_state(SessionState::Authenticated);
                true
            }
            Err(e) => {
                warn!(error = %e, "profile fetch failed during restore, clearing session");
                self.inner.clear_session().await;
                self.inner.set_state(SessionState::Unauthenticated);
                false
            }
        }
    }

    /// Exchange credentials for a session.
    ///
    /// Any existing session is cleared first so old and new credentials can
    /// never mix. If issuance succeeds but the profile fetch fails, the
    /// store is rolled back and the error is `ProfileUnavailable` —
    /// distinguishable from bad credentials.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<UserProfile> {
        self.inner.clear_error();
        self.inner.set_state(SessionState::Authenticating);
        self.inner.clear_session().await;

        let result = match self.inner.endpoints.login(credentials).await {
            Ok(pair) => self.establish(pair).await,
            Err(e) => Err(Error::Auth(e)),
        };

        match &result {
            Ok(profile) => {
                info!(username = %profile.username, "login succeeded");
                metrics::counter!("session_logins_total", "outcome" => "success").increment(1);
                self.inner.set_state(SessionState::Authenticated);
            }
            Err(e) => {
                metrics::counter!("session_logins_total", "outcome" => "failure").increment(1);
                self.inner.record_error(e);
                self.inner.set_state(SessionState::Unauthenticated);
            }
        }
        result
    }

    /// Create an account and establish a session with the issued pair.
    pub async fn register(&self, user_data: &RegisterRequest) -> Result<UserProfile> {
        self.inner.clear_error();
        self.inner.set_state(SessionState::Authenticating);
        self.inner.clear_session().await;

        let result = match self.inner.endpoints.register(user_data).await {
            Ok(pair) => self.establish(pair).await,
            Err(e) => Err(Error::Auth(e)),
        };

        match &result {
            Ok(profile) => {
                info!(username = %profile.username, "registration succeeded");
                self.inner.set_state(SessionState::Authenticated);
            }
            Err(e) => {
                self.inner.record_error(e);
                self.inner.set_state(SessionState::Unauthenticated);
            }
        }
        result
    }

    /// Persist an issued pair and fetch the profile that proves it works.
    async fn establish(&self, pair: TokenPair) -> Result<UserProfile> {
        self.inner.store.set_pair(&pair.access, &pair.refresh).await?;

        match self.inner.users.me().await {
            Ok(profile) => {
                *self.inner.current_user.write().await = Some(profile.clone());
                Ok(profile)
            }
            Err(e) => {
                // Fully usable or fully logged out, nothing in between
                self.inner.clear_session().await;
                Err(Error::ProfileUnavailable(e.to_string()))
            }
        }
    }

    /// Renew the access credential using the stored refresh token.
    ///
    /// Single-flight: concurrent triggers share one network call and one
    /// outcome. With no refresh record this fails without touching the
    /// network.
    pub async fn refresh(&self) -> Result<()> {
        let shared = {
            let mut inflight = self.inner.refresh_inflight.lock().unwrap();
            match inflight.as_ref() {
                Some(pending) => {
                    debug!("refresh already in flight, attaching to pending result");
                    pending.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let fut: BoxFuture<'static, std::result::Result<(), Arc<Error>>> =
                        async move {
                            let result = inner.run_refresh().await.map_err(Arc::new);
                            *inner.refresh_inflight.lock().unwrap() = None;
                            result
                        }
                        .boxed();
                    let shared = fut.shared();
                    *inflight = Some(shared.clone());
                    shared
                }
            }
        };

        match shared.await {
            Ok(()) => Ok(()),
            Err(e) => Err(match &*e {
                Error::NoRefreshToken => Error::NoRefreshToken,
                other => Error::RefreshFailed(other.to_string()),
            }),
        }
    }

    /// Probe the access record and renew it if it expires within the
    /// threshold. `Ok(false)` means no session exists; `Ok(true)` means a
    /// valid credential is in place (renewed or still fresh).
    pub async fn check_and_refresh(&self) -> Result<bool> {
        let record = self.inner.store.get_record(TokenKind::Access).await;
        if record.is_none() {
            return Ok(false);
        }
        if is_expiring_soon(record.as_ref(), self.inner.expiry_threshold) {
            self.refresh().await?;
        }
        Ok(true)
    }

    /// End the session locally. No network call — server-side revocation is
    /// not this layer's job.
    pub async fn logout(&self) {
        self.inner.clear_session().await;
        self.inner.set_state(SessionState::Unauthenticated);
        info!("logged out");
    }

    /// Mutate the profile, renewing the credential first so the mutation is
    /// not attempted with a near-expired token.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile> {
        if let Err(e) = self.check_and_refresh().await {
            // A dead session will surface as a rejection on the call below
            warn!(error = %e, "pre-mutation credential renewal failed");
        }

        match self.inner.users.update_me(update).await {
            Ok(profile) => {
                *self.inner.current_user.write().await = Some(profile.clone());
                Ok(profile)
            }
            Err(e) => {
                self.inner.record_error(&e);
                Err(e)
            }
        }
    }

    /// The authenticated user's profile, if any.
    pub async fn current_user(&self) -> Option<UserProfile> {
        self.inner.current_user.read().await.clone()
    }

    /// Live authentication check: a user is held in memory AND the access
    /// record is present and unexpired right now. Self-corrects if the
    /// credential silently expired, via the store's lazy eviction.
    pub async fn is_authenticated(&self) -> bool {
        if self.inner.current_user.read().await.is_none() {
            return false;
        }
        self.inner.store.get(TokenKind::Access).await.is_some()
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock().unwrap()
    }

    /// Most recent login/register/refresh error, for inline display.
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.lock().unwrap().clone()
    }

    pub fn navigator(&self) -> Arc<Navigator> {
        self.inner.navigator.clone()
    }

    /// Pipeline for an additional protected service (posts, comments, ...)
    /// sharing this session's credential and teardown behavior.
    pub fn protected_client(&self, base_url: impl Into<String>) -> ProtectedClient {
        ProtectedClient::new(
            self.inner.http_client.clone(),
            base_url,
            self.inner.store.clone(),
            self.inner.navigator.clone(),
            self.inner.current_user.clone(),
        )
    }
}
