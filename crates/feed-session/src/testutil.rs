//! In-process mock auth/users services for session tests
//!
//! Stands in for the credential-issuing and protected services so facade,
//! scheduler, and pipeline tests never touch a real network. Behavior is
//! toggled per test through shared atomics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};

use feed_auth::now_millis;

/// Build an unsigned test token expiring at the given unix-second time.
///
/// Carries a unique `jti` so two tokens minted in the same second still
/// differ — rotation tests compare token strings.
pub fn make_token(exp_secs: u64) -> String {
    static JTI: AtomicU64 = AtomicU64::new(0);
    let jti = JTI.fetch_add(1, Ordering::Relaxed);
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload =
        URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp_secs},"jti":{jti}}}"#).as_bytes());
    format!("{header}.{payload}.sig")
}

#[derive(Default)]
pub struct BackendState {
    refresh_calls: AtomicUsize,
    reject_protected: AtomicBool,
    reject_refresh: AtomicBool,
    fail_profile: AtomicBool,
    rotate_refresh: AtomicBool,
    refresh_delay_ms: AtomicU64,
    last_auth_header: std::sync::Mutex<Option<String>>,
}

/// Handle to the spawned mock services.
pub struct MockBackend {
    pub base_url: String,
    state: Arc<BackendState>,
}

impl MockBackend {
    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    /// Authorization header observed on the most recent protected call.
    pub fn last_auth_header(&self) -> Option<String> {
        self.state.last_auth_header.lock().unwrap().clone()
    }

    /// Make every protected route answer 401.
    pub fn set_reject_protected(&self, reject: bool) {
        self.state.reject_protected.store(reject, Ordering::SeqCst);
    }

    /// Make the refresh endpoint answer 401.
    pub fn set_reject_refresh(&self, reject: bool) {
        self.state.reject_refresh.store(reject, Ordering::SeqCst);
    }

    /// Make `GET /users/me` answer 500 (profile fetch failure after issuance).
    pub fn set_fail_profile(&self, fail: bool) {
        self.state.fail_profile.store(fail, Ordering::SeqCst);
    }

    /// Whether the refresh endpoint rotates the refresh token.
    pub fn set_rotate_refresh(&self, rotate: bool) {
        self.state.rotate_refresh.store(rotate, Ordering::SeqCst);
    }

    /// Hold refresh responses for a while so triggers can overlap.
    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state
            .refresh_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

fn fresh_pair() -> Value {
    json!({
        "access": make_token(now_millis() / 1000 + 3600),
        "refresh": make_token(now_millis() / 1000 + 86_400),
    })
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] == "wrong" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Invalid credentials" })),
        )
            .into_response();
    }
    Json(fresh_pair()).into_response()
}

async fn register(Json(_body): Json<Value>) -> Response {
    (StatusCode::CREATED, Json(fresh_pair())).into_response()
}

async fn refresh(State(state): State<Arc<BackendState>>, Json(_body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if state.reject_refresh.load(Ordering::SeqCst) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Token is invalid or expired" })),
        )
            .into_response();
    }

    let access = make_token(now_millis() / 1000 + 3600);
    let body = if state.rotate_refresh.load(Ordering::SeqCst) {
        json!({ "access": access, "refresh": make_token(now_millis() / 1000 + 86_400) })
    } else {
        json!({ "access": access })
    };
    Json(body).into_response()
}

fn record_auth_header(state: &BackendState, headers: &HeaderMap) -> bool {
    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let present = header.is_some();
    *state.last_auth_header.lock().unwrap() = header;
    present
}

async fn me(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    let authed = record_auth_header(&state, &headers);

    if state.reject_protected.load(Ordering::SeqCst) || !authed {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Authentication credentials were not provided" })),
        )
            .into_response();
    }
    if state.fail_profile.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "users service unavailable" })),
        )
            .into_response();
    }
    Json(json!({ "id": 7, "username": "alice", "email": "alice@example.com" })).into_response()
}

async fn update_me(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let authed = record_auth_header(&state, &headers);
    if state.reject_protected.load(Ordering::SeqCst) || !authed {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Authentication credentials were not provided" })),
        )
            .into_response();
    }
    let email = body["email"].as_str().unwrap_or("alice@example.com");
    Json(json!({ "id": 7, "username": "alice", "email": email })).into_response()
}

async fn posts(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    // Public-readable: anonymous callers still get the feed
    record_auth_header(&state, &headers);
    if state.reject_protected.load(Ordering::SeqCst) {
        return (StatusCode::FORBIDDEN, Json(json!({ "detail": "Forbidden" }))).into_response();
    }
    Json(json!([])).into_response()
}

async fn create_post(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let authed = record_auth_header(&state, &headers);
    if state.reject_protected.load(Ordering::SeqCst) || !authed {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Authentication credentials were not provided" })),
        )
            .into_response();
    }
    let content = body["content"].as_str().unwrap_or_default();
    (
        StatusCode::CREATED,
        Json(json!({ "id": 42, "content": content, "author_id": 7 })),
    )
        .into_response()
}

async fn delete_post(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    let authed = record_auth_header(&state, &headers);
    if state.reject_protected.load(Ordering::SeqCst) || !authed {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Authentication credentials were not provided" })),
        )
            .into_response();
    }
    (StatusCode::NO_CONTENT, ()).into_response()
}

/// Spawn one server carrying both the issuing and protected routes.
pub async fn spawn_mock_services() -> MockBackend {
    let state = Arc::new(BackendState {
        rotate_refresh: AtomicBool::new(true),
        ..Default::default()
    });

    let router = axum::Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/token/refresh", post(refresh))
        .route("/users/me", get(me).put(update_me))
        .route("/posts", get(posts).post(create_post))
        .route("/posts/{id}", axum::routing::delete(delete_post))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    MockBackend {
        base_url: format!("http://{addr}"),
        state,
    }
}
