//! Test harness for exercising the full session lifecycle in-process.
//!
//! Stands up a mock of the auth service's REST surface (login, refresh,
//! logout, and one protected resource) on a loopback port, then wires a real
//! [`SessionManager`] against it, with the HTTP token exchange, request
//! gateway, and background scheduler all live. Tests drive the manager and
//! assert on the mock's counters.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use session_core::config::Settings;
use session_core::utils::jwt;
use session_core::{
    HttpAuthClient, MemorySessionStore, NoopSessionEvents, Session, SessionManager,
    SessionPersistence,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const TEST_EMAIL: &str = "pat@example.com";
pub const TEST_PASSWORD: &str = "correct-horse";

/// Mint an unsigned access token with the given lifetime. Only the payload
/// segment is ever inspected.
pub fn mint_access_token(ttl_seconds: i64) -> String {
    let header = general_purpose::URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = general_purpose::URL_SAFE_NO_PAD.encode(
        serde_json::json!({
            "sub": "user_123",
            "exp": Utc::now().timestamp() + ttl_seconds,
            "jti": Uuid::new_v4().to_string(),
        })
        .to_string()
        .as_bytes(),
    );
    format!("{header}.{payload}.signature")
}

/// Shared state of the mock auth service.
pub struct MockAuthState {
    /// Refresh tokens the service will still honor.
    valid_refresh: Mutex<HashSet<String>>,
    /// Access tokens revoked server-side while still unexpired.
    revoked_access: Mutex<HashSet<String>>,
    /// Lifetime applied to the next minted access token.
    access_ttl: AtomicI64,
    pub refresh_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
}

impl MockAuthState {
    fn new() -> Self {
        Self {
            valid_refresh: Mutex::new(HashSet::new()),
            revoked_access: Mutex::new(HashSet::new()),
            access_ttl: AtomicI64::new(3600),
            refresh_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
        }
    }

    /// Control the lifetime of subsequently minted access tokens.
    pub fn set_access_ttl(&self, ttl_seconds: i64) {
        self.access_ttl.store(ttl_seconds, Ordering::SeqCst);
    }

    /// Invalidate an access token server-side without touching its expiry,
    /// reproducing the check-to-send race the gateway must absorb.
    pub fn revoke_access(&self, access_token: &str) {
        self.revoked_access
            .lock()
            .unwrap()
            .insert(access_token.to_string());
    }

    /// Drop a refresh token so the next exchange is rejected.
    pub fn revoke_refresh(&self, refresh_token: &str) {
        self.valid_refresh.lock().unwrap().remove(refresh_token);
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Mint a pair out-of-band, as if issued by an earlier login the store
    /// persisted across a page load.
    pub fn issue_pair(&self) -> (String, String) {
        self.mint_pair()
    }

    fn mint_pair(&self) -> (String, String) {
        let access = mint_access_token(self.access_ttl.load(Ordering::SeqCst));
        let refresh = Uuid::new_v4().to_string();
        self.valid_refresh.lock().unwrap().insert(refresh.clone());
        (access, refresh)
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

fn unauthorized(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "message": message })),
    )
}

async fn login_handler(
    State(state): State<Arc<MockAuthState>>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    if email != TEST_EMAIL || password != TEST_PASSWORD {
        return unauthorized("Invalid email or password");
    }

    let (access, refresh) = state.mint_pair();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "accessToken": access,
            "refreshToken": refresh,
            "user": { "id": "user_123", "role": "patient", "name": "Pat Doe" },
        })),
    )
}

async fn refresh_handler(
    State(state): State<Arc<MockAuthState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let Some(refresh_token) = bearer(&headers) else {
        return unauthorized("Refresh token is required");
    };

    // Rotation: the presented token is consumed whether or not it was valid.
    let known = state.valid_refresh.lock().unwrap().remove(refresh_token);
    if !known {
        return unauthorized("Token refresh failed");
    }

    let (access, refresh) = state.mint_pair();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "accessToken": access,
            "refreshToken": refresh,
        })),
    )
}

async fn logout_handler(
    State(state): State<Arc<MockAuthState>>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    if let Some(refresh_token) = body["refreshToken"].as_str() {
        state.valid_refresh.lock().unwrap().remove(refresh_token);
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Logout successful" })),
    )
}

async fn profile_handler(
    State(state): State<Arc<MockAuthState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    state.profile_calls.fetch_add(1, Ordering::SeqCst);

    let Some(access_token) = bearer(&headers) else {
        return unauthorized("Unauthorized");
    };

    if state.revoked_access.lock().unwrap().contains(access_token)
        || jwt::is_expired(access_token, Utc::now().timestamp())
    {
        return unauthorized("Unauthorized");
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": "user_123",
            "name": "Pat Doe",
            "role": "patient",
        })),
    )
}

/// One running mock service plus a fully wired manager pointed at it.
pub struct TestHarness {
    pub state: Arc<MockAuthState>,
    pub store: Arc<MemorySessionStore>,
    pub manager: SessionManager,
    pub base_url: String,
}

impl TestHarness {
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with_lead(60).await
    }

    pub async fn start_with_lead(lead_seconds: i64) -> anyhow::Result<Self> {
        let state = Arc::new(MockAuthState::new());

        let router = Router::new()
            .route("/health", get(|| async { StatusCode::OK }))
            .route("/auth/login", post(login_handler))
            .route("/auth/refresh-token", post(refresh_handler))
            .route("/auth/logout", post(logout_handler))
            .route("/users/profile", get(profile_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "mock auth service stopped");
            }
        });

        wait_until_healthy(&base_url).await?;

        let settings: Settings = serde_json::from_value(serde_json::json!({
            "auth_service": { "url": base_url },
            "gateway": { "base_url": base_url },
            "refresh": { "lead_seconds": lead_seconds },
        }))?;

        let store = Arc::new(MemorySessionStore::with_session(Session::unauthenticated()));
        let manager = SessionManager::new(
            &settings,
            store.clone(),
            Arc::new(HttpAuthClient::new(settings.auth_service.clone())),
            Arc::new(NoopSessionEvents),
        );

        Ok(Self {
            state,
            store,
            manager,
            base_url,
        })
    }

    /// The session as currently persisted.
    pub fn session(&self) -> Session {
        self.store.read()
    }
}

/// Poll the mock service's health endpoint until it accepts connections.
async fn wait_until_healthy(base_url: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{base_url}/health");

    for _ in 0..50 {
        if let Ok(response) = client.get(&url).send().await {
            if response.status().is_success() {
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    anyhow::bail!("mock auth service at {base_url} never became healthy")
}
