//! Shared fixtures for the lifecycle tests: canned JWTs, a scriptable token
//! exchange, and an event recorder.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use session_core::error::ExchangeError;
use session_core::session::{LoginCredentials, Session, SessionEvents, TokenPair, UserIdentity};
use session_core::TokenExchangeService;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Mint an unsigned access token whose `exp` claim is `exp`. Only the
/// payload segment matters to the inspector.
pub fn access_token(exp: i64) -> String {
    let header = general_purpose::URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = general_purpose::URL_SAFE_NO_PAD.encode(
        serde_json::json!({ "sub": "user_123", "exp": exp })
            .to_string()
            .as_bytes(),
    );
    format!("{header}.{payload}.signature")
}

pub fn pair_expiring_in(ttl_seconds: i64) -> TokenPair {
    TokenPair {
        access_token: access_token(Utc::now().timestamp() + ttl_seconds),
        refresh_token: "refresh-0".to_string(),
    }
}

pub fn identity() -> UserIdentity {
    UserIdentity {
        id: "user_123".to_string(),
        role: "patient".to_string(),
        display_name: "Pat Doe".to_string(),
    }
}

#[derive(Debug, Clone)]
pub enum RefreshBehavior {
    /// Issue a rotated pair whose access token lives for `ttl_seconds`.
    Issue { ttl_seconds: i64 },
    /// Answer with a non-2xx status.
    Reject { status: u16 },
    /// No response at all.
    Unreachable,
}

/// Scriptable stand-in for the auth service. Counts calls and can delay so
/// tests can race callers against an in-flight exchange.
pub struct MockExchange {
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    behavior: Mutex<RefreshBehavior>,
    delay: Duration,
}

impl MockExchange {
    pub fn new(behavior: RefreshBehavior) -> Self {
        Self {
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            behavior: Mutex::new(behavior),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(behavior: RefreshBehavior, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(behavior)
        }
    }

    pub fn set_behavior(&self, behavior: RefreshBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenExchangeService for MockExchange {
    async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, ExchangeError> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            RefreshBehavior::Issue { ttl_seconds } => Ok(TokenPair {
                access_token: access_token(Utc::now().timestamp() + ttl_seconds),
                refresh_token: format!("refresh-{call}"),
            }),
            RefreshBehavior::Reject { status } => {
                Err(ExchangeError::rejected(status, "refresh token revoked"))
            }
            RefreshBehavior::Unreachable => {
                Err(ExchangeError::unreachable("connection refused"))
            }
        }
    }

    async fn login(
        &self,
        _credentials: &LoginCredentials,
    ) -> Result<(UserIdentity, TokenPair), ExchangeError> {
        Ok((identity(), pair_expiring_in(3600)))
    }

    async fn logout(&self, _refresh_token: &str) -> Result<(), ExchangeError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Counts lifecycle hook invocations.
#[derive(Default)]
pub struct RecordingEvents {
    pub authenticated: AtomicUsize,
    pub unauthenticated: AtomicUsize,
}

impl SessionEvents for RecordingEvents {
    fn on_authenticated(&self, _session: &Session) {
        self.authenticated.fetch_add(1, Ordering::SeqCst);
    }

    fn on_unauthenticated(&self) {
        self.unauthenticated.fetch_add(1, Ordering::SeqCst);
    }
}
