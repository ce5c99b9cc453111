//! Session state, the persistence contract, and lifecycle event hooks.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use validator::Validate;

/// An access/refresh token pair as issued by the token exchange.
///
/// Both are opaque bearer strings. The access token is short-lived and
/// carries a decodable expiry claim; the refresh token is longer-lived and
/// exchangeable only for a new pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// The signed-in user as reported by the auth service. Opaque to the core;
/// passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: String,
    pub role: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Unauthenticated,
    Loading,
    Authenticated,
}

/// The current session tuple.
///
/// Invariant: `tokens` is `Some` iff `status == Authenticated`. Use the
/// constructors; they are the only way the crate builds one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub status: SessionStatus,
    pub user: Option<UserIdentity>,
    pub tokens: Option<TokenPair>,
}

impl Session {
    /// Startup state, before persisted credentials have been inspected.
    pub fn loading() -> Self {
        Self {
            status: SessionStatus::Loading,
            user: None,
            tokens: None,
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            status: SessionStatus::Unauthenticated,
            user: None,
            tokens: None,
        }
    }

    pub fn authenticated(user: Option<UserIdentity>, tokens: TokenPair) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            user,
            tokens: Some(tokens),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

/// Credentials submitted to `login`. Validated before any network call.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginCredentials {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Storage backing for the session, supplied by the hosting application
/// (cookie jar, encrypted store, plain memory).
///
/// Writes replace the whole session at once; implementations must never let
/// a reader observe a half-updated token pair.
pub trait SessionPersistence: Send + Sync {
    fn read(&self) -> Session;
    fn write(&self, session: Session);
}

/// Default in-process store. Whole-session reads and writes under one lock
/// keep token updates atomic from the caller's point of view.
pub struct MemorySessionStore {
    inner: RwLock<Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Session::loading()),
        }
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            inner: RwLock::new(session),
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionPersistence for MemorySessionStore {
    fn read(&self) -> Session {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn write(&self, session: Session) {
        *self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = session;
    }
}

/// Lifecycle callbacks for the hosting UI (redirect to sign-in, rebuild
/// navigation, and so on). All methods default to no-ops.
pub trait SessionEvents: Send + Sync {
    fn on_authenticated(&self, _session: &Session) {}
    fn on_unauthenticated(&self) {}
}

pub struct NoopSessionEvents;

impl SessionEvents for NoopSessionEvents {}
