use thiserror::Error;

/// Failure to extract claims from an access token.
///
/// Callers never propagate this directly: an undecodable token is treated as
/// already expired so the worst outcome is one unnecessary refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("token is not a three-part JWT")]
    Malformed,

    #[error("token payload is not valid base64url: {0}")]
    Payload(String),

    #[error("token claims are missing or invalid: {0}")]
    Claims(String),
}

/// The session can no longer be repaired by a token refresh.
///
/// Surfacing this error always coincides with the session transitioning to
/// `Unauthenticated`; the hosting UI is expected to route the user back to
/// sign-in. The coordinator never retries after any of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthExpiredError {
    #[error("no active session to refresh")]
    NoSession,

    #[error("refresh token rejected by the token exchange (status {status})")]
    RefreshRejected { status: u16 },

    #[error("token exchange unreachable: {message}")]
    ExchangeUnavailable { message: String },

    #[error("session was closed while a refresh was in flight")]
    SessionClosed,
}

/// A downstream API call failed.
///
/// Non-2xx responses carry the real status and a best-effort parsed body;
/// network-level failures (no response at all) are normalized into the same
/// shape with a synthetic 500.
#[derive(Debug, Clone, Error)]
#[error("api request failed with status {status}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    pub body: Option<serde_json::Value>,
}

impl ApiError {
    /// Normalize a transport-level failure that produced no HTTP response.
    pub fn network(err: &reqwest::Error) -> Self {
        Self {
            status: 500,
            message: err.to_string(),
            body: None,
        }
    }
}

/// Error surface of the authenticated request gateway.
///
/// `AuthExpired` is kept distinct from `Api` so an unrepairable session is
/// never flattened into a generic HTTP failure and silently ignored.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    AuthExpired(#[from] AuthExpiredError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Failure shape of the token exchange service.
///
/// `status` is `None` when no response was received at all (connection
/// refused, timeout), `Some` when the service answered with a non-2xx.
#[derive(Debug, Clone, Error)]
#[error("token exchange failed: {message}")]
pub struct ExchangeError {
    pub status: Option<u16>,
    pub message: String,
}

impl ExchangeError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}
