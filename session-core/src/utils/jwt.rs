//! Access-token inspection without network I/O.
//!
//! Tokens arrive from the auth service over an authenticated channel, so the
//! signature is not re-verified here; the only question this module answers
//! is whether a token is still alive. Decoding reads the payload segment of
//! the compact JWT form and extracts the `exp` claim.

use crate::error::DecodeError;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

/// Extract the expiry claim (Unix seconds) from an access token.
///
/// Fails with `DecodeError` when the token is not a three-part JWT, the
/// payload is not base64url, or the claims carry no `exp`. Callers treat any
/// failure as "already expired" rather than propagating it.
pub fn expiry_epoch_seconds(access_token: &str) -> Result<i64, DecodeError> {
    let parts: Vec<&str> = access_token.split('.').collect();

    if parts.len() != 3 {
        return Err(DecodeError::Malformed);
    }

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|e| DecodeError::Payload(e.to_string()))?;

    let claims: ExpiryClaims =
        serde_json::from_slice(&payload).map_err(|e| DecodeError::Claims(e.to_string()))?;

    Ok(claims.exp)
}

/// True when the token expires within `lead_seconds` of `now`, or when its
/// expiry cannot be decoded. Preferring an unnecessary refresh over serving
/// a dead token is the fail-safe direction.
pub fn expires_within(access_token: &str, now: i64, lead_seconds: i64) -> bool {
    match expiry_epoch_seconds(access_token) {
        Ok(exp) => exp <= now + lead_seconds,
        Err(err) => {
            tracing::debug!(error = %err, "access token undecodable, treating as expired");
            true
        }
    }
}

/// True when the token is already past its expiry at `now` (or undecodable).
pub fn is_expired(access_token: &str, now: i64) -> bool {
    expires_within(access_token, now, 0)
}
