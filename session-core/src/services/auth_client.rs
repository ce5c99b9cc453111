//! Token exchange client for the auth service.

use crate::config::AuthServiceSettings;
use crate::error::ExchangeError;
use crate::session::{LoginCredentials, TokenPair, UserIdentity};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// The token endpoint as the core consumes it. The production implementation
/// is [`HttpAuthClient`]; tests substitute their own.
#[async_trait]
pub trait TokenExchangeService: Send + Sync {
    /// Exchange a refresh token for a new pair. A rejection here means the
    /// session cannot be repaired without a fresh login.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ExchangeError>;

    /// Exchange credentials for an initial pair plus the signed-in identity.
    async fn login(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<(UserIdentity, TokenPair), ExchangeError>;

    /// Revoke a refresh token server-side. Best-effort; local logout does
    /// not depend on it succeeding.
    async fn logout(&self, refresh_token: &str) -> Result<(), ExchangeError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPairResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    id: String,
    role: String,
    #[serde(alias = "displayName")]
    name: String,
}

/// HTTP implementation of the token exchange over the auth service's REST
/// endpoints. The refresh token travels as the bearer credential of the
/// exchange POST; responses use the service's camelCase wire names.
pub struct HttpAuthClient {
    client: Client,
    settings: AuthServiceSettings,
}

impl HttpAuthClient {
    pub fn new(settings: AuthServiceSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.settings.url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.settings.url, path)
    }
}

/// Map a non-2xx exchange response to an `ExchangeError`, pulling the
/// service's `message` field out of the body when one is present.
async fn rejection(response: reqwest::Response) -> ExchangeError {
    let status = response.status().as_u16();
    let message = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| {
            body.get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "token exchange rejected".to_string());

    ExchangeError::rejected(status, message)
}

#[async_trait]
impl TokenExchangeService for HttpAuthClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ExchangeError> {
        let url = self.endpoint(&self.settings.refresh_path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(refresh_token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "token refresh request failed to send");
                ExchangeError::unreachable(e.to_string())
            })?;

        if !response.status().is_success() {
            let err = rejection(response).await;
            tracing::warn!(status = ?err.status, "token refresh rejected");
            return Err(err);
        }

        let tokens: TokenPairResponse = response
            .json()
            .await
            .map_err(|e| ExchangeError::unreachable(format!("invalid refresh response: {e}")))?;

        Ok(TokenPair {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }

    async fn login(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<(UserIdentity, TokenPair), ExchangeError> {
        let url = self.endpoint(&self.settings.login_path);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "login request failed to send");
                ExchangeError::unreachable(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| ExchangeError::unreachable(format!("invalid login response: {e}")))?;

        let user = UserIdentity {
            id: body.user.id,
            role: body.user.role,
            display_name: body.user.name,
        };
        let tokens = TokenPair {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
        };

        Ok((user, tokens))
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), ExchangeError> {
        let url = self.endpoint(&self.settings.logout_path);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .map_err(|e| ExchangeError::unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        Ok(())
    }
}
