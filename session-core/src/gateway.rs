//! Authenticated request gateway.
//!
//! The single recommended entry point for outbound API calls: attaches the
//! current access token, normalizes failures into [`ApiError`], and absorbs
//! the one race the proactive freshness check cannot: a token the server
//! invalidated between check and send.

use crate::error::{ApiError, RequestError};
use crate::refresh::RefreshCoordinator;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Response, StatusCode};

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<serde_json::Value>,
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn method(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn json(method: Method, body: serde_json::Value) -> Self {
        Self {
            method,
            body: Some(body),
            headers: HeaderMap::new(),
        }
    }
}

pub struct ApiGateway {
    client: Client,
    base_url: String,
    coordinator: RefreshCoordinator,
}

impl ApiGateway {
    pub fn new(base_url: impl Into<String>, coordinator: RefreshCoordinator) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            coordinator,
        }
    }

    /// Issue a request against `endpoint` (joined to the configured base
    /// URL), attaching a bearer token when the session is authenticated.
    ///
    /// A 401 on a request that carried a token triggers exactly one forced
    /// refresh and one resend; the second outcome is surfaced as-is. There
    /// is no third attempt, and unauthenticated requests are never retried.
    pub async fn request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Response, RequestError> {
        let token = if self.coordinator.session().is_authenticated() {
            Some(self.coordinator.ensure_fresh_tokens().await?.access_token)
        } else {
            None
        };

        let response = self.send(endpoint, &options, token.as_deref()).await?;

        if response.status() == StatusCode::UNAUTHORIZED && token.is_some() {
            tracing::info!(endpoint, "request raced an invalidated token, refreshing and retrying once");
            let pair = self.coordinator.force_refresh().await?;
            let retried = self
                .send(endpoint, &options, Some(&pair.access_token))
                .await?;
            return Self::into_result(retried).await;
        }

        Self::into_result(response).await
    }

    async fn send(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> Result<Response, ApiError> {
        let url = if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        };

        let mut request = self
            .client
            .request(options.method.clone(), &url)
            .headers(options.headers.clone());

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        if let Some(body) = &options.body {
            request = request.json(body);
        }

        request.send().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "request failed before a response was received");
            ApiError::network(&e)
        })
    }

    /// Pass successful responses through untouched; turn everything else
    /// into an [`ApiError`] with a best-effort parsed body.
    async fn into_result(response: Response) -> Result<Response, RequestError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<serde_json::Value>().await.ok();
        let message = body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

        Err(ApiError {
            status: status.as_u16(),
            message,
            body,
        }
        .into())
    }
}
