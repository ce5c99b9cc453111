//! Facade wiring the session store, refresh coordinator, request gateway,
//! and background scheduler into one owned object the hosting application
//! injects where it needs session-aware calls.

use crate::config::Settings;
use crate::error::{ApiError, AuthExpiredError, RequestError};
use crate::gateway::{ApiGateway, RequestOptions};
use crate::refresh::RefreshCoordinator;
use crate::scheduler::RefreshScheduler;
use crate::services::auth_client::{HttpAuthClient, TokenExchangeService};
use crate::session::{
    LoginCredentials, MemorySessionStore, NoopSessionEvents, Session, SessionEvents,
    SessionPersistence, TokenPair,
};
use std::sync::Arc;
use validator::Validate;

pub struct SessionManager {
    store: Arc<dyn SessionPersistence>,
    exchange: Arc<dyn TokenExchangeService>,
    events: Arc<dyn SessionEvents>,
    coordinator: RefreshCoordinator,
    gateway: ApiGateway,
    scheduler: RefreshScheduler,
}

impl SessionManager {
    /// Wire a manager from explicit collaborators. The store and exchange
    /// service are injectable so hosts control persistence and transport;
    /// everything session-mutating inside flows through one coordinator.
    pub fn new(
        settings: &Settings,
        store: Arc<dyn SessionPersistence>,
        exchange: Arc<dyn TokenExchangeService>,
        events: Arc<dyn SessionEvents>,
    ) -> Self {
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&exchange),
            Arc::clone(&events),
            settings.refresh.lead_seconds,
        );
        let gateway = ApiGateway::new(settings.gateway.base_url.clone(), coordinator.clone());
        let scheduler = RefreshScheduler::new(coordinator.clone());

        Self {
            store,
            exchange,
            events,
            coordinator,
            gateway,
            scheduler,
        }
    }

    /// Default wiring: in-memory store, HTTP token exchange, no-op events.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings,
            Arc::new(MemorySessionStore::new()),
            Arc::new(HttpAuthClient::new(settings.auth_service.clone())),
            Arc::new(NoopSessionEvents),
        )
    }

    pub fn session(&self) -> Session {
        self.store.read()
    }

    pub fn gateway(&self) -> &ApiGateway {
        &self.gateway
    }

    /// Resolve the startup `Loading` state from whatever the store
    /// persisted: credentials present arm the scheduler, otherwise the
    /// session settles as unauthenticated.
    pub fn restore(&self) {
        let session = self.store.read();
        match session.tokens {
            Some(tokens) => {
                let restored = Session::authenticated(session.user, tokens);
                self.store.write(restored.clone());
                self.events.on_authenticated(&restored);
                self.scheduler.arm();
                tracing::info!("session restored from persisted credentials");
            }
            None => {
                self.store.write(Session::unauthenticated());
                self.events.on_unauthenticated();
                tracing::debug!("no persisted credentials, session unauthenticated");
            }
        }
    }

    /// Exchange credentials for a token pair and enter the authenticated
    /// state. Credential shape is validated before any network call.
    pub async fn login(&self, credentials: LoginCredentials) -> Result<Session, RequestError> {
        credentials.validate().map_err(|e| {
            RequestError::Api(ApiError {
                status: 422,
                message: e.to_string(),
                body: None,
            })
        })?;

        let (user, tokens) = self.exchange.login(&credentials).await.map_err(|e| {
            tracing::warn!(error = %e, "login rejected");
            RequestError::Api(ApiError {
                status: e.status.unwrap_or(500),
                message: e.message.clone(),
                body: None,
            })
        })?;

        // A stale in-flight refresh must not commit into the new session.
        self.coordinator.invalidate();

        let session = Session::authenticated(Some(user), tokens);
        self.store.write(session.clone());
        self.events.on_authenticated(&session);
        self.scheduler.arm();

        if let Some(user) = &session.user {
            tracing::info!(user_id = %user.id, "user logged in");
        }

        Ok(session)
    }

    /// Tear the session down: cancel the pending refresh timer, invalidate
    /// any refresh in flight, clear the store, then revoke the refresh token
    /// server-side. Revocation is best-effort; logout never fails locally.
    pub async fn logout(&self) {
        self.scheduler.shutdown();
        self.coordinator.invalidate();

        let session = self.store.read();
        self.store.write(Session::unauthenticated());
        self.events.on_unauthenticated();

        if let Some(tokens) = session.tokens {
            if let Err(e) = self.exchange.logout(&tokens.refresh_token).await {
                tracing::error!(error = %e, "failed to revoke refresh token during logout");
            } else {
                tracing::info!("refresh token revoked");
            }
        }
    }

    /// See [`RefreshCoordinator::ensure_fresh_tokens`].
    pub async fn ensure_fresh_tokens(&self) -> Result<TokenPair, AuthExpiredError> {
        self.coordinator.ensure_fresh_tokens().await
    }

    /// See [`ApiGateway::request`].
    pub async fn request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<reqwest::Response, RequestError> {
        self.gateway.request(endpoint, options).await
    }
}
