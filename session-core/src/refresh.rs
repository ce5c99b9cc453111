//! Single-flight coordination of token refreshes.
//!
//! Every path that wants a usable access token funnels through
//! [`RefreshCoordinator`]: the request gateway before attaching a bearer
//! header, and the background scheduler when its timer fires. The
//! coordinator is the only writer of the session store during a refresh,
//! which is what keeps token updates atomic for every reader.

use crate::error::AuthExpiredError;
use crate::session::{Session, SessionEvents, SessionPersistence, TokenPair};
use crate::services::auth_client::TokenExchangeService;
use crate::utils::jwt;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type RefreshOutcome = Result<TokenPair, AuthExpiredError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Cheaply cloneable handle over one shared refresh state. The gateway and
/// the scheduler must hold clones of the *same* coordinator so they can
/// never race each other into two simultaneous exchange calls.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn SessionPersistence>,
    exchange: Arc<dyn TokenExchangeService>,
    events: Arc<dyn SessionEvents>,
    lead_seconds: i64,
    /// At most one in-flight refresh; cleared only after settlement.
    inflight: Mutex<Option<SharedRefresh>>,
    /// Bumped on logout/login. A refresh commits only if the epoch it
    /// started under is still current, so a late result cannot resurrect a
    /// closed session.
    epoch: AtomicU64,
}

fn slot(inflight: &Mutex<Option<SharedRefresh>>) -> MutexGuard<'_, Option<SharedRefresh>> {
    inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn SessionPersistence>,
        exchange: Arc<dyn TokenExchangeService>,
        events: Arc<dyn SessionEvents>,
        lead_seconds: i64,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                exchange,
                events,
                lead_seconds,
                inflight: Mutex::new(None),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Current session, as the store holds it.
    pub fn session(&self) -> Session {
        self.inner.store.read()
    }

    pub fn lead_seconds(&self) -> i64 {
        self.inner.lead_seconds
    }

    /// Return a token pair that is safe to send.
    ///
    /// Fast path: the current access token is outside the lead window and is
    /// returned unchanged with no network call. Otherwise callers join the
    /// in-flight refresh (or start one), and every concurrent caller
    /// receives a clone of the same outcome.
    pub async fn ensure_fresh_tokens(&self) -> RefreshOutcome {
        let session = self.inner.store.read();
        let Some(tokens) = session.tokens else {
            return Err(AuthExpiredError::NoSession);
        };

        let now = Utc::now().timestamp();
        if !jwt::expires_within(&tokens.access_token, now, self.inner.lead_seconds) {
            return Ok(tokens);
        }

        self.join_refresh().await
    }

    /// Refresh even if the access token still looks fresh locally. Used by
    /// the gateway when the server has invalidated a token between the
    /// freshness check and the send.
    pub async fn force_refresh(&self) -> RefreshOutcome {
        self.join_refresh().await
    }

    /// Invalidate whatever refresh may be in flight. Called around login and
    /// logout so a settling exchange cannot commit into the wrong session.
    pub fn invalidate(&self) {
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
    }

    fn join_refresh(&self) -> SharedRefresh {
        let mut pending = slot(&self.inner.inflight);

        if let Some(attempt) = pending.as_ref() {
            tracing::debug!("joining in-flight token refresh");
            return attempt.clone();
        }

        let inner = Arc::clone(&self.inner);
        let attempt = async move {
            let outcome = run_refresh(&inner).await;
            slot(&inner.inflight).take();
            outcome
        }
        .boxed()
        .shared();

        *pending = Some(attempt.clone());
        attempt
    }
}

async fn run_refresh(inner: &Arc<Inner>) -> RefreshOutcome {
    let epoch = inner.epoch.load(Ordering::Acquire);

    let session = inner.store.read();
    let Some(tokens) = session.tokens else {
        return Err(AuthExpiredError::NoSession);
    };

    tracing::debug!("exchanging refresh token for a new pair");
    match inner.exchange.refresh(&tokens.refresh_token).await {
        Ok(pair) => {
            if inner.epoch.load(Ordering::Acquire) != epoch {
                tracing::info!("discarding refresh result, session closed mid-flight");
                return Err(AuthExpiredError::SessionClosed);
            }

            let current = inner.store.read();
            if !current.is_authenticated() {
                tracing::info!("discarding refresh result, session no longer authenticated");
                return Err(AuthExpiredError::SessionClosed);
            }

            let updated = Session::authenticated(current.user, pair.clone());
            inner.store.write(updated.clone());
            inner.events.on_authenticated(&updated);

            tracing::info!("session tokens refreshed");
            Ok(pair)
        }
        Err(err) => {
            let failure = match err.status {
                Some(status) => AuthExpiredError::RefreshRejected { status },
                None => AuthExpiredError::ExchangeUnavailable {
                    message: err.message.clone(),
                },
            };

            tracing::warn!(error = %err, "token refresh failed, session expired");

            // A rejected or unreachable exchange ends the session, unless a
            // login/logout already replaced it while we were in flight.
            if inner.epoch.load(Ordering::Acquire) == epoch {
                inner.store.write(Session::unauthenticated());
                inner.events.on_unauthenticated();
            }

            Err(failure)
        }
    }
}
