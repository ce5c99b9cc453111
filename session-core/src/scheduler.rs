//! Proactive background refresh.
//!
//! One timer task per authenticated session: sleep until `lead_seconds`
//! before the access token expires, refresh through the shared coordinator,
//! re-arm with the new token. The task dies with the session: on refresh
//! failure, on logout, or when the owning manager is dropped.

use crate::refresh::RefreshCoordinator;
use crate::utils::jwt;
use chrono::Utc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct RefreshScheduler {
    coordinator: RefreshCoordinator,
    state: Mutex<Option<Armed>>,
}

struct Armed {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshScheduler {
    pub fn new(coordinator: RefreshCoordinator) -> Self {
        Self {
            coordinator,
            state: Mutex::new(None),
        }
    }

    /// Start (or restart) the timer loop for the current session. Called on
    /// every entry into the authenticated state: login and restore. The loop
    /// re-arms itself after each successful refresh. Spawns onto the current
    /// Tokio runtime.
    pub fn arm(&self) {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(self.coordinator.clone(), cancel.clone()));

        let previous = {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            state.replace(Armed { cancel, task })
        };
        if let Some(previous) = previous {
            previous.cancel.cancel();
            previous.task.abort();
        }
    }

    /// Cancel any pending timer. After this returns no refresh will be
    /// issued by the scheduler until `arm` is called again.
    pub fn shutdown(&self) {
        let armed = {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            state.take()
        };
        if let Some(armed) = armed {
            tracing::debug!("cancelling scheduled token refresh");
            armed.cancel.cancel();
            armed.task.abort();
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_loop(coordinator: RefreshCoordinator, cancel: CancellationToken) {
    let lead = coordinator.lead_seconds();

    loop {
        let session = coordinator.session();
        let Some(tokens) = session.tokens else {
            tracing::debug!("no tokens to schedule a refresh for, scheduler idle");
            break;
        };

        let now = Utc::now().timestamp();
        // An undecodable expiry fires immediately: the coordinator treats
        // such a token as already expired.
        let delay = match jwt::expiry_epoch_seconds(&tokens.access_token) {
            Ok(exp) => (exp - now - lead).max(0),
            Err(err) => {
                tracing::warn!(error = %err, "cannot decode token expiry, refreshing now");
                0
            }
        };

        if delay == 0 {
            tracing::warn!("access token already inside the refresh lead window");
        } else {
            tracing::debug!(delay_secs = delay, "refresh scheduled");
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("scheduled refresh cancelled");
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(delay as u64)) => {
                match coordinator.ensure_fresh_tokens().await {
                    Ok(_) => continue,
                    Err(err) => {
                        tracing::info!(error = %err, "background refresh failed, scheduler stopping");
                        break;
                    }
                }
            }
        }
    }
}
