//! Session manager facade: restore, login, logout, and the logout race.

mod common;

use common::{MockExchange, RecordingEvents, RefreshBehavior};
use session_core::config::Settings;
use session_core::{
    AuthExpiredError, LoginCredentials, MemorySessionStore, RequestError, Session,
    SessionManager, SessionPersistence, SessionStatus,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn settings() -> Settings {
    serde_json::from_value(serde_json::json!({
        "auth_service": { "url": "http://localhost:0" },
        "gateway": { "base_url": "http://localhost:0" },
        "refresh": { "lead_seconds": 60 },
    }))
    .unwrap()
}

fn manager_with(
    session: Session,
    exchange: Arc<MockExchange>,
) -> (SessionManager, Arc<MemorySessionStore>, Arc<RecordingEvents>) {
    let store = Arc::new(MemorySessionStore::with_session(session));
    let events = Arc::new(RecordingEvents::default());
    let manager = SessionManager::new(&settings(), store.clone(), exchange, events.clone());
    (manager, store, events)
}

fn credentials() -> LoginCredentials {
    LoginCredentials {
        email: "pat@example.com".to_string(),
        password: "secret".to_string(),
    }
}

#[tokio::test]
async fn restore_resolves_loading_to_authenticated_when_tokens_persisted() {
    let exchange = Arc::new(MockExchange::new(RefreshBehavior::Issue { ttl_seconds: 3600 }));
    let persisted = Session::authenticated(Some(common::identity()), common::pair_expiring_in(3600));
    let (manager, _store, events) = manager_with(persisted, exchange);

    manager.restore();

    assert_eq!(manager.session().status, SessionStatus::Authenticated);
    assert_eq!(events.authenticated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn restore_without_tokens_settles_unauthenticated() {
    let exchange = Arc::new(MockExchange::new(RefreshBehavior::Issue { ttl_seconds: 3600 }));
    let (manager, _store, events) = manager_with(Session::loading(), exchange);

    manager.restore();

    assert_eq!(manager.session().status, SessionStatus::Unauthenticated);
    assert_eq!(events.unauthenticated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn login_rejects_malformed_credentials_before_the_network() {
    let exchange = Arc::new(MockExchange::new(RefreshBehavior::Issue { ttl_seconds: 3600 }));
    let (manager, _store, _events) = manager_with(Session::unauthenticated(), exchange);

    let err = manager
        .login(LoginCredentials {
            email: "not-an-email".to_string(),
            password: "secret".to_string(),
        })
        .await
        .unwrap_err();

    match err {
        RequestError::Api(api) => assert_eq!(api.status, 422),
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(manager.session().status, SessionStatus::Unauthenticated);
}

#[tokio::test]
async fn login_establishes_an_authenticated_session() {
    let exchange = Arc::new(MockExchange::new(RefreshBehavior::Issue { ttl_seconds: 3600 }));
    let (manager, _store, events) = manager_with(Session::unauthenticated(), exchange);

    let session = manager.login(credentials()).await.unwrap();

    assert!(session.is_authenticated());
    assert_eq!(session.user, Some(common::identity()));
    assert!(session.tokens.is_some());
    assert_eq!(events.authenticated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn logout_clears_the_session_and_revokes_server_side() {
    let exchange = Arc::new(MockExchange::new(RefreshBehavior::Issue { ttl_seconds: 3600 }));
    let (manager, store, events) = manager_with(Session::unauthenticated(), exchange.clone());

    manager.login(credentials()).await.unwrap();
    manager.logout().await;

    assert_eq!(store.read().status, SessionStatus::Unauthenticated);
    assert!(store.read().tokens.is_none());
    assert_eq!(exchange.logout_calls.load(Ordering::SeqCst), 1);
    assert_eq!(events.unauthenticated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refresh_settling_after_logout_cannot_resurrect_the_session() {
    let exchange = Arc::new(MockExchange::with_delay(
        RefreshBehavior::Issue { ttl_seconds: 3600 },
        Duration::from_millis(150),
    ));
    let (manager, store, _events) = manager_with(
        Session::authenticated(Some(common::identity()), common::pair_expiring_in(-10)),
        exchange.clone(),
    );
    let manager = Arc::new(manager);

    let inflight = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.ensure_fresh_tokens().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    manager.logout().await;

    let outcome = inflight.await.unwrap();
    assert_eq!(outcome.unwrap_err(), AuthExpiredError::SessionClosed);
    assert_eq!(store.read().status, SessionStatus::Unauthenticated);
}
