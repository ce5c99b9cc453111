//! Session token lifecycle management for the portal clients.
//!
//! Holds the access/refresh token pair for a signed-in user, decides when
//! the access token is stale, collapses concurrent refreshes into a single
//! network call, retries requests that raced an invalidated token, and
//! proactively refreshes in the background ahead of expiry.

pub mod config;
pub mod error;
pub mod gateway;
pub mod manager;
pub mod refresh;
pub mod scheduler;
pub mod services;
pub mod session;
pub mod utils;

pub use error::{ApiError, AuthExpiredError, DecodeError, ExchangeError, RequestError};
pub use gateway::{ApiGateway, RequestOptions};
pub use manager::SessionManager;
pub use refresh::RefreshCoordinator;
pub use scheduler::RefreshScheduler;
pub use services::auth_client::{HttpAuthClient, TokenExchangeService};
pub use session::{
    LoginCredentials, MemorySessionStore, NoopSessionEvents, Session, SessionEvents,
    SessionPersistence, SessionStatus, TokenPair, UserIdentity,
};
