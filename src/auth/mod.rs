//! # Auth Module
//!
//! OAuth credential handling for the proxy.
//!
//! - [`credential::Credential`]: the process-wide application credential.
//! - [`token_manager::TokenManager`]: application token acquisition and user
//!   token refresh, each behind a [`single_flight::SingleFlight`] so that
//!   concurrent callers share one upstream exchange.
//! - [`session`]: browser sessions holding a user's token pair.

pub mod credential;
pub mod session;
pub mod single_flight;
pub mod token_manager;

pub use credential::Credential;
pub use session::{SessionStore, UserSession};
pub use token_manager::{AppToken, TokenManager};

use crate::osu::GatewayError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    /// A client-credentials or authorization-code exchange failed.
    #[error("token exchange failed: {0}")]
    AuthFailure(GatewayError),
    /// The session's refresh token could not be exchanged. The session is
    /// unusable from here on.
    #[error("token refresh failed: {0}")]
    RefreshFailure(GatewayError),
}
