use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use std::{fmt, time::Duration};
use tracing::debug;

use crate::cache::ttl_cache::TtlCache;
use crate::osu::TokenResponse;

const SESSION_ID_LEN: usize = 48;

/// Tokens of one signed-in browser session.
#[derive(Clone, PartialEq)]
pub struct UserSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    pub fn from_token(response: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            expires_at: expiry(now, response.expires_in),
            access_token: response.access_token,
            refresh_token: response.refresh_token,
        }
    }

    /// Applies a refresh result in place. The previous refresh token is kept
    /// when the server does not rotate it.
    pub fn apply_refresh(&mut self, response: TokenResponse, now: DateTime<Utc>) {
        self.expires_at = expiry(now, response.expires_in);
        self.access_token = response.access_token;
        if response.refresh_token.is_some() {
            self.refresh_token = response.refresh_token;
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

fn expiry(now: DateTime<Utc>, expires_in: u64) -> DateTime<Utc> {
    let secs = i64::try_from(expires_in).unwrap_or(i64::MAX);
    now.checked_add_signed(ChronoDuration::seconds(secs))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl fmt::Debug for UserSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSession")
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Server-side session storage keyed by an opaque random id.
///
/// Sessions expire after the configured lifetime unless they are written
/// again, which restarts the lifetime.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: TtlCache<String, UserSession>,
}

impl SessionStore {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: TtlCache::new(lifetime),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.sessions.default_ttl()
    }

    /// Stores a new session and returns its id.
    pub fn create(&self, session: UserSession) -> String {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_ID_LEN)
            .map(char::from)
            .collect();
        self.sessions.insert(id.clone(), session);
        debug!("Session created");
        id
    }

    pub fn get(&self, id: &str) -> Option<UserSession> {
        self.sessions.get(id)
    }

    pub fn update(&self, id: &str, session: UserSession) {
        self.sessions.insert(id.to_string(), session);
    }

    pub fn destroy(&self, id: &str) -> Option<UserSession> {
        let removed = self.sessions.remove(id);
        if removed.is_some() {
            debug!("Session destroyed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn sweep(&self) -> usize {
        self.sessions.cleanup_expired()
    }
}
