use chrono::Utc;
use std::{fmt, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{single_flight::SingleFlight, AuthError, Credential, UserSession};
use crate::cache::{keys, CachePool, ResourceCache};
use crate::osu::{GatewayError, OsuApi, TokenResponse};

/// Subtracted from every granted lifetime to absorb clock skew and the
/// latency of requests already in flight when the token lapses.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// How long a completed user refresh keeps answering callers that still hold
/// the refresh token it consumed. Refresh tokens rotate, so those callers
/// cannot exchange it again.
const REFRESH_REUSE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone, PartialEq)]
pub struct AppToken {
    pub value: String,
    pub expires_at: Instant,
}

impl AppToken {
    pub fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl fmt::Debug for AppToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Obtains application tokens and refreshes user tokens.
///
/// At most one exchange per credential (application grant) or per refresh
/// token (user refresh) is outstanding at any time; late callers join the
/// pending exchange instead of starting their own.
pub struct TokenManager {
    credential: Arc<Credential>,
    api: Arc<dyn OsuApi>,
    cache: ResourceCache,
    grants: SingleFlight<AppToken, AuthError>,
    refreshes: SingleFlight<TokenResponse, AuthError>,
}

impl TokenManager {
    pub fn new(credential: Credential, api: Arc<dyn OsuApi>, cache: ResourceCache) -> Self {
        Self {
            credential: Arc::new(credential),
            api,
            cache,
            grants: SingleFlight::new(),
            refreshes: SingleFlight::new(),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Returns a valid application token, exchanging client credentials on a
    /// cache miss.
    pub async fn application_token(&self) -> Result<AppToken, AuthError> {
        let key = keys::app_token(&self.credential.client_id);
        if let Some(token) = cached_token(&self.cache, &key) {
            return Ok(token);
        }

        let api = self.api.clone();
        let cache = self.cache.clone();
        let form = self.credential.client_credentials_form();
        let flight_key = key.clone();

        self.grants
            .run(&key, move || async move {
                // A flight that finished just before this one started may
                // already have stored a token.
                if let Some(token) = cached_token(&cache, &flight_key) {
                    return Ok(token);
                }

                info!("🔑 Requesting application token");
                let response = api.token(form).await.map_err(|e| {
                    warn!("⚠️ Application token exchange failed: {}", e);
                    AuthError::AuthFailure(e)
                })?;

                let lifetime = usable_lifetime(response.expires_in)
                    .ok_or_else(|| AuthError::AuthFailure(short_lifetime(response.expires_in)))?;
                let token = AppToken {
                    value: response.access_token,
                    expires_at: Instant::now() + lifetime,
                };
                cache.set(CachePool::Token, &flight_key, token.clone(), Some(lifetime));

                info!(
                    "✅ Application token cached for {}",
                    humantime::format_duration(lifetime)
                );
                Ok(token)
            })
            .await
    }

    /// Drops the cached application token, e.g. after upstream rejected it.
    pub fn forget_application_token(&self) {
        let key = keys::app_token(&self.credential.client_id);
        if self.cache.invalidate(CachePool::Token, &key) {
            warn!("🔑 Application token discarded");
        }
    }

    /// Final step of the authorization-code flow.
    pub async fn exchange_code(&self, code: &str) -> Result<UserSession, AuthError> {
        let response = self
            .api
            .token(self.credential.authorization_code_form(code))
            .await
            .map_err(|e| {
                warn!("⚠️ Authorization code exchange failed: {}", e);
                AuthError::AuthFailure(e)
            })?;

        info!("👤 User signed in");
        Ok(UserSession::from_token(response, Utc::now()))
    }

    /// Exchanges the session's refresh token and updates the session in place.
    ///
    /// On `RefreshFailure` the caller must end the session; retrying with the
    /// same refresh token will not succeed.
    pub async fn refresh_user_token(&self, session: &mut UserSession) -> Result<(), AuthError> {
        let Some(refresh_token) = session.refresh_token.clone() else {
            return Err(AuthError::RefreshFailure(GatewayError::AuthExpired));
        };

        let key = keys::refreshed(&refresh_token);
        let response = match self.cache.get::<TokenResponse>(CachePool::Token, &key) {
            Some(response) => {
                debug!("🔄 Reusing a refresh that already consumed this token");
                response
            }
            None => {
                let api = self.api.clone();
                let cache = self.cache.clone();
                let form = self.credential.refresh_form(&refresh_token);
                let flight_key = key.clone();

                self.refreshes
                    .run(&key, move || async move {
                        // A flight that finished just before this one started
                        // has already rotated the token.
                        if let Some(response) =
                            cache.get::<TokenResponse>(CachePool::Token, &flight_key)
                        {
                            return Ok(response);
                        }

                        debug!("🔄 Refreshing user token");
                        let response = api.token(form).await.map_err(|e| {
                            warn!("⚠️ User token refresh failed: {}", e);
                            AuthError::RefreshFailure(e)
                        })?;
                        cache.set(
                            CachePool::Token,
                            &flight_key,
                            response.clone(),
                            Some(REFRESH_REUSE_WINDOW),
                        );
                        Ok(response)
                    })
                    .await?
            }
        };

        session.apply_refresh(response, Utc::now());
        Ok(())
    }
}

fn cached_token(cache: &ResourceCache, key: &str) -> Option<AppToken> {
    cache
        .get::<AppToken>(CachePool::Token, key)
        .filter(AppToken::is_valid)
}

fn usable_lifetime(expires_in: u64) -> Option<Duration> {
    Duration::from_secs(expires_in)
        .checked_sub(EXPIRY_MARGIN)
        .filter(|lifetime| !lifetime.is_zero())
}

fn short_lifetime(expires_in: u64) -> GatewayError {
    GatewayError::Malformed(format!("token lifetime of {expires_in}s is too short"))
}
