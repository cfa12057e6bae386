//! # Service
//!
//! The request pipeline behind every API route:
//! validate, check the cache, acquire a token, call the gateway, store the
//! normalized result. Validation failures never reach upstream.

use chrono::Utc;
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::auth::{TokenManager, UserSession};
use crate::cache::{keys, CachePool, ResourceCache};
use crate::error::{ApiError, Resource};
use crate::osu::normalize::{Beatmap, BeatmapScore, SearchPage, UserLeaderboard, UserProfile};
use crate::osu::{Gateway, GatewayError};
use crate::scan::{LeaderboardScanner, ScanReport};

pub const SEARCH_DEFAULT_LIMIT: u32 = 10;
pub const SEARCH_MAX_LIMIT: u32 = 50;
pub const SCORES_DEFAULT_LIMIT: u32 = 50;
pub const SCORES_MAX_LIMIT: u32 = 100;

const BEATMAP_SCORE_KINDS: [&str; 3] = ["global", "country", "friend"];
const USER_SCORE_KINDS: [&str; 3] = ["best", "recent", "firsts"];
const MAX_USERNAME_LEN: usize = 32;

#[derive(Clone)]
pub struct OsuService {
    cache: ResourceCache,
    tokens: Arc<TokenManager>,
    gateway: Gateway,
    scanner: LeaderboardScanner,
    search_ttl: Duration,
}

impl OsuService {
    pub fn new(
        cache: ResourceCache,
        tokens: Arc<TokenManager>,
        gateway: Gateway,
        scanner: LeaderboardScanner,
        search_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            tokens,
            gateway,
            scanner,
            search_ttl,
        }
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub async fn beatmap(&self, raw_id: &str) -> Result<Beatmap, ApiError> {
        let id = beatmap_id(raw_id)?;
        let gateway = &self.gateway;
        self.cached(
            CachePool::Beatmap,
            keys::beatmap(id),
            None,
            Resource::Beatmap,
            |token| async move { gateway.beatmap(id, &token).await },
        )
        .await
    }

    pub async fn search(
        &self,
        query: Option<&str>,
        limit: Option<&str>,
        offset: Option<&str>,
    ) -> Result<SearchPage, ApiError> {
        let query = search_query(query)?;
        let limit = clamp(limit, SEARCH_DEFAULT_LIMIT, SEARCH_MAX_LIMIT);
        let offset = parse_or(offset, 0);
        let gateway = &self.gateway;

        self.cached(
            CachePool::Beatmap,
            keys::search(&query, limit, offset),
            Some(self.search_ttl),
            Resource::Search,
            |token| async move { gateway.search(&query, limit, offset, &token).await },
        )
        .await
    }

    pub async fn beatmap_scores(
        &self,
        raw_id: &str,
        kind: Option<&str>,
        limit: Option<&str>,
    ) -> Result<Vec<BeatmapScore>, ApiError> {
        let id = beatmap_id(raw_id)?;
        let kind = one_of(kind, &BEATMAP_SCORE_KINDS, "Invalid leaderboard type")?;
        let limit = clamp(limit, SCORES_DEFAULT_LIMIT, SCORES_MAX_LIMIT);
        let gateway = &self.gateway;

        self.cached(
            CachePool::Leaderboard,
            keys::beatmap_scores(id, kind, limit),
            None,
            Resource::BeatmapScores,
            |token| async move { gateway.beatmap_scores(id, kind, limit, &token).await },
        )
        .await
    }

    pub async fn user_leaderboards(
        &self,
        username: &str,
        kind: Option<&str>,
        limit: Option<&str>,
    ) -> Result<UserLeaderboard, ApiError> {
        let username = username_param(username)?;
        let kind = one_of(kind, &USER_SCORE_KINDS, "Invalid score type")?;
        let limit = clamp(limit, SCORES_DEFAULT_LIMIT, SCORES_MAX_LIMIT);
        let gateway = &self.gateway;

        self.cached(
            CachePool::Leaderboard,
            keys::user_scores(username, kind, limit),
            None,
            Resource::UserLeaderboards,
            |token| async move {
                let user = gateway.user(username, &token).await?;
                let scores = gateway.user_scores(user.id, kind, limit, &token).await?;
                Ok::<_, GatewayError>(UserLeaderboard { user, scores })
            },
        )
        .await
    }

    /// Targeted scan over the user's own scores.
    pub async fn placements(
        &self,
        username: &str,
        kind: Option<&str>,
        limit: Option<&str>,
    ) -> Result<ScanReport, ApiError> {
        let username = username_param(username)?;
        let kind = one_of(kind, &USER_SCORE_KINDS, "Invalid score type")?;
        let limit = clamp(limit, SCORES_DEFAULT_LIMIT, SCORES_MAX_LIMIT);
        let scanner = &self.scanner;

        self.cached(
            CachePool::Leaderboard,
            keys::placements(username, kind, limit),
            None,
            Resource::Scan,
            |token| async move { scanner.targeted(username, kind, limit, &token).await },
        )
        .await
    }

    /// Exhaustive scan over the ranked catalog, capped at the configured
    /// page count.
    pub async fn global_leaderboard(
        &self,
        username: &str,
        pages: Option<&str>,
    ) -> Result<ScanReport, ApiError> {
        let username = username_param(username)?;
        let cap = self.scanner.page_cap();
        let pages = clamp(pages, cap, cap);
        let scanner = &self.scanner;

        self.cached(
            CachePool::Leaderboard,
            keys::global_scan(username, pages),
            None,
            Resource::Scan,
            |token| async move { scanner.exhaustive(username, pages, &token).await },
        )
        .await
    }

    /// Profile of the signed-in user.
    ///
    /// An access token past its expiry is refreshed first. An upstream 401
    /// triggers one refresh and one retry; after that the session is
    /// reported as expired and the caller must end it. `session` is updated
    /// in place whenever a refresh succeeds.
    pub async fn me(&self, session: &mut UserSession) -> Result<UserProfile, ApiError> {
        if session.is_expired(Utc::now()) {
            debug!("🔄 Access token expired, refreshing before /me");
            self.tokens.refresh_user_token(session).await?;
        }

        let key = keys::profile(&session.access_token);
        if let Some(profile) = self.cache.get::<UserProfile>(CachePool::User, &key) {
            return Ok(profile);
        }

        let profile = match self.gateway.me(&session.access_token).await {
            Err(GatewayError::AuthExpired) => {
                info!("🔄 Upstream rejected access token, refreshing once");
                self.tokens.refresh_user_token(session).await?;
                match self.gateway.me(&session.access_token).await {
                    Err(GatewayError::AuthExpired) => return Err(ApiError::session_expired()),
                    other => other,
                }
            }
            other => other,
        }
        .map_err(|e| ApiError::upstream(Resource::Profile, e))?;

        self.cache.set(
            CachePool::User,
            &keys::profile(&session.access_token),
            profile.clone(),
            None,
        );
        Ok(profile)
    }

    /// Drops state derived from a session that is ending.
    pub fn logout(&self, session: &UserSession) {
        self.cache
            .invalidate(CachePool::User, &keys::profile(&session.access_token));
    }

    /// Cache check, token, upstream call, cache store.
    async fn cached<T, F, Fut>(
        &self,
        pool: CachePool,
        key: String,
        ttl: Option<Duration>,
        resource: Resource,
        fetch: F,
    ) -> Result<T, ApiError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        if let Some(value) = self.cache.get::<T>(pool, &key) {
            return Ok(value);
        }

        let token = self.tokens.application_token().await?;
        match fetch(token.value).await {
            Ok(value) => {
                self.cache.set(pool, &key, value.clone(), ttl);
                Ok(value)
            }
            Err(err) => {
                if err == GatewayError::AuthExpired {
                    self.tokens.forget_application_token();
                }
                Err(ApiError::upstream(resource, err))
            }
        }
    }
}

fn beatmap_id(raw: &str) -> Result<u64, ApiError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::validation("Invalid beatmap ID"))
}

fn search_query(raw: Option<&str>) -> Result<String, ApiError> {
    let query = raw.map(str::trim).unwrap_or_default();
    if query.chars().count() < 2 {
        return Err(ApiError::validation("Query must be at least 2 characters"));
    }
    Ok(query.to_string())
}

/// osu! usernames: letters, digits, spaces, `-`, `_`, `[` and `]`.
fn username_param(raw: &str) -> Result<&str, ApiError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '[' | ']');
    if username.len() > MAX_USERNAME_LEN || !username.chars().all(allowed) {
        return Err(ApiError::validation("Invalid username"));
    }
    Ok(username)
}

fn one_of(
    raw: Option<&str>,
    allowed: &'static [&'static str],
    message: &str,
) -> Result<&'static str, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(allowed[0]);
    };
    allowed
        .iter()
        .copied()
        .find(|kind| kind.eq_ignore_ascii_case(raw))
        .ok_or_else(|| ApiError::validation(message))
}

fn parse_or(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

/// Unparseable or zero values fall back to the default; everything is capped.
fn clamp(raw: Option<&str>, default: u32, max: u32) -> u32 {
    let value = parse_or(raw, default);
    let value = if value == 0 { default } else { value };
    value.min(max)
}
