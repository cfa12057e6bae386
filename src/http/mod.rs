//! # HTTP Layer
//!
//! Axum routes over [`OsuService`]. Handlers only extract parameters, call
//! the service, and render the result or the [`crate::error::ApiError`].
//!
//! Every `/api` route passes the default rate limit; the leaderboard routes
//! that fan out upstream additionally pass the heavy one.

mod auth_routes;
mod cookies;
mod handlers;
mod rate_limit;

use axum::{
    extract::FromRef,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::Key;
use std::{path::PathBuf, sync::Arc, time::Instant};
use tower_http::{cors::CorsLayer, services::ServeDir};
use url::Url;

use crate::auth::SessionStore;
use crate::ratelimit::RateLimiter;
use crate::service::OsuService;

/// Settings the HTTP layer needs beyond the service itself.
#[derive(Clone)]
pub struct HttpSettings {
    pub cookie_key: Key,
    pub secure_cookies: bool,
    pub oauth_base: Url,
    pub allowed_origin: HeaderValue,
    pub public_dir: PathBuf,
}

#[derive(Clone)]
pub struct AppState {
    pub service: OsuService,
    pub sessions: SessionStore,
    pub limiter: RateLimiter,
    pub settings: Arc<HttpSettings>,
    pub started: Instant,
}

impl AppState {
    pub fn new(
        service: OsuService,
        sessions: SessionStore,
        limiter: RateLimiter,
        settings: HttpSettings,
    ) -> Self {
        Self {
            service,
            sessions,
            limiter,
            settings: Arc::new(settings),
            started: Instant::now(),
        }
    }
}

// SignedCookieJar pulls its key from state.
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.settings.cookie_key.clone()
    }
}

pub fn router(state: AppState) -> Router {
    let heavy = Router::new()
        .route(
            "/api/user/{username}/leaderboards",
            get(handlers::user_leaderboards),
        )
        .route("/api/user/{username}/placements", get(handlers::placements))
        .route(
            "/api/user/{username}/global-leaderboard",
            get(handlers::global_leaderboard),
        )
        .route_layer(from_fn_with_state(state.clone(), rate_limit::heavy));

    // Everything but /health and static files spends the default budget,
    // including the OAuth routes that reach the token endpoint.
    let limited = Router::new()
        .route("/api/search", get(handlers::search))
        .route("/api/beatmap/{id}", get(handlers::beatmap))
        .route("/api/beatmap/{id}/scores", get(handlers::beatmap_scores))
        .route("/api/me", get(handlers::me))
        .merge(heavy)
        .route("/login", get(auth_routes::login))
        .route("/callback", get(auth_routes::callback))
        .route("/logout", post(auth_routes::logout))
        .route_layer(from_fn_with_state(state.clone(), rate_limit::default));

    let cors = CorsLayer::new()
        .allow_origin(state.settings.allowed_origin.clone())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .merge(limited)
        .route("/health", get(handlers::health))
        .fallback_service(ServeDir::new(&state.settings.public_dir))
        .layer(cors)
        .with_state(state)
}
