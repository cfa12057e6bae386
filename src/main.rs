use anyhow::Result;
use axum::http::HeaderValue;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{debug, error, info};

mod auth;
mod cache;
mod config;
mod error;
mod http;
mod osu;
mod ratelimit;
mod scan;
mod service;

use crate::auth::{SessionStore, TokenManager};
use crate::cache::ResourceCache;
use crate::config::Config;
use crate::http::{AppState, HttpSettings};
use crate::osu::{Gateway, OsuApi, OsuHttpClient};
use crate::ratelimit::RateLimiter;
use crate::scan::LeaderboardScanner;
use crate::service::OsuService;

const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("osu_score_proxy=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!("🎯 Starting osu! score proxy v{}", env!("CARGO_PKG_VERSION"));

    // Configuration
    let config = Config::load()?;

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(config.port).await;
    }

    info!("{}", config.summary());

    let client = OsuHttpClient::new(
        config.api_base.clone(),
        config.oauth_base.clone(),
        config.http_timeout,
    )?;
    let api: Arc<dyn OsuApi> = Arc::new(client);

    let cache = ResourceCache::new(config.ttls);
    let tokens = Arc::new(TokenManager::new(
        config.credential.clone(),
        api.clone(),
        cache.clone(),
    ));
    let gateway = Gateway::new(api);
    let scanner = LeaderboardScanner::new(
        gateway.clone(),
        config.scan_concurrency,
        config.scan_page_cap,
    );
    let service = OsuService::new(cache.clone(), tokens, gateway, scanner, config.search_ttl);

    let sessions = SessionStore::new(config.session_ttl);
    let limiter = RateLimiter::new(config.default_budget, config.heavy_budget);
    let settings = HttpSettings {
        cookie_key: config.cookie_key(),
        secure_cookies: config.secure_cookies,
        oauth_base: config.oauth_base.clone(),
        allowed_origin: HeaderValue::from_str(&config.allowed_origin())?,
        public_dir: config.public_dir.clone(),
    };
    let state = AppState::new(service, sessions.clone(), limiter.clone(), settings);

    spawn_sweeper(cache, sessions, limiter);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🚀 Listening on http://{}", addr);

    axum::serve(
        listener,
        http::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("👋 Server stopped");
    Ok(())
}

/// Periodically drops expired cache entries, sessions and rate windows.
fn spawn_sweeper(cache: ResourceCache, sessions: SessionStore, limiter: RateLimiter) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let entries = cache.sweep();
            let expired_sessions = sessions.sweep();
            let windows = limiter.sweep();
            debug!(
                "🧹 Sweep removed {} cache entries, {} sessions, {} rate windows ({} sessions, {} clients tracked)",
                entries,
                expired_sessions,
                windows,
                sessions.len(),
                limiter.tracked()
            );
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("❌ Failed to listen for Ctrl+C: {:?}", e);
        std::future::pending::<()>().await;
    }
    info!("⚠️ Shutdown signal received, closing...");
}

/// Container health probe: asks the running server for `/health`.
async fn health_check(port: u16) -> Result<()> {
    let response = reqwest::Client::new()
        .get(format!("http://127.0.0.1:{port}/health"))
        .timeout(Duration::from_secs(5))
        .send()
        .await?;

    if response.status().is_success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Health endpoint returned {}", response.status());
    }
}
