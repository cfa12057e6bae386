use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use super::AppState;
use crate::error::ApiError;
use crate::ratelimit::{RateCategory, RateDecision};

pub async fn default(State(state): State<AppState>, request: Request, next: Next) -> Response {
    enforce(&state, RateCategory::Default, request, next).await
}

pub async fn heavy(State(state): State<AppState>, request: Request, next: Next) -> Response {
    enforce(&state, RateCategory::Heavy, request, next).await
}

async fn enforce(state: &AppState, category: RateCategory, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = client_identity(request.headers(), peer);

    match state.limiter.check(&identity, category) {
        RateDecision::Allow { .. } => next.run(request).await,
        RateDecision::Reject { retry_after } => ApiError::RateLimited {
            message: category.reject_message().to_string(),
            retry_after: Some(retry_after),
        }
        .into_response(),
    }
}

/// First `X-Forwarded-For` hop when behind a proxy, else the socket peer.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::{self, json};
    use crate::osu::{fake::FakeOsu, fixtures};
    use crate::ratelimit::{Budget, RateLimiter};
    use axum::{
        body::Body,
        http::{header, HeaderValue, Request as HttpRequest, StatusCode},
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn from(ip: &str, uri: &str) -> HttpRequest<Body> {
        HttpRequest::get(uri)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .expect("request")
    }

    #[test]
    fn identity_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        let peer: Option<SocketAddr> = "192.168.1.9:4000".parse().ok();
        assert_eq!(client_identity(&headers, peer), "192.168.1.9");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_identity(&headers, peer), "203.0.113.7");
        assert_eq!(client_identity(&HeaderMap::new(), None), "unknown");
    }

    #[tokio::test]
    async fn heavy_routes_reject_past_budget() {
        let api = Arc::new(FakeOsu::new());
        api.route("users/peppy/osu", fixtures::user(2, "peppy"));
        api.route("users/2/scores/best", fixtures::user_scores(&[1]));
        let state = test_support::state_with(
            api,
            RateLimiter::new(
                Budget::new(100, Duration::from_secs(900)),
                Budget::new(2, Duration::from_secs(3600)),
            ),
        );

        for _ in 0..2 {
            let response =
                test_support::send(&state, from("1.1.1.1", "/api/user/peppy/leaderboards")).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let rejected =
            test_support::send(&state, from("1.1.1.1", "/api/user/peppy/leaderboards")).await;
        assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(rejected.headers().contains_key(header::RETRY_AFTER));
        assert_eq!(
            json(rejected).await["error"],
            "Leaderboard scanning is rate limited. Try again in an hour."
        );

        // Another client and the light routes are unaffected.
        let other =
            test_support::send(&state, from("2.2.2.2", "/api/user/peppy/leaderboards")).await;
        assert_eq!(other.status(), StatusCode::OK);
        let light = test_support::send(&state, from("1.1.1.1", "/api/beatmap/0")).await;
        assert_eq!(light.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn default_budget_covers_every_api_route() {
        let state = test_support::state_with(
            Arc::new(FakeOsu::new()),
            RateLimiter::new(
                Budget::new(1, Duration::from_secs(900)),
                Budget::new(5, Duration::from_secs(3600)),
            ),
        );

        let first = test_support::send(&state, from("1.1.1.1", "/api/beatmap/0")).await;
        assert_eq!(first.status(), StatusCode::BAD_REQUEST);
        let second = test_support::send(&state, from("1.1.1.1", "/api/search?q=ab")).await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        // Health is outside the budget.
        let health = test_support::send(&state, from("1.1.1.1", "/health")).await;
        assert_eq!(health.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn oauth_routes_spend_the_default_budget() {
        let api = Arc::new(FakeOsu::new());
        let state = test_support::state_with(
            api.clone(),
            RateLimiter::new(
                Budget::new(2, Duration::from_secs(900)),
                Budget::new(5, Duration::from_secs(3600)),
            ),
        );

        let login = test_support::send(&state, from("3.3.3.3", "/login")).await;
        assert_eq!(login.status(), StatusCode::SEE_OTHER);
        let forged =
            test_support::send(&state, from("3.3.3.3", "/callback?code=junk&state=x")).await;
        assert_eq!(forged.status(), StatusCode::BAD_REQUEST);

        let replayed =
            test_support::send(&state, from("3.3.3.3", "/callback?code=junk&state=x")).await;
        assert_eq!(replayed.status(), StatusCode::TOO_MANY_REQUESTS);
        let logout = test_support::send(
            &state,
            HttpRequest::post("/logout")
                .header("x-forwarded-for", "3.3.3.3")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(logout.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(api.token_calls(), 0);
    }
}
