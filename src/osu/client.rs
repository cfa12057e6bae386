use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use super::{ApiRequest, GatewayError, OsuApi, TokenForm, TokenResponse};

const USER_AGENT: &str = concat!("osu-score-proxy/", env!("CARGO_PKG_VERSION"));

/// `reqwest`-backed transport for the osu! API and its OAuth endpoint.
#[derive(Debug, Clone)]
pub struct OsuHttpClient {
    client: reqwest::Client,
    api_base: Url,
    token_url: Url,
}

impl OsuHttpClient {
    pub fn new(api_base: Url, oauth_base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let token_url = endpoint(&oauth_base, &["token".to_string()]);

        Ok(Self {
            client,
            api_base,
            token_url,
        })
    }
}

#[async_trait]
impl OsuApi for OsuHttpClient {
    async fn call(&self, request: ApiRequest) -> Result<Value, GatewayError> {
        let url = endpoint(&self.api_base, &request.path);
        debug!("🌐 osu! API {}", request);

        let response = self
            .client
            .request(request.method.clone(), url)
            .bearer_auth(&request.bearer)
            .query(&request.params)
            .send()
            .await
            .map_err(transport_error)?;

        let response = classify(response).await.inspect_err(|e| {
            warn!("❌ osu! API {} failed: {}", request, e);
        })?;

        response
            .json::<Value>()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))
    }

    async fn token(&self, form: TokenForm) -> Result<TokenResponse, GatewayError> {
        debug!("🔑 Token exchange ({})", form.grant_type);

        let response = self
            .client
            .post(self.token_url.clone())
            .json(&form)
            .send()
            .await
            .map_err(transport_error)?;

        let response = classify(response).await.inspect_err(|e| {
            error!("❌ Token exchange ({}) failed: {}", form.grant_type, e);
        })?;

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}

/// Appends encoded path segments to a base URL.
fn endpoint(base: &Url, segments: &[String]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Unavailable("request timed out".to_string())
    } else {
        GatewayError::Unavailable(e.to_string())
    }
}

async fn classify(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::NOT_FOUND => Err(GatewayError::NotFound),
        StatusCode::UNAUTHORIZED => Err(GatewayError::AuthExpired),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(GatewayError::RateLimited { retry_after })
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            Err(GatewayError::Unavailable(format!("HTTP {status}: {body}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osu::fixtures;
    use mockito::Matcher;

    fn client_for(server: &mockito::Server) -> OsuHttpClient {
        let api = Url::parse(&format!("{}/api/v2", server.url())).expect("valid url");
        let oauth = Url::parse(&format!("{}/oauth", server.url())).expect("valid url");
        OsuHttpClient::new(api, oauth, Duration::from_secs(5)).expect("client builds")
    }

    #[tokio::test]
    async fn successful_call_sends_bearer_and_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/beatmaps/75/scores")
            .match_header("authorization", "Bearer abc")
            .match_query(Matcher::UrlEncoded("limit".into(), "50".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(fixtures::beatmap_scores(&[(1, "a")]).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let body = client
            .call(ApiRequest::get(["beatmaps", "75", "scores"], "abc").param("limit", 50))
            .await
            .expect("call succeeds");

        assert_eq!(body["scores"][0]["user"]["id"], 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn path_segments_are_encoded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/users/Some%20Body/osu")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = client_for(&server);
        client
            .call(ApiRequest::get(["users", "Some Body", "osu"], "t"))
            .await
            .expect("call succeeds");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn statuses_are_classified() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/api/v2/missing").with_status(404).create_async().await;
        server.mock("GET", "/api/v2/expired").with_status(401).create_async().await;
        server
            .mock("GET", "/api/v2/limited")
            .with_status(429)
            .with_header("retry-after", "30")
            .create_async()
            .await;
        server
            .mock("GET", "/api/v2/broken")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = client_for(&server);
        let call = |path: &'static str| client.call(ApiRequest::get([path], "t"));

        assert_eq!(call("missing").await, Err(GatewayError::NotFound));
        assert_eq!(call("expired").await, Err(GatewayError::AuthExpired));
        assert_eq!(
            call("limited").await,
            Err(GatewayError::RateLimited {
                retry_after: Some(Duration::from_secs(30))
            })
        );
        assert!(matches!(
            call("broken").await,
            Err(GatewayError::Unavailable(msg)) if msg.contains("502")
        ));
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v2/html")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client.call(ApiRequest::get(["html"], "t")).await;
        assert!(matches!(result, Err(GatewayError::Malformed(_))));
    }

    #[tokio::test]
    async fn token_exchange_posts_grant() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/token")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "client_id": "42",
                "grant_type": "client_credentials",
                "scope": "public"
            })))
            .with_status(200)
            .with_body(fixtures::token("app", None, 86400).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let response = client
            .token(TokenForm {
                client_id: "42".into(),
                client_secret: "s".into(),
                grant_type: "client_credentials".into(),
                scope: Some("public".into()),
                code: None,
                redirect_uri: None,
                refresh_token: None,
            })
            .await
            .expect("exchange succeeds");

        assert_eq!(response.access_token, "app");
        assert_eq!(response.expires_in, 86400);
        mock.assert_async().await;
    }

    #[test]
    fn endpoint_appends_below_base_path() {
        let base = Url::parse("https://osu.ppy.sh/oauth").expect("valid url");
        assert_eq!(
            endpoint(&base, &["token".to_string()]).as_str(),
            "https://osu.ppy.sh/oauth/token"
        );
    }
}
