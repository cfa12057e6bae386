//! # osu! API Gateway
//!
//! Everything that talks to the upstream osu! API lives here.
//!
//! - [`OsuApi`]: the transport seam. [`client::OsuHttpClient`] implements it
//!   with `reqwest`; tests substitute fakes and mocks.
//! - [`gateway::Gateway`]: typed operations that decode raw payloads and
//!   return the canonical shapes from [`normalize`].
//! - [`GatewayError`]: the classification of every failed call.
//!
//! Failures are never retried here. A 401 is surfaced as
//! [`GatewayError::AuthExpired`] so the caller can run its refresh path, and
//! a 429 is passed through with the upstream `Retry-After` hint.

pub mod client;
pub mod gateway;
pub mod models;
pub mod normalize;

#[cfg(test)]
pub mod fake;
#[cfg(test)]
pub mod fixtures;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, time::Duration};

pub use client::OsuHttpClient;
pub use gateway::Gateway;

/// Classified upstream failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("resource not found upstream")]
    NotFound,
    #[error("upstream rejected the bearer token")]
    AuthExpired,
    #[error("upstream rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected upstream payload: {0}")]
    Malformed(String),
}

/// A single authenticated API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path segments below the API root, encoded by the transport.
    pub path: Vec<String>,
    pub params: Vec<(String, String)>,
    pub bearer: String,
}

impl ApiRequest {
    pub fn get<I, S>(path: I, bearer: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method: Method::GET,
            path: path.into_iter().map(Into::into).collect(),
            params: Vec::new(),
            bearer: bearer.to_string(),
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn path_string(&self) -> String {
        self.path.join("/")
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.method, self.path_string())?;
        if !self.params.is_empty() {
            let query: Vec<String> = self.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, "?{}", query.join("&"))?;
        }
        Ok(())
    }
}

/// Body of a `POST /oauth/token` exchange.
#[derive(Clone, PartialEq, Serialize)]
pub struct TokenForm {
    pub client_id: String,
    pub client_secret: String,
    pub grant_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl fmt::Debug for TokenForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenForm")
            .field("client_id", &self.client_id)
            .field("grant_type", &self.grant_type)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Transport seam to the osu! API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OsuApi: Send + Sync {
    /// Performs an authenticated API call and returns the decoded JSON body.
    async fn call(&self, request: ApiRequest) -> Result<Value, GatewayError>;

    /// Performs an OAuth token exchange.
    async fn token(&self, form: TokenForm) -> Result<TokenResponse, GatewayError>;
}
