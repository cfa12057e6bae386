//! In-memory osu! API used by tests that need call counting or latency.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use super::{ApiRequest, GatewayError, OsuApi, TokenForm, TokenResponse};

/// Routes are matched on `path?query` first, then on the bare path.
/// Unrouted calls answer 404.
#[derive(Default)]
pub struct FakeOsu {
    routes: Mutex<HashMap<String, Result<Value, GatewayError>>>,
    grants: Mutex<HashMap<String, Result<TokenResponse, GatewayError>>>,
    calls: Mutex<Vec<String>>,
    token_calls: AtomicUsize,
    token_delay: Option<Duration>,
    revoked: Mutex<HashSet<String>>,
    /// Refresh tokens already exchanged, when rotation is enforced.
    consumed: Option<Mutex<HashSet<String>>>,
}

impl FakeOsu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = Some(delay);
        self
    }

    /// Rejects a refresh token the second time it is exchanged, as osu! does.
    pub fn rotating_refresh_tokens(mut self) -> Self {
        self.consumed = Some(Mutex::new(HashSet::new()));
        self
    }

    /// Answers 401 to every call made with `bearer`.
    pub fn revoke(&self, bearer: &str) {
        self.revoked.lock().insert(bearer.to_string());
    }

    pub fn route(&self, path: &str, body: Value) {
        self.routes.lock().insert(path.to_string(), Ok(body));
    }

    pub fn fail(&self, path: &str, error: GatewayError) {
        self.routes.lock().insert(path.to_string(), Err(error));
    }

    /// Overrides the answer for one `grant_type`.
    pub fn grant(&self, grant_type: &str, result: Result<TokenResponse, GatewayError>) {
        self.grants.lock().insert(grant_type.to_string(), result);
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.as_str() == path || call.split('?').next() == Some(path))
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OsuApi for FakeOsu {
    async fn call(&self, request: ApiRequest) -> Result<Value, GatewayError> {
        let path = request.path_string();
        let full = if request.params.is_empty() {
            path.clone()
        } else {
            let query: Vec<String> = request
                .params
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            format!("{path}?{}", query.join("&"))
        };
        self.calls.lock().push(full.clone());

        if self.revoked.lock().contains(&request.bearer) {
            return Err(GatewayError::AuthExpired);
        }

        let routes = self.routes.lock();
        routes
            .get(&full)
            .or_else(|| routes.get(&path))
            .cloned()
            .unwrap_or(Err(GatewayError::NotFound))
    }

    async fn token(&self, form: TokenForm) -> Result<TokenResponse, GatewayError> {
        let n = self.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.token_delay {
            tokio::time::sleep(delay).await;
        }

        if let (Some(consumed), Some(refresh)) = (&self.consumed, &form.refresh_token) {
            if !consumed.lock().insert(refresh.clone()) {
                return Err(GatewayError::AuthExpired);
            }
        }

        let overridden = self.grants.lock().get(&form.grant_type).cloned();
        overridden.unwrap_or_else(|| {
            Ok(TokenResponse {
                access_token: format!("{}-token-{n}", form.grant_type),
                expires_in: 86400,
                refresh_token: Some(format!("refresh-{n}")),
                token_type: Some("Bearer".to_string()),
            })
        })
    }
}
