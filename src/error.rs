use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::osu::GatewayError;

/// Route-facing error taxonomy. Every handler failure ends up here and is
/// rendered as `{ "error": "<message>" }`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Authentication required")]
    AuthRequired,
    #[error("{0}")]
    AuthExpired(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("{0}")]
    UpstreamUnavailable(String),
    #[error("Internal server error")]
    Internal,
}

/// What a failed upstream call was fetching; picks the user-visible wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Beatmap,
    Search,
    BeatmapScores,
    UserLeaderboards,
    Scan,
    Profile,
}

impl Resource {
    fn not_found(self) -> &'static str {
        match self {
            Resource::Beatmap | Resource::BeatmapScores => "Beatmap not found",
            Resource::UserLeaderboards | Resource::Scan => "User not found",
            Resource::Search | Resource::Profile => "Resource not found",
        }
    }

    fn failure(self) -> &'static str {
        match self {
            Resource::Beatmap => "Failed to fetch beatmap info",
            Resource::Search => "Failed to search beatmaps",
            Resource::BeatmapScores => "Failed to fetch beatmap scores",
            Resource::UserLeaderboards => "Failed to fetch user leaderboards",
            Resource::Scan => "Failed to scan leaderboards",
            Resource::Profile => "Failed to fetch user info",
        }
    }
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn session_expired() -> Self {
        ApiError::AuthExpired("Session expired, please login again".to_string())
    }

    /// Translates an upstream failure for the given resource.
    pub fn upstream(resource: Resource, err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound => ApiError::NotFound(resource.not_found().to_string()),
            GatewayError::AuthExpired => ApiError::AuthExpired("Authentication expired".to_string()),
            GatewayError::RateLimited { retry_after } => ApiError::RateLimited {
                message: "osu! API rate limit exceeded".to_string(),
                retry_after,
            },
            GatewayError::Unavailable(_) | GatewayError::Malformed(_) => {
                warn!("⚠️ Upstream failure for {:?}: {}", resource, err);
                ApiError::UpstreamUnavailable(resource.failure().to_string())
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::AuthRequired | ApiError::AuthExpired(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::UpstreamUnavailable(_) | ApiError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AuthFailure(GatewayError::RateLimited { retry_after }) => {
                ApiError::RateLimited {
                    message: "osu! API rate limit exceeded".to_string(),
                    retry_after,
                }
            }
            AuthError::AuthFailure(_) => {
                ApiError::UpstreamUnavailable("Failed to authenticate with osu! API".to_string())
            }
            AuthError::RefreshFailure(_) => ApiError::session_expired(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("❌ Server error: {}", self);
        }

        let retry_after = match &self {
            ApiError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        };

        let mut response = (status, Json(json!({ "error": self.to_string() }))).into_response();
        if let Some(wait) = retry_after {
            let secs = wait.as_secs().max(1);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
