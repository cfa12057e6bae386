use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::SignedCookieJar;
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use super::{cookies, AppState};
use crate::error::ApiError;

const STATE_LEN: usize = 32;

pub async fn login(State(state): State<AppState>, jar: SignedCookieJar) -> impl IntoResponse {
    let oauth_state: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect();

    let url = state
        .service
        .tokens()
        .credential()
        .authorize_url(&state.settings.oauth_base, &oauth_state);

    let jar = jar.add(cookies::state_cookie(
        &oauth_state,
        state.settings.secure_cookies,
    ));
    (jar, Redirect::to(url.as_str()))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

pub async fn callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let expected = cookies::oauth_state(&jar);
    let jar = jar.remove(cookies::removal(cookies::STATE_COOKIE));

    if let Some(reason) = &params.error {
        warn!("⚠️ OAuth provider returned an error: {}", reason);
        return Ok((jar, Redirect::to("/?error=oauth_failed")).into_response());
    }

    match (params.state.as_deref(), expected.as_deref()) {
        (Some(received), Some(expected)) if received == expected => {}
        _ => {
            warn!("⚠️ OAuth state mismatch");
            return Err(ApiError::validation("Invalid state parameter"));
        }
    }

    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        return Err(ApiError::validation("Authorization code missing"));
    };

    match state.service.tokens().exchange_code(code).await {
        Ok(session) => {
            let session_id = state.sessions.create(session);
            let jar = jar.add(cookies::session_cookie(
                &session_id,
                state.sessions.lifetime().as_secs(),
                state.settings.secure_cookies,
            ));
            info!("✅ Login completed");
            Ok((jar, Redirect::to("/?login=success")).into_response())
        }
        Err(e) => {
            error!("❌ OAuth callback failed: {}", e);
            Ok((jar, Redirect::to("/?error=oauth_failed")).into_response())
        }
    }
}

pub async fn logout(State(state): State<AppState>, jar: SignedCookieJar) -> impl IntoResponse {
    if let Some(session_id) = cookies::session_id(&jar) {
        if let Some(session) = state.sessions.destroy(&session_id) {
            state.service.logout(&session);
        }
    }

    let jar = jar.remove(cookies::removal(cookies::SESSION_COOKIE));
    (jar, Json(json!({ "message": "Logged out successfully" })))
}
