use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::SignedCookieJar;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{cookies, AppState};
use crate::error::ApiError;
use crate::osu::normalize::{Beatmap, BeatmapScore, SearchPage, UserLeaderboard, UserProfile};
use crate::scan::ScanReport;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: Option<String>,
    limit: Option<String>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreParams {
    #[serde(rename = "type")]
    kind: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScanParams {
    pages: Option<String>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchPage>, ApiError> {
    let page = state
        .service
        .search(
            params.q.as_deref(),
            params.limit.as_deref(),
            params.offset.as_deref(),
        )
        .await?;
    Ok(Json(page))
}

pub async fn beatmap(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Beatmap>, ApiError> {
    Ok(Json(state.service.beatmap(&id).await?))
}

pub async fn beatmap_scores(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ScoreParams>,
) -> Result<Json<Vec<BeatmapScore>>, ApiError> {
    let scores = state
        .service
        .beatmap_scores(&id, params.kind.as_deref(), params.limit.as_deref())
        .await?;
    Ok(Json(scores))
}

pub async fn user_leaderboards(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<ScoreParams>,
) -> Result<Json<UserLeaderboard>, ApiError> {
    let board = state
        .service
        .user_leaderboards(&username, params.kind.as_deref(), params.limit.as_deref())
        .await?;
    Ok(Json(board))
}

pub async fn placements(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<ScoreParams>,
) -> Result<Json<ScanReport>, ApiError> {
    let report = state
        .service
        .placements(&username, params.kind.as_deref(), params.limit.as_deref())
        .await?;
    Ok(Json(report))
}

pub async fn global_leaderboard(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(params): Query<ScanParams>,
) -> Result<Json<ScanReport>, ApiError> {
    let report = state
        .service
        .global_leaderboard(&username, params.pages.as_deref())
        .await?;
    Ok(Json(report))
}

/// Profile of the signed-in user. A session that cannot be refreshed is
/// destroyed along with its cookie.
pub async fn me(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<Json<UserProfile>, (SignedCookieJar, ApiError)> {
    let Some(session_id) = cookies::session_id(&jar) else {
        return Err((jar, ApiError::AuthRequired));
    };
    let Some(mut session) = state.sessions.get(&session_id) else {
        return Err((
            jar.remove(cookies::removal(cookies::SESSION_COOKIE)),
            ApiError::AuthRequired,
        ));
    };

    let before = session.clone();
    match state.service.me(&mut session).await {
        Ok(profile) => {
            if session != before {
                state.sessions.update(&session_id, session);
            }
            Ok(Json(profile))
        }
        Err(err @ ApiError::AuthExpired(_)) => {
            info!("🚪 Ending session after failed refresh");
            state.sessions.destroy(&session_id);
            state.service.logout(&before);
            Err((jar.remove(cookies::removal(cookies::SESSION_COOKIE)), err))
        }
        Err(err) => {
            if session != before {
                state.sessions.update(&session_id, session);
            }
            Err((jar, err))
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_secs": state.started.elapsed().as_secs(),
        "cache": state.service.cache().metrics(),
    }))
}
