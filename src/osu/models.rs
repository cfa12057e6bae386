//! Raw osu! API v2 payloads.
//!
//! Only the fields the proxy reads are declared. Anything that the API has
//! been seen to omit is optional or defaulted, so shape drift surfaces as a
//! missing value instead of a decode failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct RawBeatmap {
    pub id: u64,
    #[serde(default)]
    pub beatmapset_id: Option<u64>,
    #[serde(default)]
    pub mode: Option<String>,
    pub version: String,
    pub difficulty_rating: f64,
    #[serde(default)]
    pub cs: f64,
    #[serde(default)]
    pub ar: f64,
    /// Overall difficulty; the API names it `accuracy`.
    #[serde(default)]
    pub accuracy: f64,
    /// HP drain; the API names it `drain`.
    #[serde(default)]
    pub drain: f64,
    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default)]
    pub total_length: u32,
    #[serde(default)]
    pub hit_length: u32,
    #[serde(default)]
    pub count_circles: u32,
    #[serde(default)]
    pub count_sliders: u32,
    #[serde(default)]
    pub count_spinners: u32,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub max_combo: Option<u32>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub beatmapset: Option<RawBeatmapset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBeatmapset {
    pub id: u64,
    pub artist: String,
    pub title: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default)]
    pub play_count: u64,
    #[serde(default)]
    pub favourite_count: u64,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub covers: RawCovers,
    #[serde(default)]
    pub beatmaps: Vec<RawBeatmap>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCovers {
    #[serde(default)]
    pub card: Option<String>,
    #[serde(default, rename = "card@2x")]
    pub card_2x: Option<String>,
    #[serde(default)]
    pub list: Option<String>,
    #[serde(default, rename = "list@2x")]
    pub list_2x: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSearchResponse {
    #[serde(default)]
    pub beatmapsets: Vec<RawBeatmapset>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub cursor_string: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBeatmapScores {
    #[serde(default)]
    pub scores: Vec<RawScore>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawScore {
    /// Legacy score value; newer payloads only carry `total_score`.
    #[serde(default)]
    pub score: Option<u64>,
    #[serde(default)]
    pub total_score: Option<u64>,
    pub accuracy: f64,
    #[serde(default)]
    pub pp: Option<f64>,
    /// Either acronym strings or `{ "acronym": .. }` objects.
    #[serde(default)]
    pub mods: Vec<Value>,
    pub rank: String,
    #[serde(default)]
    pub max_combo: u32,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub ended_at: Option<String>,
    #[serde(default)]
    pub replay: bool,
    #[serde(default)]
    pub user: Option<RawScoreUser>,
    #[serde(default)]
    pub beatmap: Option<RawBeatmap>,
    #[serde(default)]
    pub beatmapset: Option<RawBeatmapset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawScoreUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub country: Option<RawCountry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawCountry {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub country: Option<RawCountry>,
    #[serde(default)]
    pub statistics: Option<RawUserStatistics>,
    #[serde(default)]
    pub join_date: Option<String>,
    #[serde(default)]
    pub last_visit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUserStatistics {
    #[serde(default)]
    pub global_rank: Option<u64>,
    #[serde(default)]
    pub country_rank: Option<u64>,
    #[serde(default)]
    pub pp: f64,
    #[serde(default)]
    pub ranked_score: u64,
    #[serde(default)]
    pub total_score: u64,
    #[serde(default)]
    pub hit_accuracy: f64,
    #[serde(default)]
    pub play_count: u64,
    #[serde(default)]
    pub play_time: Option<u64>,
    #[serde(default)]
    pub total_hits: u64,
    #[serde(default)]
    pub level: Option<RawLevel>,
    #[serde(default)]
    pub grade_counts: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawLevel {
    pub current: u32,
    #[serde(default)]
    pub progress: u32,
}
