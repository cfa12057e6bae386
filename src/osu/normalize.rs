//! Canonical response shapes.
//!
//! Every upstream payload is converted here before it reaches a handler or
//! the cache. The conversions are pure functions of the raw payload.

use num_format::{Locale, ToFormattedString};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::models::{
    RawBeatmap, RawBeatmapset, RawCountry, RawLevel, RawScore, RawSearchResponse, RawUser,
};

const SITE: &str = "https://osu.ppy.sh";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Beatmap {
    pub id: u64,
    pub title: String,
    pub version: String,
    pub creator: String,
    pub stars: f64,
    pub stats: BeatmapStats,
    pub bpm: Option<f64>,
    pub length: BeatmapLength,
    pub counts: ObjectCounts,
    pub status: Option<String>,
    pub urls: BeatmapUrls,
    pub max_combo: Option<u32>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeatmapStats {
    pub cs: f64,
    pub ar: f64,
    pub od: f64,
    pub hp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeatmapLength {
    pub total: u32,
    pub drain: u32,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectCounts {
    pub circles: u32,
    pub sliders: u32,
    pub spinners: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeatmapUrls {
    pub beatmap: String,
    pub preview: Option<String>,
    pub cover: Option<String>,
    pub cover_2x: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    pub results: Vec<BeatmapsetSummary>,
    pub total: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeatmapsetSummary {
    pub id: u64,
    pub title: String,
    pub creator: String,
    pub status: Option<String>,
    pub bpm: Option<f64>,
    pub play_count: u64,
    pub favourite_count: u64,
    pub urls: BeatmapsetUrls,
    pub difficulties: Vec<Difficulty>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeatmapsetUrls {
    pub beatmapset: String,
    pub preview: Option<String>,
    pub cover: Option<String>,
    pub cover_2x: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Difficulty {
    pub id: u64,
    pub version: String,
    pub stars: f64,
    pub ar: f64,
    pub od: f64,
}

/// One row of a beatmap's leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeatmapScore {
    pub position: u32,
    pub user: ScoreUser,
    pub score: String,
    pub accuracy: String,
    pub pp: Option<u32>,
    pub mods: String,
    pub rank: String,
    pub max_combo: u32,
    pub created_at: Option<String>,
    pub replay_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreUser {
    pub id: u64,
    pub username: String,
    pub country: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: u64,
    pub username: String,
    pub country: Option<String>,
    pub global_rank: Option<u64>,
    pub country_rank: Option<u64>,
    pub pp: f64,
}

/// One of a user's own scores (best, recent or firsts).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserScore {
    pub beatmap: ScoreBeatmap,
    pub score: String,
    pub accuracy: String,
    pub pp: Option<u32>,
    pub mods: String,
    pub rank: String,
    pub max_combo: u32,
    pub created_at: Option<String>,
    pub replay_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBeatmap {
    pub id: u64,
    pub title: String,
    pub stars: f64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserLeaderboard {
    pub user: UserSummary,
    pub scores: Vec<UserScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    pub country: Option<RawCountry>,
    pub avatar_url: Option<String>,
    pub is_online: bool,
    pub statistics: ProfileStatistics,
    pub join_date: Option<String>,
    pub last_visit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileStatistics {
    pub global_rank: Option<u64>,
    pub country_rank: Option<u64>,
    pub pp: f64,
    pub ranked_score: u64,
    pub total_score: u64,
    pub accuracy: f64,
    pub play_count: u64,
    pub play_time: Option<u64>,
    pub total_hits: u64,
    pub level: Option<RawLevel>,
    pub grades: BTreeMap<String, i64>,
}

/// A ranked page of the catalog, flattened to scannable beatmaps.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPage {
    pub beatmaps: Vec<ScoreBeatmap>,
    pub cursor: Option<String>,
}

pub fn beatmap(raw: RawBeatmap) -> Beatmap {
    let set = raw.beatmapset.as_ref();
    let set_id = set.map(|s| s.id).or(raw.beatmapset_id);

    Beatmap {
        id: raw.id,
        title: set.map(set_title).unwrap_or_default(),
        creator: set.map(|s| s.creator.clone()).unwrap_or_default(),
        stars: round_stars(raw.difficulty_rating),
        stats: BeatmapStats {
            cs: raw.cs,
            ar: raw.ar,
            od: raw.accuracy,
            hp: raw.drain,
        },
        bpm: raw.bpm,
        length: BeatmapLength {
            total: raw.total_length,
            drain: raw.hit_length,
            formatted: format_seconds(raw.total_length),
        },
        counts: ObjectCounts {
            circles: raw.count_circles,
            sliders: raw.count_sliders,
            spinners: raw.count_spinners,
        },
        urls: BeatmapUrls {
            beatmap: match set_id {
                Some(set_id) => format!("{SITE}/beatmapsets/{set_id}#osu/{}", raw.id),
                None => format!("{SITE}/beatmaps/{}", raw.id),
            },
            preview: set.and_then(|s| s.preview_url.clone()),
            cover: set.and_then(|s| s.covers.card.clone()),
            cover_2x: set.and_then(|s| s.covers.card_2x.clone()),
        },
        status: raw.status,
        max_combo: raw.max_combo,
        updated_at: raw.last_updated,
        version: raw.version,
    }
}

pub fn search_page(raw: RawSearchResponse, limit: u32, offset: u32) -> SearchPage {
    let total = raw.total;
    SearchPage {
        results: raw.beatmapsets.into_iter().map(beatmapset_summary).collect(),
        total,
        has_more: u64::from(offset) + u64::from(limit) < total,
    }
}

fn beatmapset_summary(set: RawBeatmapset) -> BeatmapsetSummary {
    BeatmapsetSummary {
        id: set.id,
        title: set_title(&set),
        creator: set.creator.clone(),
        status: set.status.clone(),
        bpm: set.bpm,
        play_count: set.play_count,
        favourite_count: set.favourite_count,
        urls: BeatmapsetUrls {
            beatmapset: format!("{SITE}/beatmapsets/{}", set.id),
            preview: set.preview_url.clone(),
            cover: set.covers.list.clone(),
            cover_2x: set.covers.list_2x.clone(),
        },
        difficulties: set
            .beatmaps
            .iter()
            .map(|bm| Difficulty {
                id: bm.id,
                version: bm.version.clone(),
                stars: round_stars(bm.difficulty_rating),
                ar: bm.ar,
                od: bm.accuracy,
            })
            .collect(),
    }
}

/// Flattens a ranked search page to osu!standard difficulties.
pub fn ranked_page(raw: RawSearchResponse) -> RankedPage {
    let beatmaps = raw
        .beatmapsets
        .iter()
        .flat_map(|set| {
            set.beatmaps
                .iter()
                .filter(|bm| bm.mode.as_deref().is_none_or(|mode| mode == "osu"))
                .map(move |bm| score_beatmap(bm, Some(set)))
        })
        .collect();

    RankedPage {
        beatmaps,
        cursor: raw.cursor_string,
    }
}

/// Positions are 1-based and follow upstream order.
pub fn beatmap_scores(scores: Vec<RawScore>) -> Vec<BeatmapScore> {
    scores
        .into_iter()
        .enumerate()
        .filter_map(|(index, score)| {
            let user = score.user.as_ref()?;
            Some(BeatmapScore {
                position: index as u32 + 1,
                user: ScoreUser {
                    id: user.id,
                    username: user.username.clone(),
                    country: user
                        .country_code
                        .clone()
                        .or_else(|| user.country.as_ref().map(|c| c.code.clone())),
                    avatar_url: user.avatar_url.clone(),
                },
                score: format_score(score_value(&score)),
                accuracy: format_accuracy(score.accuracy),
                pp: score.pp.map(round_pp),
                mods: format_mods(&score.mods),
                rank: score.rank.clone(),
                max_combo: score.max_combo,
                created_at: score.created_at.clone().or(score.ended_at.clone()),
                replay_available: score.replay,
            })
        })
        .collect()
}

pub fn user_summary(raw: &RawUser) -> UserSummary {
    let stats = raw.statistics.clone().unwrap_or_default();
    UserSummary {
        id: raw.id,
        username: raw.username.clone(),
        country: raw.country.as_ref().map(|c| c.name.clone()),
        global_rank: stats.global_rank,
        country_rank: stats.country_rank,
        pp: stats.pp,
    }
}

/// Scores missing their beatmap are dropped.
pub fn user_scores(scores: Vec<RawScore>) -> Vec<UserScore> {
    scores
        .into_iter()
        .filter_map(|score| {
            let beatmap = score_beatmap(score.beatmap.as_ref()?, score.beatmapset.as_ref());
            Some(UserScore {
                beatmap,
                score: format_score(score_value(&score)),
                accuracy: format_accuracy(score.accuracy),
                pp: score.pp.map(round_pp),
                mods: format_mods(&score.mods),
                rank: score.rank.clone(),
                max_combo: score.max_combo,
                created_at: score.created_at.clone().or(score.ended_at.clone()),
                replay_available: score.replay,
            })
        })
        .collect()
}

pub fn user_profile(raw: RawUser) -> UserProfile {
    let stats = raw.statistics.unwrap_or_default();
    UserProfile {
        id: raw.id,
        username: raw.username,
        country: raw.country,
        avatar_url: raw.avatar_url,
        is_online: raw.is_online,
        statistics: ProfileStatistics {
            global_rank: stats.global_rank,
            country_rank: stats.country_rank,
            pp: stats.pp,
            ranked_score: stats.ranked_score,
            total_score: stats.total_score,
            accuracy: stats.hit_accuracy,
            play_count: stats.play_count,
            play_time: stats.play_time,
            total_hits: stats.total_hits,
            level: stats.level,
            grades: stats.grade_counts,
        },
        join_date: raw.join_date,
        last_visit: raw.last_visit,
    }
}

fn score_beatmap(bm: &RawBeatmap, set: Option<&RawBeatmapset>) -> ScoreBeatmap {
    let set = set.or(bm.beatmapset.as_ref());
    let title = match set {
        Some(set) => format!("{} [{}]", set_title(set), bm.version),
        None => format!("[{}]", bm.version),
    };

    ScoreBeatmap {
        id: bm.id,
        title,
        stars: round_stars(bm.difficulty_rating),
        url: format!("{SITE}/beatmaps/{}", bm.id),
    }
}

fn set_title(set: &RawBeatmapset) -> String {
    format!("{} - {}", set.artist, set.title)
}

fn score_value(score: &RawScore) -> u64 {
    score.score.or(score.total_score).unwrap_or_default()
}

/// Two-decimal star rating.
pub fn round_stars(rating: f64) -> f64 {
    (rating * 100.0).round() / 100.0
}

fn round_pp(pp: f64) -> u32 {
    pp.max(0.0).round() as u32
}

/// `m:ss`, with `0:00` for an unknown length.
pub fn format_seconds(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Thousands-separated score, e.g. `12,345,678`.
pub fn format_score(score: u64) -> String {
    score.to_formatted_string(&Locale::en)
}

/// Upstream accuracy is a fraction; rendered as a two-decimal percentage.
pub fn format_accuracy(accuracy: f64) -> String {
    format!("{:.2}%", accuracy * 100.0)
}

pub fn format_mods(mods: &[Value]) -> String {
    let joined: String = mods
        .iter()
        .filter_map(|m| match m {
            Value::String(acronym) => Some(acronym.as_str()),
            Value::Object(fields) => fields.get("acronym").and_then(Value::as_str),
            _ => None,
        })
        .collect();

    if joined.is_empty() {
        "None".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osu::fixtures;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw_beatmap(value: Value) -> RawBeatmap {
        serde_json::from_value(value).expect("fixture decodes")
    }

    #[test]
    fn beatmap_is_flattened() {
        let bm = beatmap(raw_beatmap(fixtures::beatmap(75, 1)));

        assert_eq!(bm.title, "Kenji Ninuma - DISCOPRINCE");
        assert_eq!(bm.stars, 2.55);
        assert_eq!(bm.bpm, Some(119.999));
        assert_eq!(bm.length.formatted, "2:22");
        assert_eq!(bm.stats, BeatmapStats { cs: 4.0, ar: 6.0, od: 6.0, hp: 6.0 });
        assert_eq!(bm.urls.beatmap, "https://osu.ppy.sh/beatmapsets/1#osu/75");
        assert_eq!(bm.urls.cover_2x.as_deref(), Some("https://assets.ppy.sh/card@2x.jpg"));
    }

    #[test]
    fn normalization_is_deterministic() {
        let a = || raw_beatmap(fixtures::beatmap(75, 1));
        let b = || raw_beatmap(fixtures::beatmap(76, 2));

        let a_first = beatmap(a());
        let b_after_a = beatmap(b());
        let b_first = beatmap(b());
        let a_after_b = beatmap(a());

        assert_eq!(a_first, a_after_b);
        assert_eq!(b_first, b_after_a);
        assert_ne!(a_first, b_first);
    }

    #[test]
    fn formatting_helpers() {
        assert_eq!(format_seconds(0), "0:00");
        assert_eq!(format_seconds(65), "1:05");
        assert_eq!(format_score(12_345_678), "12,345,678");
        assert_eq!(format_accuracy(0.98766), "98.77%");
        assert_eq!(round_stars(5.4567), 5.46);
    }

    #[test]
    fn mods_accept_strings_and_objects() {
        assert_eq!(format_mods(&[json!("HD"), json!("DT")]), "HDDT");
        assert_eq!(format_mods(&[json!({"acronym": "HR"})]), "HR");
        assert_eq!(format_mods(&[]), "None");
    }

    #[test]
    fn scores_keep_upstream_order() {
        let raw: super::super::models::RawBeatmapScores =
            serde_json::from_value(fixtures::beatmap_scores(&[(9, "first"), (3, "second")]))
                .expect("fixture decodes");
        let scores = beatmap_scores(raw.scores);

        assert_eq!(scores.len(), 2);
        assert_eq!((scores[0].position, scores[0].user.id), (1, 9));
        assert_eq!((scores[1].position, scores[1].user.id), (2, 3));
        assert_eq!(scores[0].accuracy, "99.00%");
        assert_eq!(scores[0].pp, Some(301));
        assert_eq!(scores[0].user.country.as_deref(), Some("JP"));
    }

    #[test]
    fn search_page_reports_more_results() {
        let raw: RawSearchResponse =
            serde_json::from_value(fixtures::search(&[(1, &[75, 76])], None, 25))
                .expect("fixture decodes");
        let page = search_page(raw, 10, 10);

        assert!(page.has_more);
        assert_eq!(page.results[0].difficulties.len(), 2);
        assert_eq!(page.results[0].urls.beatmapset, "https://osu.ppy.sh/beatmapsets/1");
    }

    #[test]
    fn ranked_page_skips_other_modes() {
        let mut payload = fixtures::search(&[(1, &[75, 76])], Some("next"), 2);
        payload["beatmapsets"][0]["beatmaps"][1]["mode"] = json!("taiko");
        let raw: RawSearchResponse = serde_json::from_value(payload).expect("fixture decodes");
        let page = ranked_page(raw);

        assert_eq!(page.beatmaps.len(), 1);
        assert_eq!(page.beatmaps[0].title, "Artist 1 - Song 1 [Diff 75]");
        assert_eq!(page.cursor.as_deref(), Some("next"));
    }
}
