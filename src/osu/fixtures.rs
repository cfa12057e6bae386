//! Canned upstream payloads for tests.

use serde_json::{json, Value};

pub fn beatmap(id: u64, set_id: u64) -> Value {
    json!({
        "id": id,
        "beatmapset_id": set_id,
        "mode": "osu",
        "version": "Normal",
        "difficulty_rating": 2.5527,
        "cs": 4.0,
        "ar": 6.0,
        "accuracy": 6.0,
        "drain": 6.0,
        "bpm": 119.999,
        "total_length": 142,
        "hit_length": 109,
        "count_circles": 160,
        "count_sliders": 30,
        "count_spinners": 3,
        "status": "ranked",
        "max_combo": 314,
        "last_updated": "2014-05-18T17:16:51Z",
        "beatmapset": {
            "id": set_id,
            "artist": "Kenji Ninuma",
            "title": "DISCOPRINCE",
            "creator": "peppy",
            "status": "ranked",
            "preview_url": "//b.ppy.sh/preview/1.mp3",
            "covers": {
                "card": "https://assets.ppy.sh/card.jpg",
                "card@2x": "https://assets.ppy.sh/card@2x.jpg",
                "list": "https://assets.ppy.sh/list.jpg",
                "list@2x": "https://assets.ppy.sh/list@2x.jpg"
            }
        }
    })
}

/// One ranked search page. Each set is `(set_id, beatmap_ids)`.
pub fn search(sets: &[(u64, &[u64])], cursor: Option<&str>, total: u64) -> Value {
    let sets: Vec<Value> = sets
        .iter()
        .map(|(set_id, beatmaps)| {
            json!({
                "id": set_id,
                "artist": format!("Artist {set_id}"),
                "title": format!("Song {set_id}"),
                "creator": "mapper",
                "status": "ranked",
                "bpm": 180.0,
                "play_count": 1000,
                "favourite_count": 10,
                "preview_url": format!("//b.ppy.sh/preview/{set_id}.mp3"),
                "covers": { "list": "l.jpg", "list@2x": "l2.jpg" },
                "beatmaps": beatmaps.iter().map(|id| json!({
                    "id": id,
                    "mode": "osu",
                    "version": format!("Diff {id}"),
                    "difficulty_rating": 5.0,
                    "ar": 9.0,
                    "accuracy": 8.0
                })).collect::<Vec<_>>()
            })
        })
        .collect();

    json!({ "beatmapsets": sets, "total": total, "cursor_string": cursor })
}

/// A beatmap leaderboard in the given order. Each entry is `(user_id, username)`.
pub fn beatmap_scores(entries: &[(u64, &str)]) -> Value {
    let scores: Vec<Value> = entries
        .iter()
        .map(|(user_id, username)| {
            json!({
                "score": 1_234_567,
                "accuracy": 0.99,
                "pp": 300.6,
                "mods": ["HD"],
                "rank": "S",
                "max_combo": 500,
                "created_at": "2024-01-01T00:00:00Z",
                "replay": true,
                "user": {
                    "id": user_id,
                    "username": username,
                    "country_code": "JP",
                    "avatar_url": "https://a.ppy.sh/1"
                }
            })
        })
        .collect();

    json!({ "scores": scores })
}

pub fn user(id: u64, username: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "avatar_url": "https://a.ppy.sh/2",
        "is_online": false,
        "country_code": "AU",
        "country": { "code": "AU", "name": "Australia" },
        "statistics": {
            "global_rank": 1,
            "country_rank": 1,
            "pp": 12000.5,
            "ranked_score": 1,
            "total_score": 2,
            "hit_accuracy": 99.1,
            "play_count": 100,
            "play_time": 3600,
            "total_hits": 5000,
            "level": { "current": 100, "progress": 10 },
            "grade_counts": { "ss": 1, "ssh": 2, "s": 3, "sh": 4, "a": 5 }
        },
        "join_date": "2010-01-01T00:00:00Z",
        "last_visit": null
    })
}

/// A user's own score list, one score per beatmap id.
pub fn user_scores(beatmap_ids: &[u64]) -> Value {
    let scores: Vec<Value> = beatmap_ids
        .iter()
        .map(|id| {
            json!({
                "score": 1_000_000,
                "accuracy": 0.975,
                "pp": null,
                "mods": [],
                "rank": "A",
                "max_combo": 321,
                "created_at": "2024-02-02T00:00:00Z",
                "replay": false,
                "beatmap": { "id": id, "version": format!("Diff {id}"), "difficulty_rating": 4.321 },
                "beatmapset": { "id": id * 10, "artist": "Artist", "title": format!("Song {id}") }
            })
        })
        .collect();

    Value::Array(scores)
}

pub fn token(access_token: &str, refresh_token: Option<&str>, expires_in: u64) -> Value {
    json!({
        "token_type": "Bearer",
        "access_token": access_token,
        "refresh_token": refresh_token,
        "expires_in": expires_in
    })
}
