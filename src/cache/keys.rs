//! Deterministic cache keys: resource kind plus normalized parameters.
//!
//! Keys are logged, so anything derived from a bearer credential carries a
//! digest of it instead of the credential itself.

use sha2::{Digest, Sha256};

pub fn app_token(client_id: &str) -> String {
    format!("client_token:{client_id}")
}

pub fn beatmap(id: u64) -> String {
    format!("beatmap:{id}")
}

/// Search text is trimmed, whitespace-collapsed and lowercased so that
/// trivially different spellings share one entry.
pub fn search(query: &str, limit: u32, offset: u32) -> String {
    format!("search:{}:{limit}:{offset}", normalize_text(query))
}

pub fn beatmap_scores(id: u64, kind: &str, limit: u32) -> String {
    format!("scores:{id}:{kind}:{limit}")
}

pub fn user_scores(username: &str, kind: &str, limit: u32) -> String {
    format!("leaderboards:{}:{kind}:{limit}", normalize_text(username))
}

pub fn placements(username: &str, kind: &str, limit: u32) -> String {
    format!("placements:{}:{kind}:{limit}", normalize_text(username))
}

pub fn global_scan(username: &str, pages: u32) -> String {
    format!("global_scan:{}:{pages}", normalize_text(username))
}

pub fn profile(access_token: &str) -> String {
    format!("me:{}", digest(access_token))
}

/// Completed user-token refresh, filed under the refresh token it consumed.
pub fn refreshed(refresh_token: &str) -> String {
    format!("refreshed:{}", digest(refresh_token))
}

fn digest(secret: &str) -> String {
    format!("{:x}", Sha256::digest(secret.as_bytes()))
}

fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
