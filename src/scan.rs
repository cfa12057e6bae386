//! Leaderboard scans: where does a user place on a set of beatmaps?
//!
//! The targeted scan walks the user's own score list and looks up one
//! scoreboard per score. The exhaustive scan pages through the ranked
//! catalog and looks up every scoreboard it meets; it is bounded by a page
//! cap and tolerates individual lookup failures.
//!
//! Upstream scoreboard order is authoritative. When a user appears more than
//! once on a board the first row wins, and placements keep the order in which
//! beatmaps were visited.

use futures::{stream, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::osu::normalize::{BeatmapScore, ScoreBeatmap, UserSummary};
use crate::osu::{Gateway, GatewayError};

/// Rows fetched per scoreboard lookup.
const LOOKUP_DEPTH: u32 = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub beatmap: ScoreBeatmap,
    pub position: u32,
    pub score: String,
    pub accuracy: String,
    pub mods: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(Placement),
    NotFound,
    LookupFailed(GatewayError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub user: UserSummary,
    pub placements: Vec<Placement>,
    /// Scoreboards requested.
    pub lookups: usize,
    /// Lookups that failed and were skipped.
    pub skipped: usize,
    pub pages_scanned: u32,
    /// The catalog walk stopped early because a page could not be fetched.
    pub truncated: bool,
}

impl ScanReport {
    fn new(user: UserSummary) -> Self {
        Self {
            user,
            placements: Vec::new(),
            lookups: 0,
            skipped: 0,
            pages_scanned: 0,
            truncated: false,
        }
    }

    fn record(&mut self, outcome: LookupOutcome) {
        self.lookups += 1;
        match outcome {
            LookupOutcome::Found(placement) => self.placements.push(placement),
            LookupOutcome::NotFound => {}
            LookupOutcome::LookupFailed(_) => self.skipped += 1,
        }
    }
}

#[derive(Clone)]
pub struct LeaderboardScanner {
    gateway: Gateway,
    concurrency: usize,
    page_cap: u32,
}

impl LeaderboardScanner {
    pub fn new(gateway: Gateway, concurrency: usize, page_cap: u32) -> Self {
        Self {
            gateway,
            concurrency: concurrency.max(1),
            page_cap,
        }
    }

    pub fn page_cap(&self) -> u32 {
        self.page_cap
    }

    /// Looks up the user's position on each beatmap of their own `kind`
    /// scores. Issues exactly one scoreboard lookup per returned score.
    pub async fn targeted(
        &self,
        username: &str,
        kind: &str,
        limit: u32,
        token: &str,
    ) -> Result<ScanReport, GatewayError> {
        let user = self.gateway.user(username, token).await?;
        let scores = self
            .gateway
            .user_scores(user.id, kind, limit, token)
            .await?;

        info!(
            "🎯 Targeted scan for {}: {} scoreboards",
            user.username,
            scores.len()
        );

        let user_id = user.id;
        let mut report = ScanReport::new(user);
        let outcomes: Vec<LookupOutcome> = stream::iter(scores)
            .map(|score| self.lookup(score.beatmap, user_id, token))
            .buffered(self.concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }
        Ok(report)
    }

    /// Walks up to `min(pages, page_cap)` ranked catalog pages. Reaching the
    /// cap or the end of the catalog is a normal finish.
    pub async fn exhaustive(
        &self,
        username: &str,
        pages: u32,
        token: &str,
    ) -> Result<ScanReport, GatewayError> {
        let user = self.gateway.user(username, token).await?;
        let user_id = user.id;
        let pages = pages.min(self.page_cap);
        let mut report = ScanReport::new(user);
        let mut visited = HashSet::new();
        let mut cursor: Option<String> = None;

        info!(
            "🌐 Exhaustive scan for {} over up to {} pages",
            report.user.username, pages
        );

        for page_number in 1..=pages {
            let page = match self.gateway.ranked_page(cursor.as_deref(), token).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("⚠️ Ranked page {} unavailable, stopping scan: {}", page_number, e);
                    report.truncated = true;
                    break;
                }
            };
            report.pages_scanned += 1;

            let beatmaps: Vec<ScoreBeatmap> = page
                .beatmaps
                .into_iter()
                .filter(|beatmap| visited.insert(beatmap.id))
                .collect();

            let outcomes: Vec<LookupOutcome> = stream::iter(beatmaps)
                .map(|beatmap| self.lookup(beatmap, user_id, token))
                .buffered(self.concurrency)
                .collect()
                .await;
            for outcome in outcomes {
                report.record(outcome);
            }

            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(
            "📊 Scan for {} finished: {} placements, {} lookups, {} skipped",
            report.user.username,
            report.placements.len(),
            report.lookups,
            report.skipped
        );
        Ok(report)
    }

    async fn lookup(&self, beatmap: ScoreBeatmap, user_id: u64, token: &str) -> LookupOutcome {
        match self
            .gateway
            .beatmap_scores(beatmap.id, "global", LOOKUP_DEPTH, token)
            .await
        {
            Ok(scores) => match first_row_for(scores, user_id) {
                Some(row) => LookupOutcome::Found(Placement {
                    beatmap,
                    position: row.position,
                    score: row.score,
                    accuracy: row.accuracy,
                    mods: row.mods,
                }),
                None => LookupOutcome::NotFound,
            },
            Err(e) => {
                debug!("⏭️ Skipping beatmap {}: {}", beatmap.id, e);
                LookupOutcome::LookupFailed(e)
            }
        }
    }
}

fn first_row_for(scores: Vec<BeatmapScore>, user_id: u64) -> Option<BeatmapScore> {
    scores.into_iter().find(|row| row.user.id == user_id)
}
