use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use super::models::{RawBeatmap, RawBeatmapScores, RawScore, RawSearchResponse, RawUser};
use super::normalize::{
    self, Beatmap, BeatmapScore, RankedPage, SearchPage, UserProfile, UserScore, UserSummary,
};
use super::{ApiRequest, GatewayError, OsuApi};

/// Typed osu! API operations.
///
/// Each operation performs one upstream call and returns the normalized
/// shape; raw payloads never leave this type.
#[derive(Clone)]
pub struct Gateway {
    api: Arc<dyn OsuApi>,
}

impl Gateway {
    pub fn new(api: Arc<dyn OsuApi>) -> Self {
        Self { api }
    }

    pub async fn beatmap(&self, id: u64, token: &str) -> Result<Beatmap, GatewayError> {
        let request = ApiRequest::get(["beatmaps".to_string(), id.to_string()], token);
        let raw: RawBeatmap = self.fetch(request).await?;
        Ok(normalize::beatmap(raw))
    }

    /// Ranked osu!standard beatmapsets matching `query`.
    pub async fn search(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
        token: &str,
    ) -> Result<SearchPage, GatewayError> {
        let request = ApiRequest::get(["beatmapsets", "search"], token)
            .param("q", query)
            .param("m", 0)
            .param("s", "ranked")
            .param("limit", limit)
            .param("offset", offset);
        let raw: RawSearchResponse = self.fetch(request).await?;
        Ok(normalize::search_page(raw, limit, offset))
    }

    /// One page of the ranked catalog, continuing from `cursor`.
    pub async fn ranked_page(
        &self,
        cursor: Option<&str>,
        token: &str,
    ) -> Result<RankedPage, GatewayError> {
        let mut request = ApiRequest::get(["beatmapsets", "search"], token)
            .param("m", 0)
            .param("s", "ranked");
        if let Some(cursor) = cursor {
            request = request.param("cursor_string", cursor);
        }
        let raw: RawSearchResponse = self.fetch(request).await?;
        Ok(normalize::ranked_page(raw))
    }

    pub async fn beatmap_scores(
        &self,
        id: u64,
        kind: &str,
        limit: u32,
        token: &str,
    ) -> Result<Vec<BeatmapScore>, GatewayError> {
        let request = ApiRequest::get(
            ["beatmaps".to_string(), id.to_string(), "scores".to_string()],
            token,
        )
        .param("type", kind)
        .param("limit", limit);
        let raw: RawBeatmapScores = self.fetch(request).await?;
        Ok(normalize::beatmap_scores(raw.scores))
    }

    pub async fn user(&self, username: &str, token: &str) -> Result<UserSummary, GatewayError> {
        let request = ApiRequest::get(["users", username, "osu"], token);
        let raw: RawUser = self.fetch(request).await?;
        Ok(normalize::user_summary(&raw))
    }

    pub async fn user_scores(
        &self,
        user_id: u64,
        kind: &str,
        limit: u32,
        token: &str,
    ) -> Result<Vec<UserScore>, GatewayError> {
        let request = ApiRequest::get(
            [
                "users".to_string(),
                user_id.to_string(),
                "scores".to_string(),
                kind.to_string(),
            ],
            token,
        )
        .param("limit", limit)
        .param("mode", "osu");
        let raw: Vec<RawScore> = self.fetch(request).await?;
        Ok(normalize::user_scores(raw))
    }

    /// The profile of the user owning `token`.
    pub async fn me(&self, token: &str) -> Result<UserProfile, GatewayError> {
        let raw: RawUser = self.fetch(ApiRequest::get(["me"], token)).await?;
        Ok(normalize::user_profile(raw))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, GatewayError> {
        let body = self.api.call(request).await?;
        decode(body)
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, GatewayError> {
    serde_json::from_value(body).map_err(|e| GatewayError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osu::{fixtures, MockOsuApi};
    use mockall::predicate::eq;
    use serde_json::json;

    #[tokio::test]
    async fn beatmap_requests_by_id_and_normalizes() {
        let mut api = MockOsuApi::new();
        api.expect_call()
            .with(eq(ApiRequest::get(["beatmaps", "75"], "tok")))
            .times(1)
            .returning(|_| Ok(fixtures::beatmap(75, 1)));

        let gateway = Gateway::new(Arc::new(api));
        let beatmap = gateway.beatmap(75, "tok").await.expect("beatmap");

        assert_eq!(beatmap.id, 75);
        assert_eq!(beatmap.length.formatted, "2:22");
    }

    #[tokio::test]
    async fn errors_pass_through_unchanged() {
        let mut api = MockOsuApi::new();
        api.expect_call()
            .returning(|_| Err(GatewayError::RateLimited { retry_after: None }));

        let gateway = Gateway::new(Arc::new(api));
        let result = gateway.user("nobody", "tok").await;

        assert_eq!(result, Err(GatewayError::RateLimited { retry_after: None }));
    }

    #[tokio::test]
    async fn unexpected_shape_is_malformed() {
        let mut api = MockOsuApi::new();
        api.expect_call().returning(|_| Ok(json!({ "unexpected": true })));

        let gateway = Gateway::new(Arc::new(api));
        assert!(matches!(
            gateway.beatmap(1, "tok").await,
            Err(GatewayError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn ranked_page_forwards_cursor() {
        let mut api = MockOsuApi::new();
        api.expect_call()
            .withf(|request| {
                request
                    .params
                    .contains(&("cursor_string".to_string(), "abc".to_string()))
            })
            .times(1)
            .returning(|_| Ok(fixtures::search(&[(1, &[10])], None, 1)));

        let gateway = Gateway::new(Arc::new(api));
        let page = gateway.ranked_page(Some("abc"), "tok").await.expect("page");

        assert_eq!(page.beatmaps.len(), 1);
        assert_eq!(page.cursor, None);
    }
}
