/// Jikan (unofficial MyAnimeList) API provider
///
/// Title lookups hit `/anime?q=<title>&limit=1` and keep the first result.
use std::time::Duration;

use reqwest::Client as HttpClient;

use crate::{
    cache::LookupCache,
    error::{AppError, AppResult},
    models::{EnrichedAnime, JikanSearchResponse},
    services::providers::MetadataProvider,
};

#[derive(Clone)]
pub struct JikanProvider {
    http_client: HttpClient,
    api_url: String,
    cache: Option<LookupCache>,
}

impl JikanProvider {
    pub fn new(
        api_url: String,
        timeout: Duration,
        cache: Option<LookupCache>,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            cache,
        })
    }

    async fn fetch(&self, title: &str) -> AppResult<Option<EnrichedAnime>> {
        let url = format!("{}/anime", self.api_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[("q", title), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Jikan API returned status {}: {}",
                status, body
            )));
        }

        let search: JikanSearchResponse = response.json().await?;
        let found = search
            .data
            .into_iter()
            .next()
            .map(|anime| anime.into_enriched(title));

        tracing::debug!(
            query = %title,
            found = found.is_some(),
            provider = "jikan",
            "Title lookup completed"
        );

        Ok(found)
    }
}

#[async_trait::async_trait]
impl MetadataProvider for JikanProvider {
    async fn lookup(&self, title: &str) -> AppResult<Option<EnrichedAnime>> {
        if title.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Lookup title cannot be empty".to_string(),
            ));
        }

        let Some(cache) = &self.cache else {
            return self.fetch(title).await;
        };

        if let Some(entry) = cache.get(title).await {
            tracing::debug!(query = %title, found = entry.is_some(), "Lookup served from cache");
            return Ok(entry);
        }

        let entry = self.fetch(title).await?;
        cache.put(title, &entry);
        Ok(entry)
    }

    fn name(&self) -> &'static str {
        "jikan"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_redis_client;
    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    /// Serves a fake `/anime` endpoint on a random local port
    async fn spawn_fake_jikan() -> String {
        async fn search(Query(params): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
            let query = params.get("q").cloned().unwrap_or_default();
            match query.as_str() {
                "Cowboy Bebop" => (
                    StatusCode::OK,
                    Json(json!({
                        "data": [{
                            "mal_id": 1,
                            "title": "Cowboy Bebop",
                            "images": {"jpg": {"image_url": "https://cdn.example/1.jpg"}},
                            "score": 8.75
                        }]
                    })),
                ),
                "rate limited" => (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({"message": "slow down"})),
                ),
                _ => (StatusCode::OK, Json(json!({"data": []}))),
            }
        }

        let app = Router::new().route("/anime", get(search));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    async fn provider() -> JikanProvider {
        JikanProvider::new(spawn_fake_jikan().await, Duration::from_secs(5), None).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_returns_first_match() {
        let result = provider().await.lookup("Cowboy Bebop").await.unwrap();

        assert_eq!(
            result,
            Some(EnrichedAnime {
                title: "Cowboy Bebop".to_string(),
                image_url: Some("https://cdn.example/1.jpg".to_string()),
                score: Some(8.75),
                mal_id: Some(1),
            })
        );
    }

    #[tokio::test]
    async fn test_lookup_without_match_is_none() {
        let result = provider().await.lookup("Nothing Like This").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_error_status_is_external_api_error() {
        let result = provider().await.lookup("rate limited").await;
        assert!(matches!(result, Err(AppError::ExternalApi(_))));
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected() {
        let result = provider().await.lookup("   ").await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_redis_outage_falls_through_to_jikan() {
        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let (cache, writer) = LookupCache::new(client);
        let provider =
            JikanProvider::new(spawn_fake_jikan().await, Duration::from_secs(5), Some(cache))
                .unwrap();

        let found = provider.lookup("Cowboy Bebop").await.unwrap();
        assert_eq!(found.map(|anime| anime.mal_id), Some(Some(1)));
        assert_eq!(provider.lookup("Nothing Like This").await.unwrap(), None);

        writer.flush().await;
    }

    #[tokio::test]
    async fn test_unreachable_service_is_http_error() {
        let provider =
            JikanProvider::new("http://127.0.0.1:9".to_string(), Duration::from_secs(1), None)
                .unwrap();
        assert!(matches!(
            provider.lookup("Cowboy Bebop").await,
            Err(AppError::HttpClient(_))
        ));
    }
}
