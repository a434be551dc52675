use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult, RecommendError},
    middleware::request_id::RequestId,
    models::{AnimeResponse, EnrichedAnime},
    services::ModelStatus,
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub skip: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub keyword: String,
    pub top_n: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub title: String,
    pub top_n: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: ModelStatus,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub titles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<EnrichedAnime>,
}

fn ensure_ready(state: &AppState) -> AppResult<()> {
    if state.recommender.is_ready() {
        Ok(())
    } else {
        Err(RecommendError::NotReady.into())
    }
}

// Handlers

/// Liveness plus model build state
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            model: state.recommender.status(),
        }),
    )
}

/// One page of the catalog in dataset order
pub async fn list_animes(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Vec<AnimeResponse>>> {
    ensure_ready(&state)?;

    let animes = state
        .recommender
        .paginate(page.skip, page.limit.unwrap_or(state.defaults.page_limit))
        .iter()
        .map(AnimeResponse::from)
        .collect();

    Ok(Json(animes))
}

/// Title search by keyword
pub async fn search_animes(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<SearchResponse>> {
    ensure_ready(&state)?;

    let titles = state
        .recommender
        .search(&params.keyword, params.top_n.unwrap_or(state.defaults.top_n));

    if titles.is_empty() {
        return Err(AppError::NotFound(format!(
            "No titles match '{}'",
            params.keyword
        )));
    }

    Ok(Json(SearchResponse { titles }))
}

/// Hybrid recommendations enriched with external metadata
pub async fn recommend_animes(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<RecommendQuery>,
) -> AppResult<Json<RecommendationsResponse>> {
    ensure_ready(&state)?;

    tracing::info!(
        request_id = %request_id,
        title = %params.title,
        "Processing recommendation request"
    );

    let cancel = state.shutdown.child_token();
    let recommendations = state
        .recommender
        .recommend_enriched(
            &params.title,
            params.top_n.unwrap_or(state.defaults.top_n),
            &cancel,
        )
        .await?;

    if recommendations.is_empty() {
        return Err(AppError::NotFound(format!(
            "No recommendations available for '{}'",
            params.title
        )));
    }

    tracing::info!(
        request_id = %request_id,
        count = recommendations.len(),
        "Recommendations served"
    );

    Ok(Json(RecommendationsResponse { recommendations }))
}
