//! Hybrid recommender: behavioral pairs first, text similarity after.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{DatasetError, RecommendError},
    models::{Anime, EnrichedAnime},
    services::{dataset::AnimeModel, enrichment::Enricher},
};

impl AnimeModel {
    /// Ranks titles related to `title`
    ///
    /// Co-occurrence partners come first in their recorded order, followed by
    /// the most textually similar items. The query title and repeats are
    /// skipped; the result is never padded past what the two sources offer.
    pub fn hybrid_recommend(&self, title: &str, top_n: usize) -> Result<Vec<String>, RecommendError> {
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(title);

        let mut recommendations: Vec<String> = Vec::new();
        for partner in self.cooccurrence.partners(title) {
            if seen.insert(partner.as_str()) {
                recommendations.push(partner.clone());
            }
        }

        let Some(&id) = self.title_index.get(title) else {
            if recommendations.is_empty() {
                return Err(RecommendError::NotFound(title.to_string()));
            }
            recommendations.truncate(top_n);
            return Ok(recommendations);
        };

        for (other, _) in self.similarity.ranked(id) {
            if recommendations.len() >= top_n {
                break;
            }
            let other_title = self.items[other.index()].title.as_str();
            if seen.insert(other_title) {
                recommendations.push(other_title.to_string());
            }
        }

        recommendations.truncate(top_n);
        Ok(recommendations)
    }

    /// Titles containing `keyword`, ignoring case
    ///
    /// Best scored first when the dataset has scores (unscored items last),
    /// corpus order otherwise.
    pub fn search(&self, keyword: &str, top_n: usize) -> Vec<String> {
        let needle = keyword.to_lowercase();
        let mut matches: Vec<&Anime> = self
            .items
            .iter()
            .filter(|anime| anime.title.to_lowercase().contains(&needle))
            .collect();

        if self.has_scores {
            matches.sort_by(|a, b| match (a.score, b.score) {
                (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        }

        matches
            .into_iter()
            .take(top_n)
            .map(|anime| anime.title.clone())
            .collect()
    }

    /// Items `[skip, skip + limit)` in corpus order
    pub fn paginate(&self, skip: usize, limit: usize) -> &[Anime] {
        let start = skip.min(self.items.len());
        let end = start.saturating_add(limit).min(self.items.len());
        &self.items[start..end]
    }
}

/// Model state as reported by the health endpoint
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModelStatus {
    Loading,
    Ready {
        items: usize,
        vocabulary: usize,
        cooccurrence_titles: usize,
        loaded_at: DateTime<Utc>,
    },
    Failed {
        reason: String,
    },
}

struct LoadedModel {
    model: AnimeModel,
    loaded_at: DateTime<Utc>,
}

/// Shared recommendation service
///
/// The model slot is written exactly once. Until it holds a built model every
/// operation reports "not ready"; a failed build keeps it that way for good.
pub struct RecommenderService {
    slot: OnceLock<Result<LoadedModel, String>>,
    enricher: Enricher,
    candidate_pool: usize,
}

impl RecommenderService {
    pub fn new(enricher: Enricher, candidate_pool: usize) -> Self {
        Self {
            slot: OnceLock::new(),
            enricher,
            candidate_pool,
        }
    }

    /// Stores the outcome of the model build; later calls are ignored
    pub fn install(&self, result: Result<AnimeModel, DatasetError>) {
        let entry = match result {
            Ok(model) => {
                tracing::info!(items = model.items.len(), "Recommender ready");
                Ok(LoadedModel {
                    model,
                    loaded_at: Utc::now(),
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "Recommendation model failed to load; serving unavailable");
                Err(e.to_string())
            }
        };

        if self.slot.set(entry).is_err() {
            tracing::warn!("Recommendation model already installed; ignoring rebuild");
        }
    }

    /// Marks the build as failed for reasons outside the loader, e.g. a panic
    pub fn mark_failed(&self, reason: String) {
        tracing::error!(reason = %reason, "Recommendation model build aborted");
        let _ = self.slot.set(Err(reason));
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.slot.get(), Some(Ok(_)))
    }

    pub fn status(&self) -> ModelStatus {
        match self.slot.get() {
            None => ModelStatus::Loading,
            Some(Ok(loaded)) => ModelStatus::Ready {
                items: loaded.model.items.len(),
                vocabulary: loaded.model.vocabulary_size,
                cooccurrence_titles: loaded.model.cooccurrence.len(),
                loaded_at: loaded.loaded_at,
            },
            Some(Err(reason)) => ModelStatus::Failed {
                reason: reason.clone(),
            },
        }
    }

    fn model(&self) -> Result<&AnimeModel, RecommendError> {
        match self.slot.get() {
            Some(Ok(loaded)) => Ok(&loaded.model),
            _ => Err(RecommendError::NotReady),
        }
    }

    pub fn hybrid_recommend(&self, title: &str, top_n: usize) -> Result<Vec<String>, RecommendError> {
        self.model()?.hybrid_recommend(title, top_n)
    }

    /// Matching titles; empty when nothing matches or the model is not ready
    pub fn search(&self, keyword: &str, top_n: usize) -> Vec<String> {
        self.model()
            .map(|model| model.search(keyword, top_n))
            .unwrap_or_default()
    }

    /// A page of items; empty when out of range or the model is not ready
    pub fn paginate(&self, skip: usize, limit: usize) -> Vec<Anime> {
        self.model()
            .map(|model| model.paginate(skip, limit).to_vec())
            .unwrap_or_default()
    }

    /// Hybrid candidates for `title`, enriched with external metadata
    ///
    /// An empty list means no candidate could be enriched; an unknown title
    /// is `NotFound`.
    pub async fn recommend_enriched(
        &self,
        title: &str,
        top_n: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<EnrichedAnime>, RecommendError> {
        let candidates = self.hybrid_recommend(title, self.candidate_pool)?;

        tracing::debug!(
            title = %title,
            candidates = candidates.len(),
            "Enriching hybrid recommendations"
        );

        Ok(self.enricher.enrich(&candidates, top_n, cancel).await)
    }
}
