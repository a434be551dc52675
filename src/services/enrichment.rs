use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{models::EnrichedAnime, services::providers::MetadataProvider};

/// Pause between successive external lookups, to stay under the rate limit
pub const DEFAULT_ENRICHMENT_DELAY: Duration = Duration::from_millis(500);

/// Fetches display metadata for recommendation candidates, one at a time
#[derive(Clone)]
pub struct Enricher {
    provider: Arc<dyn MetadataProvider>,
    delay: Duration,
}

impl Enricher {
    pub fn new(provider: Arc<dyn MetadataProvider>, delay: Duration) -> Self {
        Self { provider, delay }
    }

    /// Enriches `candidates` in order until `top_n` records are collected
    ///
    /// Lookups run strictly one after another with `delay` between them and
    /// none before the first. A candidate whose lookup fails or finds nothing
    /// is left out. Cancelling `cancel` stops further lookups and returns what
    /// was collected so far.
    pub async fn enrich(
        &self,
        candidates: &[String],
        top_n: usize,
        cancel: &CancellationToken,
    ) -> Vec<EnrichedAnime> {
        let mut enriched = Vec::with_capacity(top_n.min(candidates.len()));
        if top_n == 0 {
            return enriched;
        }

        let mut attempted = 0usize;
        for (i, title) in candidates.iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }

            attempted += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.provider.lookup(title) => result,
            };

            match result {
                Ok(Some(record)) => enriched.push(record),
                Ok(None) => {
                    tracing::warn!(
                        title = %title,
                        provider = self.provider.name(),
                        "No external match for recommendation"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        title = %title,
                        provider = self.provider.name(),
                        error = %e,
                        "External lookup failed; skipping recommendation"
                    );
                }
            }

            if enriched.len() >= top_n {
                break;
            }
        }

        if cancel.is_cancelled() {
            tracing::info!(
                enriched = enriched.len(),
                attempted,
                "Enrichment cancelled; returning partial results"
            );
        } else {
            tracing::info!(
                enriched = enriched.len(),
                attempted,
                candidates = candidates.len(),
                "Enrichment completed"
            );
        }

        enriched
    }
}
