/// External anime metadata providers
///
/// A provider answers a free-text title query with the best matching record,
/// or `None` when nothing matches. The enrichment gateway treats errors and
/// misses alike.
use crate::{error::AppResult, models::EnrichedAnime};

pub mod jikan;

pub use jikan::JikanProvider;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Looks up the best match for `title`
    async fn lookup(&self, title: &str) -> AppResult<Option<EnrichedAnime>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
