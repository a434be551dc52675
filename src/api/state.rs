use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::services::RecommenderService;

/// Values used when a request leaves `top_n` or `limit` out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDefaults {
    pub top_n: usize,
    pub page_limit: usize,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            top_n: 10,
            page_limit: 20,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<RecommenderService>,
    pub defaults: RequestDefaults,
    /// Cancelled on shutdown so in-flight enrichments return early
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(recommender: Arc<RecommenderService>) -> Self {
        Self {
            recommender,
            defaults: RequestDefaults::default(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_defaults(mut self, defaults: RequestDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}
