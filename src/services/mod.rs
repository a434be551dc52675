pub mod cooccurrence;
pub mod dataset;
pub mod enrichment;
pub mod providers;
pub mod recommender;
pub mod similarity;
pub mod stopwords;

pub use dataset::{load_model, AnimeModel, DatasetConfig};
pub use enrichment::Enricher;
pub use recommender::{ModelStatus, RecommenderService};
