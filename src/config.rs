use std::time::Duration;

use serde::Deserialize;

use crate::{
    api::RequestDefaults,
    services::dataset::{DatasetConfig, MetadataColumns, PairColumns},
};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Comma-separated list of origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,

    /// Path to the anime metadata CSV
    #[serde(default = "default_metadata_path")]
    pub metadata_path: String,

    /// Path to the title pair (co-occurrence) CSV
    #[serde(default = "default_cooccurrence_path")]
    pub cooccurrence_path: String,

    /// Image URL used when a row has none
    #[serde(default = "default_placeholder_image_url")]
    pub placeholder_image_url: String,

    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_title_column")]
    pub title_column: String,
    #[serde(default = "default_synopsis_column")]
    pub synopsis_column: String,
    #[serde(default = "default_genres_column")]
    pub genres_column: String,
    #[serde(default = "default_image_column")]
    pub image_column: String,
    #[serde(default = "default_score_column")]
    pub score_column: String,
    #[serde(default = "default_pair_first_column")]
    pub pair_first_column: String,
    #[serde(default = "default_pair_second_column")]
    pub pair_second_column: String,

    /// Jikan API base URL
    #[serde(default = "default_jikan_api_url")]
    pub jikan_api_url: String,

    /// Timeout for a single Jikan request, in seconds
    #[serde(default = "default_jikan_timeout_secs")]
    pub jikan_timeout_secs: u64,

    /// Pause between successive Jikan requests, in milliseconds
    #[serde(default = "default_enrichment_delay_ms")]
    pub enrichment_delay_ms: u64,

    /// Number of hybrid candidates handed to enrichment
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,

    /// `top_n` used by search and recommend when the query omits it
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,

    /// Page size used by the catalog listing when the query omits `limit`
    #[serde(default = "default_page_limit")]
    pub default_page_limit: usize,

    /// Optional Redis URL; lookups are not cached when unset
    #[serde(default)]
    pub redis_url: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> String {
    "http://localhost:3000".to_string()
}

fn default_metadata_path() -> String {
    "../csv/anime-dataset-2023.csv".to_string()
}

fn default_cooccurrence_path() -> String {
    "../csv/recommend_anime_5000.csv".to_string()
}

fn default_placeholder_image_url() -> String {
    "../images/no_img.png".to_string()
}

fn default_id_column() -> String {
    "anime_id".to_string()
}

fn default_title_column() -> String {
    "Name".to_string()
}

fn default_synopsis_column() -> String {
    "Synopsis".to_string()
}

fn default_genres_column() -> String {
    "Genres".to_string()
}

fn default_image_column() -> String {
    "Image URL".to_string()
}

fn default_score_column() -> String {
    "Score".to_string()
}

fn default_pair_first_column() -> String {
    "Anime_1_Title".to_string()
}

fn default_pair_second_column() -> String {
    "Anime_2_Title".to_string()
}

fn default_jikan_api_url() -> String {
    "https://api.jikan.moe/v4".to_string()
}

fn default_jikan_timeout_secs() -> u64 {
    10
}

fn default_enrichment_delay_ms() -> u64 {
    500
}

fn default_candidate_pool() -> usize {
    20
}

fn default_top_n() -> usize {
    10
}

fn default_page_limit() -> usize {
    20
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Dataset locations and column names for the model loader
    pub fn dataset(&self) -> DatasetConfig {
        DatasetConfig {
            metadata_path: self.metadata_path.clone().into(),
            cooccurrence_path: self.cooccurrence_path.clone().into(),
            placeholder_image_url: self.placeholder_image_url.clone(),
            metadata_columns: MetadataColumns {
                id: self.id_column.clone(),
                title: self.title_column.clone(),
                synopsis: self.synopsis_column.clone(),
                genres: self.genres_column.clone(),
                image_url: self.image_column.clone(),
                score: self.score_column.clone(),
            },
            pair_columns: PairColumns {
                first: self.pair_first_column.clone(),
                second: self.pair_second_column.clone(),
            },
        }
    }

    pub fn jikan_timeout(&self) -> Duration {
        Duration::from_secs(self.jikan_timeout_secs)
    }

    pub fn enrichment_delay(&self) -> Duration {
        Duration::from_millis(self.enrichment_delay_ms)
    }

    pub fn request_defaults(&self) -> RequestDefaults {
        RequestDefaults {
            top_n: self.default_top_n,
            page_limit: self.default_page_limit,
        }
    }

    /// CORS origins split on commas, blanks removed
    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}
