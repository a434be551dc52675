use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Position of an item in the loaded corpus
///
/// Assigned densely (0..N) at load time. The similarity matrix and the title
/// index refer to items only through this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub usize);

impl ItemId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One anime row from the metadata dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Anime {
    pub id: ItemId,
    /// Identifier from the source dataset, if the cell held an integer
    pub anime_id: Option<i64>,
    pub title: String,
    pub synopsis: String,
    /// Pipe-delimited genre list, as authored
    pub genres: String,
    pub image_url: String,
    pub score: Option<f64>,
    /// Lower-cased synopsis and genres, the text the similarity index is built from
    pub soup: String,
}

/// Anime record returned to API clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnimeResponse {
    pub anime_id: Option<i64>,
    pub title: String,
    pub genres: String,
    pub image_url: String,
    pub score: Option<f64>,
}

impl From<&Anime> for AnimeResponse {
    fn from(anime: &Anime) -> Self {
        Self {
            anime_id: anime.anime_id,
            title: anime.title.clone(),
            genres: anime.genres.clone(),
            image_url: anime.image_url.clone(),
            score: anime.score,
        }
    }
}

/// Display metadata fetched from the external lookup service for one recommendation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedAnime {
    pub title: String,
    pub image_url: Option<String>,
    pub score: Option<f64>,
    pub mal_id: Option<i64>,
}

// ============================================================================
// Jikan API Types
// ============================================================================

/// Raw response of Jikan's `/anime` search endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct JikanSearchResponse {
    #[serde(default)]
    pub data: Vec<JikanAnime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JikanAnime {
    #[serde(default)]
    pub mal_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub images: Option<JikanImages>,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JikanImages {
    #[serde(default)]
    pub jpg: Option<JikanImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JikanImage {
    #[serde(default)]
    pub image_url: Option<String>,
}

impl JikanAnime {
    /// Converts the best match into an enrichment record
    ///
    /// Falls back to the queried title when Jikan omits the canonical one.
    pub fn into_enriched(self, queried_title: &str) -> EnrichedAnime {
        EnrichedAnime {
            title: self.title.unwrap_or_else(|| queried_title.to_string()),
            image_url: self.images.and_then(|i| i.jpg).and_then(|jpg| jpg.image_url),
            score: self.score,
            mal_id: self.mal_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jikan_search_deserialization() {
        let json = r#"{
            "pagination": {"last_visible_page": 1, "has_next_page": false},
            "data": [{
                "mal_id": 5114,
                "title": "Fullmetal Alchemist: Brotherhood",
                "images": {"jpg": {"image_url": "https://cdn.myanimelist.net/images/anime/1208/94745.jpg"}},
                "score": 9.1
            }]
        }"#;

        let response: JikanSearchResponse = serde_json::from_str(json).unwrap();
        let enriched = response
            .data
            .into_iter()
            .next()
            .unwrap()
            .into_enriched("fullmetal");

        assert_eq!(enriched.title, "Fullmetal Alchemist: Brotherhood");
        assert_eq!(enriched.mal_id, Some(5114));
        assert_eq!(enriched.score, Some(9.1));
        assert_eq!(
            enriched.image_url.as_deref(),
            Some("https://cdn.myanimelist.net/images/anime/1208/94745.jpg")
        );
    }

    #[test]
    fn test_jikan_missing_fields_fall_back() {
        let json = r#"{"data": [{"mal_id": 1, "score": null}]}"#;
        let response: JikanSearchResponse = serde_json::from_str(json).unwrap();
        let enriched = response.data[0].clone().into_enriched("Cowboy Bebop");

        assert_eq!(enriched.title, "Cowboy Bebop");
        assert_eq!(enriched.image_url, None);
        assert_eq!(enriched.score, None);
    }

    #[test]
    fn test_anime_response_omits_text_fields() {
        let anime = Anime {
            id: ItemId(0),
            anime_id: Some(1),
            title: "Cowboy Bebop".to_string(),
            synopsis: "Bounty hunters in space".to_string(),
            genres: "Action|Sci-Fi".to_string(),
            image_url: "../images/no_img.png".to_string(),
            score: Some(8.75),
            soup: "bounty hunters in space action sci-fi".to_string(),
        };

        let json = serde_json::to_value(AnimeResponse::from(&anime)).unwrap();
        assert_eq!(json["title"], "Cowboy Bebop");
        assert_eq!(json["anime_id"], 1);
        assert!(json.get("synopsis").is_none());
        assert!(json.get("soup").is_none());
    }
}
