//! Builds the in-memory recommendation model from the two CSV datasets.
//!
//! Metadata problems are fatal to the model. A missing or broken pair file
//! only costs the behavioral signal.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use csv::{ReaderBuilder, StringRecord};

use crate::{
    error::DatasetError,
    models::{Anime, ItemId},
    services::{
        cooccurrence::CoOccurrenceMap,
        similarity::{SimilarityIndex, TfidfConfig, TfidfVectorizer},
    },
};

/// Column names of the metadata table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataColumns {
    pub id: String,
    pub title: String,
    pub synopsis: String,
    pub genres: String,
    pub image_url: String,
    pub score: String,
}

impl Default for MetadataColumns {
    fn default() -> Self {
        Self {
            id: "anime_id".to_string(),
            title: "Name".to_string(),
            synopsis: "Synopsis".to_string(),
            genres: "Genres".to_string(),
            image_url: "Image URL".to_string(),
            score: "Score".to_string(),
        }
    }
}

/// Column names of the title pair table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairColumns {
    pub first: String,
    pub second: String,
}

impl Default for PairColumns {
    fn default() -> Self {
        Self {
            first: "Anime_1_Title".to_string(),
            second: "Anime_2_Title".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub metadata_path: PathBuf,
    pub cooccurrence_path: PathBuf,
    pub placeholder_image_url: String,
    pub metadata_columns: MetadataColumns,
    pub pair_columns: PairColumns,
}

/// Everything the recommender reads at request time
#[derive(Debug)]
pub struct AnimeModel {
    pub items: Vec<Anime>,
    pub similarity: SimilarityIndex,
    /// First row seen for each title
    pub title_index: HashMap<String, ItemId>,
    pub cooccurrence: CoOccurrenceMap,
    pub vocabulary_size: usize,
    /// Whether the metadata carried a score column
    pub has_scores: bool,
}

/// Metadata rows that survived cleaning
#[derive(Debug)]
pub struct Metadata {
    pub items: Vec<Anime>,
    pub has_scores: bool,
}

impl AnimeModel {
    /// Vectorizes the items and assembles the model
    pub fn build(metadata: Metadata, cooccurrence: CoOccurrenceMap) -> Result<Self, DatasetError> {
        let Metadata { items, has_scores } = metadata;

        let docs: Vec<&str> = items.iter().map(|anime| anime.soup.as_str()).collect();
        let weights = TfidfVectorizer::new(TfidfConfig::default()).fit_transform(&docs)?;
        let similarity = SimilarityIndex::from_weights(&weights);

        let mut title_index = HashMap::with_capacity(items.len());
        for anime in &items {
            title_index.entry(anime.title.clone()).or_insert(anime.id);
        }
        if title_index.len() < items.len() {
            tracing::warn!(
                duplicates = items.len() - title_index.len(),
                "Duplicate titles found; only the first row of each is reachable by title"
            );
        }

        Ok(Self {
            items,
            similarity,
            title_index,
            cooccurrence,
            vocabulary_size: weights.vocabulary.len(),
            has_scores,
        })
    }
}

/// Loads both datasets and builds the model
pub fn load_model(config: &DatasetConfig) -> Result<AnimeModel, DatasetError> {
    let started = Instant::now();

    let metadata = read_metadata(
        &config.metadata_path,
        &config.metadata_columns,
        &config.placeholder_image_url,
    )?;

    let cooccurrence = match read_pairs(&config.cooccurrence_path, &config.pair_columns) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Co-occurrence data unavailable; recommendations will be content-only"
            );
            CoOccurrenceMap::default()
        }
    };

    let model = AnimeModel::build(metadata, cooccurrence)?;

    tracing::info!(
        items = model.items.len(),
        vocabulary = model.vocabulary_size,
        cooccurrence_titles = model.cooccurrence.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Recommendation model built"
    );

    Ok(model)
}

pub fn read_metadata(
    path: &Path,
    columns: &MetadataColumns,
    placeholder_image_url: &str,
) -> Result<Metadata, DatasetError> {
    let source = path.display().to_string();
    let reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_error(&source, e))?;
    parse_metadata(reader, &source, columns, placeholder_image_url)
}

pub fn parse_metadata<R: Read>(
    mut reader: csv::Reader<R>,
    source: &str,
    columns: &MetadataColumns,
    placeholder_image_url: &str,
) -> Result<Metadata, DatasetError> {
    let headers = reader.headers().map_err(|e| csv_error(source, e))?.clone();

    let title_col = require_column(&headers, &columns.title, source)?;
    let synopsis_col = require_column(&headers, &columns.synopsis, source)?;
    let genres_col = require_column(&headers, &columns.genres, source)?;
    let id_col = find_column(&headers, &columns.id);
    let image_col = find_column(&headers, &columns.image_url);
    let score_col = find_column(&headers, &columns.score);

    let mut items = Vec::new();
    let mut dropped = 0usize;

    for record in reader.records() {
        let record = record.map_err(|e| csv_error(source, e))?;

        let (Some(title), Some(synopsis), Some(genres)) = (
            cell(&record, Some(title_col)),
            cell(&record, Some(synopsis_col)),
            cell(&record, Some(genres_col)),
        ) else {
            dropped += 1;
            continue;
        };

        let soup = format!("{} {}", synopsis, genres)
            .to_lowercase()
            .replace('|', " ");

        items.push(Anime {
            id: ItemId(items.len()),
            anime_id: cell(&record, id_col).and_then(|v| v.trim().parse().ok()),
            title: title.to_string(),
            synopsis: synopsis.to_string(),
            genres: genres.to_string(),
            image_url: cell(&record, image_col)
                .unwrap_or(placeholder_image_url)
                .to_string(),
            score: cell(&record, score_col).and_then(|v| v.trim().parse().ok()),
            soup,
        });
    }

    tracing::info!(
        source = %source,
        kept = items.len(),
        dropped,
        "Metadata loaded"
    );

    if items.is_empty() {
        return Err(DatasetError::EmptyCorpus(source.to_string()));
    }

    Ok(Metadata {
        items,
        has_scores: score_col.is_some(),
    })
}

pub fn read_pairs(path: &Path, columns: &PairColumns) -> Result<CoOccurrenceMap, DatasetError> {
    let source = path.display().to_string();
    let reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_error(&source, e))?;
    parse_pairs(reader, &source, columns)
}

pub fn parse_pairs<R: Read>(
    mut reader: csv::Reader<R>,
    source: &str,
    columns: &PairColumns,
) -> Result<CoOccurrenceMap, DatasetError> {
    let headers = reader.headers().map_err(|e| csv_error(source, e))?.clone();
    let first_col = require_column(&headers, &columns.first, source)?;
    let second_col = require_column(&headers, &columns.second, source)?;

    let mut pairs = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(source, e))?;
        if let (Some(first), Some(second)) = (
            cell(&record, Some(first_col)),
            cell(&record, Some(second_col)),
        ) {
            pairs.push((first.to_string(), second.to_string()));
        }
    }

    let map = CoOccurrenceMap::from_pairs(pairs);
    tracing::info!(source = %source, titles = map.len(), "Co-occurrence map loaded");
    Ok(map)
}

fn csv_error(source: &str, e: csv::Error) -> DatasetError {
    DatasetError::Csv {
        path: source.to_string(),
        source: e,
    }
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn require_column(headers: &StringRecord, name: &str, source: &str) -> Result<usize, DatasetError> {
    find_column(headers, name).ok_or_else(|| DatasetError::MissingColumn {
        column: name.to_string(),
        path: source.to_string(),
    })
}

/// Non-empty cell value; absent and empty cells both count as missing
fn cell(record: &StringRecord, col: Option<usize>) -> Option<&str> {
    col.and_then(|c| record.get(c)).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const METADATA: &str = "\
anime_id,Name,Synopsis,Genres,Image URL,Score
1,Robot Wars,Giant robots fight,Action|Sci-Fi,https://img/1.jpg,7.5
2,Robot Wars II,Giant robots fight again,Action|Sci-Fi,,UNKNOWN
3,No Synopsis,,Drama,https://img/3.jpg,6.0
4,Love Story,\"A romance, with drama\",Romance|Drama,https://img/4.jpg,8.1
5,Love Story Again,A romance drama,Romance|Drama,https://img/5.jpg,
";

    const PAIRS: &str = "\
Anime_1_Title,Anime_2_Title
Robot Wars,Love Story
Robot Wars,Robot Wars II
Robot Wars,Love Story
Love Story,
";

    fn metadata_reader(data: &str) -> csv::Reader<&[u8]> {
        ReaderBuilder::new().flexible(true).from_reader(data.as_bytes())
    }

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn parse(data: &str) -> Result<Metadata, DatasetError> {
        parse_metadata(
            metadata_reader(data),
            "memory",
            &MetadataColumns::default(),
            "../images/no_img.png",
        )
    }

    #[test]
    fn test_rows_missing_required_fields_are_dropped() {
        let metadata = parse(METADATA).unwrap();
        let titles: Vec<&str> = metadata.items.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Robot Wars", "Robot Wars II", "Love Story", "Love Story Again"]
        );
    }

    #[test]
    fn test_ids_are_dense_after_dropping() {
        let metadata = parse(METADATA).unwrap();
        for (position, anime) in metadata.items.iter().enumerate() {
            assert_eq!(anime.id, ItemId(position));
        }
        assert_eq!(metadata.items[2].anime_id, Some(4));
    }

    #[test]
    fn test_missing_image_gets_placeholder() {
        let metadata = parse(METADATA).unwrap();
        assert_eq!(metadata.items[0].image_url, "https://img/1.jpg");
        assert_eq!(metadata.items[1].image_url, "../images/no_img.png");
    }

    #[test]
    fn test_soup_is_lowercased_with_genre_pipes_split() {
        let metadata = parse(METADATA).unwrap();
        assert_eq!(metadata.items[0].soup, "giant robots fight action sci-fi");
        assert_eq!(metadata.items[0].genres, "Action|Sci-Fi");
    }

    #[test]
    fn test_unparsable_scores_are_absent() {
        let metadata = parse(METADATA).unwrap();
        assert!(metadata.has_scores);
        assert_eq!(metadata.items[0].score, Some(7.5));
        assert_eq!(metadata.items[1].score, None);
        assert_eq!(metadata.items[3].score, None);
    }

    #[test]
    fn test_missing_score_column() {
        let metadata = parse("Name,Synopsis,Genres\nA,robots fight,Action\n").unwrap();
        assert!(!metadata.has_scores);
        assert_eq!(metadata.items[0].anime_id, None);
        assert_eq!(metadata.items[0].image_url, "../images/no_img.png");
    }

    #[test]
    fn test_missing_synopsis_column_is_fatal() {
        let result = parse("anime_id,Name,Genres\n1,A,Action\n");
        assert!(matches!(
            result,
            Err(DatasetError::MissingColumn { ref column, .. }) if column == "Synopsis"
        ));
    }

    #[test]
    fn test_all_rows_dropped_is_fatal() {
        let result = parse("Name,Synopsis,Genres\nA,,Action\nB,text,\n");
        assert!(matches!(result, Err(DatasetError::EmptyCorpus(_))));
    }

    #[test]
    fn test_pairs_skip_blank_cells_and_dedupe() {
        let map = parse_pairs(metadata_reader(PAIRS), "memory", &PairColumns::default()).unwrap();
        assert_eq!(map.partners("Robot Wars"), ["Love Story", "Robot Wars II"]);
        assert!(map.partners("Love Story").is_empty());
    }

    #[test]
    fn test_load_model_from_files() {
        let metadata = write_temp(METADATA);
        let pairs = write_temp(PAIRS);
        let config = DatasetConfig {
            metadata_path: metadata.path().to_path_buf(),
            cooccurrence_path: pairs.path().to_path_buf(),
            placeholder_image_url: "../images/no_img.png".to_string(),
            metadata_columns: MetadataColumns::default(),
            pair_columns: PairColumns::default(),
        };

        let model = load_model(&config).unwrap();
        assert_eq!(model.items.len(), 4);
        assert_eq!(model.similarity.len(), 4);
        assert_eq!(model.title_index["Love Story"], ItemId(2));
        assert_eq!(model.cooccurrence.len(), 1);
    }

    #[test]
    fn test_missing_pair_file_degrades_to_empty_map() {
        let metadata = write_temp(METADATA);
        let config = DatasetConfig {
            metadata_path: metadata.path().to_path_buf(),
            cooccurrence_path: PathBuf::from("/nonexistent/pairs.csv"),
            placeholder_image_url: "../images/no_img.png".to_string(),
            metadata_columns: MetadataColumns::default(),
            pair_columns: PairColumns::default(),
        };

        let model = load_model(&config).unwrap();
        assert!(model.cooccurrence.is_empty());
        assert_eq!(model.items.len(), 4);
    }

    #[test]
    fn test_missing_metadata_file_is_fatal() {
        let config = DatasetConfig {
            metadata_path: PathBuf::from("/nonexistent/anime.csv"),
            cooccurrence_path: PathBuf::from("/nonexistent/pairs.csv"),
            placeholder_image_url: String::new(),
            metadata_columns: MetadataColumns::default(),
            pair_columns: PairColumns::default(),
        };

        assert!(matches!(load_model(&config), Err(DatasetError::Csv { .. })));
    }

    #[test]
    fn test_duplicate_titles_keep_first_row() {
        let metadata = parse(
            "Name,Synopsis,Genres\nTwin,robots fight,Action\nTwin,robots fight,Action\n",
        )
        .unwrap();
        let model = AnimeModel::build(metadata, CoOccurrenceMap::default()).unwrap();
        assert_eq!(model.items.len(), 2);
        assert_eq!(model.title_index.len(), 1);
        assert_eq!(model.title_index["Twin"], ItemId(0));
    }
}
