//! TF-IDF term weighting and the dense pairwise similarity matrix built from it.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;

use crate::{error::DatasetError, models::ItemId, services::stopwords};

/// Tokens of two or more word characters
static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("valid token pattern"));

/// Vectorizer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TfidfConfig {
    /// Keep at most this many terms, ranked by corpus frequency
    pub max_features: usize,
    /// Drop terms that occur in fewer documents than this
    pub min_df: usize,
    /// Smallest and largest n-gram length, inclusive
    pub ngram_range: (usize, usize),
}

impl Default for TfidfConfig {
    fn default() -> Self {
        Self {
            max_features: 5000,
            min_df: 2,
            ngram_range: (1, 2),
        }
    }
}

/// Sparse, L2-normalized term weights, one row per document
#[derive(Debug, Clone)]
pub struct TermWeights {
    /// Vocabulary in column order (alphabetical)
    pub vocabulary: Vec<String>,
    /// `(column, weight)` pairs sorted by column
    pub rows: Vec<Vec<(u32, f64)>>,
}

impl TermWeights {
    pub fn n_docs(&self) -> usize {
        self.rows.len()
    }
}

pub struct TfidfVectorizer {
    config: TfidfConfig,
    stop_words: HashSet<&'static str>,
}

impl TfidfVectorizer {
    pub fn new(config: TfidfConfig) -> Self {
        Self {
            config,
            stop_words: stopwords::english(),
        }
    }

    /// Splits a document into stop-word-free tokens and joins them into n-grams
    fn analyze(&self, doc: &str) -> Vec<String> {
        let tokens: Vec<&str> = TOKEN_PATTERN
            .find_iter(doc)
            .map(|m| m.as_str())
            .filter(|token| !self.stop_words.contains(token))
            .collect();

        let (min_n, max_n) = self.config.ngram_range;
        let mut terms = Vec::new();
        for n in min_n.max(1)..=max_n {
            if tokens.len() < n {
                break;
            }
            terms.extend(tokens.windows(n).map(|window| window.join(" ")));
        }
        terms
    }

    /// Learns the vocabulary and IDF from `docs` and returns their weight rows
    pub fn fit_transform(&self, docs: &[&str]) -> Result<TermWeights, DatasetError> {
        let counts: Vec<HashMap<String, u32>> = docs
            .par_iter()
            .map(|doc| {
                let mut counts = HashMap::new();
                for term in self.analyze(doc) {
                    *counts.entry(term).or_insert(0) += 1;
                }
                counts
            })
            .collect();

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        let mut total_freq: HashMap<&str, u64> = HashMap::new();
        for doc_counts in &counts {
            for (term, count) in doc_counts {
                *doc_freq.entry(term.as_str()).or_insert(0) += 1;
                *total_freq.entry(term.as_str()).or_insert(0) += u64::from(*count);
            }
        }

        let mut kept: Vec<(&str, u64)> = total_freq
            .into_iter()
            .filter(|(term, _)| doc_freq[term] >= self.config.min_df)
            .collect();
        if kept.is_empty() {
            return Err(DatasetError::EmptyVocabulary);
        }
        kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        kept.truncate(self.config.max_features);

        let mut vocabulary: Vec<String> = kept.into_iter().map(|(term, _)| term.to_string()).collect();
        vocabulary.sort();
        let columns: HashMap<&str, u32> = vocabulary
            .iter()
            .enumerate()
            .map(|(col, term)| (term.as_str(), col as u32))
            .collect();

        let n = docs.len() as f64;
        let idf: Vec<f64> = vocabulary
            .iter()
            .map(|term| ((1.0 + n) / (1.0 + doc_freq[term.as_str()] as f64)).ln() + 1.0)
            .collect();

        let rows = counts
            .par_iter()
            .map(|doc_counts| {
                let mut row: Vec<(u32, f64)> = doc_counts
                    .iter()
                    .filter_map(|(term, count)| {
                        let col = *columns.get(term.as_str())?;
                        Some((col, f64::from(*count) * idf[col as usize]))
                    })
                    .collect();
                row.sort_by_key(|(col, _)| *col);
                normalize(&mut row);
                row
            })
            .collect();

        Ok(TermWeights { vocabulary, rows })
    }
}

fn normalize(row: &mut [(u32, f64)]) {
    let norm = row.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for (_, w) in row.iter_mut() {
            *w /= norm;
        }
    }
}

/// Dense N×N matrix of pairwise cosine similarities
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    n: usize,
    values: Vec<f32>,
}

impl SimilarityIndex {
    /// Linear kernel of the weight matrix with itself
    ///
    /// Each row is accumulated through an inverted index over the shared
    /// terms in ascending column order, so `get(i, j)` and `get(j, i)` sum the
    /// same products in the same order and are bit-identical.
    pub fn from_weights(weights: &TermWeights) -> Self {
        let n = weights.n_docs();
        let mut postings: Vec<Vec<(usize, f64)>> = vec![Vec::new(); weights.vocabulary.len()];
        for (doc, row) in weights.rows.iter().enumerate() {
            for &(col, w) in row {
                postings[col as usize].push((doc, w));
            }
        }

        let mut values = vec![0.0f32; n * n];
        values
            .par_chunks_mut(n.max(1))
            .enumerate()
            .for_each(|(i, out)| {
                let mut acc = vec![0.0f64; n];
                for &(col, wi) in &weights.rows[i] {
                    for &(j, wj) in &postings[col as usize] {
                        acc[j] += wi * wj;
                    }
                }
                // self-similarity of a unit vector; a document with no terms stays 0
                acc[i] = if weights.rows[i].is_empty() { 0.0 } else { 1.0 };
                for (slot, value) in out.iter_mut().zip(acc) {
                    *slot = value as f32;
                }
            });

        Self { n, values }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, i: ItemId, j: ItemId) -> f32 {
        self.values[i.index() * self.n + j.index()]
    }

    pub fn row(&self, id: ItemId) -> &[f32] {
        let start = id.index() * self.n;
        &self.values[start..start + self.n]
    }

    /// Other items ordered by descending similarity to `id`
    ///
    /// Ties keep row order. `id` itself is left out.
    pub fn ranked(&self, id: ItemId) -> Vec<(ItemId, f32)> {
        let mut scores: Vec<(ItemId, f32)> = self
            .row(id)
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != id.index())
            .map(|(j, score)| (ItemId(j), *score))
            .collect();
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scores
    }
}
