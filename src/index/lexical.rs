//! Lexical (sparse) index.
//!
//! A TF-IDF model fitted over the whole corpus plus the resulting document × term
//! weight matrix. The model is refitted from scratch whenever the corpus grows;
//! there is no incremental update.
//!
//! Weighting: raw term counts, smoothed idf `ln((1 + n) / (1 + df)) + 1`, rows
//! scaled to unit L2 norm. Query scores are dot products against every row.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::top_k;
use crate::models::VectorId;

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is a valid regex"));

static STOP_WORDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "an",
    "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere", "are",
    "around", "as", "at", "be", "became", "because", "become", "becomes", "becoming", "been",
    "before", "beforehand", "behind", "being", "below", "beside", "besides", "between", "beyond",
    "both", "but", "by", "can", "cannot", "could", "did", "do", "does", "doing", "done", "down",
    "due", "during", "each", "eg", "either", "else", "elsewhere", "enough", "etc", "even", "ever",
    "every", "everyone", "everything", "everywhere", "except", "few", "for", "former", "formerly",
    "from", "further", "had", "has", "have", "having", "he", "hence", "her", "here", "hereafter",
    "hereby", "herein", "hers", "herself", "him", "himself", "his", "how", "however", "ie", "if",
    "in", "indeed", "into", "is", "it", "its", "itself", "just", "last", "latter", "least", "less",
    "made", "many", "may", "me", "meanwhile", "might", "more", "moreover", "most", "mostly",
    "much", "must", "my", "myself", "namely", "neither", "never", "nevertheless", "next", "no",
    "nobody", "none", "nor", "not", "nothing", "now", "nowhere", "of", "off", "often", "on",
    "once", "one", "only", "onto", "or", "other", "others", "otherwise", "our", "ours",
    "ourselves", "out", "over", "own", "per", "perhaps", "please", "rather", "re", "same", "see",
    "seem", "seemed", "seeming", "seems", "several", "she", "should", "since", "so", "some",
    "somehow", "someone", "something", "sometime", "sometimes", "somewhere", "still", "such",
    "than", "that", "the", "their", "them", "themselves", "then", "thence", "there",
    "thereafter", "thereby", "therefore", "therein", "thereupon", "these", "they", "this",
    "those", "though", "through", "throughout", "thru", "thus", "to", "together", "too",
    "toward", "towards", "under", "until", "up", "upon", "us", "very", "via", "was", "we",
    "well", "were", "what", "whatever", "when", "whence", "whenever", "where", "whereafter",
    "whereas", "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while",
    "who", "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without",
    "would", "yet", "you", "your", "yours", "yourself", "yourselves",
];

/// Parameters of the TF-IDF fit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LexicalConfig {
    /// Vocabulary cap; the most frequent terms across the corpus are kept
    pub max_features: usize,

    /// Terms present in more than this fraction of documents are dropped
    pub max_df: f32,

    /// Terms present in fewer than this many documents are dropped
    pub min_df: usize,

    /// Smallest n-gram length
    pub ngram_min: usize,

    /// Largest n-gram length
    pub ngram_max: usize,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            max_features: 5000,
            max_df: 0.8,
            min_df: 2,
            ngram_min: 1,
            ngram_max: 2,
        }
    }
}

/// Reasons a vocabulary could not be fitted. Callers treat these as
/// "lexical search unavailable", not as failures.
#[derive(Debug, Error, PartialEq)]
pub enum LexicalFitError {
    #[error("corpus of {documents} documents is too small: max_df admits fewer documents than min_df")]
    TooFewDocuments { documents: usize },

    #[error("no terms remain after document-frequency pruning")]
    EmptyVocabulary,
}

/// Lowercase, tokenize and drop stop words.
fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Sparse row: `(term index, weight)` sorted by term index.
pub type SparseRow = Vec<(u32, f32)>;

/// Fitted TF-IDF model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TfidfVectorizer {
    config: LexicalConfig,
    vocabulary: HashMap<String, u32>,
    idf: Vec<f32>,
}

impl TfidfVectorizer {
    fn analyze(config: &LexicalConfig, text: &str) -> Vec<String> {
        let tokens = tokenize(text);
        let mut terms = Vec::new();
        let min_n = config.ngram_min.max(1);
        for n in min_n..=config.ngram_max.max(min_n) {
            if n == 1 {
                terms.extend(tokens.iter().cloned());
            } else {
                terms.extend(tokens.windows(n).map(|w| w.join(" ")));
            }
        }
        terms
    }

    fn count_terms(&self, text: &str) -> HashMap<u32, f32> {
        let mut counts = HashMap::new();
        for term in Self::analyze(&self.config, text) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }
        counts
    }

    /// Fit the vocabulary and idf weights and return the weighted rows of `texts`.
    ///
    /// # Errors
    /// See [`LexicalFitError`].
    pub fn fit_transform(
        config: LexicalConfig,
        texts: &[&str],
    ) -> Result<(Self, Vec<SparseRow>), LexicalFitError> {
        let n_docs = texts.len();
        let max_doc_count = config.max_df * n_docs as f32;
        if max_doc_count < config.min_df as f32 {
            return Err(LexicalFitError::TooFewDocuments { documents: n_docs });
        }

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_count: HashMap<String, usize> = HashMap::new();
        for text in texts {
            let mut seen = HashSet::new();
            for term in Self::analyze(&config, text) {
                *total_count.entry(term.clone()).or_insert(0) += 1;
                if seen.insert(term.clone()) {
                    *doc_freq.entry(term).or_insert(0) += 1;
                }
            }
        }

        let mut kept: Vec<(String, usize)> = doc_freq
            .iter()
            .filter(|(_, &df)| df >= config.min_df && df as f32 <= max_doc_count)
            .map(|(term, _)| (term.clone(), total_count[term]))
            .collect();
        if kept.is_empty() {
            return Err(LexicalFitError::EmptyVocabulary);
        }

        kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        kept.truncate(config.max_features);
        let mut terms: Vec<String> = kept.into_iter().map(|(term, _)| term).collect();
        terms.sort();

        let idf: Vec<f32> = terms
            .iter()
            .map(|term| {
                let df = doc_freq[term] as f32;
                ((1.0 + n_docs as f32) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        let vocabulary: HashMap<String, u32> = terms
            .into_iter()
            .enumerate()
            .map(|(i, term)| (term, i as u32))
            .collect();

        debug!(
            "Fitted lexical vocabulary of {} terms over {} documents",
            vocabulary.len(),
            n_docs
        );

        let model = Self {
            config,
            vocabulary,
            idf,
        };
        let rows = texts.iter().map(|text| model.transform(text)).collect();
        Ok((model, rows))
    }

    /// Project text into the fitted term space. Unknown terms are ignored.
    pub fn transform(&self, text: &str) -> SparseRow {
        let mut row: SparseRow = self
            .count_terms(text)
            .into_iter()
            .map(|(idx, count)| (idx, count * self.idf[idx as usize]))
            .collect();
        row.sort_by_key(|(idx, _)| *idx);

        let norm = row.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in row.iter_mut() {
                *w /= norm;
            }
        }
        row
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }

    /// Every vocabulary entry must have an idf weight.
    fn check_consistency(&self) -> Result<(), String> {
        if self.idf.len() != self.vocabulary.len() {
            return Err(format!(
                "{} idf weights for {} vocabulary terms",
                self.idf.len(),
                self.vocabulary.len()
            ));
        }
        if let Some((term, idx)) = self
            .vocabulary
            .iter()
            .find(|(_, &idx)| idx as usize >= self.idf.len())
        {
            return Err(format!("term '{}' has out-of-range index {}", term, idx));
        }
        Ok(())
    }
}

/// Document × term weight matrix with an explicit row → vector_id mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TermMatrix {
    pub n_terms: usize,
    pub row_ids: Vec<VectorId>,
    pub rows: Vec<SparseRow>,
}

impl TermMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

/// Fitted model together with its corpus matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalIndex {
    pub model: TfidfVectorizer,
    pub matrix: TermMatrix,
}

impl LexicalIndex {
    /// Fit over `(vector_id, text)` pairs, in the order given.
    pub fn fit(
        config: LexicalConfig,
        documents: &[(VectorId, &str)],
    ) -> Result<Self, LexicalFitError> {
        let texts: Vec<&str> = documents.iter().map(|(_, text)| *text).collect();
        let (model, rows) = TfidfVectorizer::fit_transform(config, &texts)?;
        let matrix = TermMatrix {
            n_terms: model.vocabulary_size(),
            row_ids: documents.iter().map(|(id, _)| *id).collect(),
            rows,
        };
        Ok(Self { model, matrix })
    }

    /// Top-k documents by TF-IDF dot product; only strictly positive scores.
    /// Ties keep insertion order.
    pub fn search(&self, query: &str, k: usize) -> Vec<(VectorId, f32)> {
        if k == 0 {
            return Vec::new();
        }
        let q: HashMap<u32, f32> = self.model.transform(query).into_iter().collect();
        if q.is_empty() {
            return Vec::new();
        }

        let scored: Vec<(VectorId, f32)> = self
            .matrix
            .rows
            .iter()
            .zip(&self.matrix.row_ids)
            .filter_map(|(row, &id)| {
                let score: f32 = row
                    .iter()
                    .filter_map(|(idx, w)| q.get(idx).map(|qw| qw * w))
                    .sum();
                (score > 0.0).then_some((id, score))
            })
            .collect();
        top_k(scored, k)
    }

    pub fn vocabulary_size(&self) -> usize {
        self.model.vocabulary_size()
    }

    /// Check that model and matrix describe the same term space.
    ///
    /// # Errors
    /// A description of the first contradiction found.
    pub fn check_consistency(&self) -> Result<(), String> {
        self.model.check_consistency()?;
        if self.matrix.n_terms != self.model.vocabulary_size() {
            return Err(format!(
                "matrix has {} terms but the vocabulary has {}",
                self.matrix.n_terms,
                self.model.vocabulary_size()
            ));
        }
        if self.matrix.rows.len() != self.matrix.row_ids.len() {
            return Err(format!(
                "matrix has {} rows but {} row ids",
                self.matrix.rows.len(),
                self.matrix.row_ids.len()
            ));
        }
        let n_terms = self.matrix.n_terms;
        if let Some(row) = self
            .matrix
            .rows
            .iter()
            .position(|row| row.iter().any(|(idx, _)| *idx as usize >= n_terms))
        {
            return Err(format!("row {} references a term outside the vocabulary", row));
        }
        Ok(())
    }

    /// Check the matrix is aligned with a corpus of `corpus_size` documents
    /// whose ids are `0..corpus_size`.
    pub fn is_aligned_with(&self, corpus_size: usize) -> bool {
        self.matrix.n_rows() == corpus_size
            && self.matrix.row_ids.len() == corpus_size
            && self
                .matrix
                .row_ids
                .iter()
                .enumerate()
                .all(|(i, &id)| id == i as VectorId)
            && self.check_consistency().is_ok()
    }

    /// Approximate bytes held by weights, row ids and idf values.
    pub fn memory_bytes(&self) -> usize {
        let entry = std::mem::size_of::<(u32, f32)>();
        self.matrix.nnz() * entry
            + self.matrix.row_ids.len() * std::mem::size_of::<VectorId>()
            + self.model.idf.len() * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<(VectorId, &'static str)> {
        vec![
            (0, "Neural Networks Neural Networks"),
            (1, "Quantum Computing Quantum Computing"),
            (2, "Neural Architecture Search Neural Architecture Search"),
        ]
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_short_tokens() {
        assert_eq!(tokenize("The a Graph of X-rays"), vec!["graph", "rays"]);
    }

    #[test]
    fn test_too_few_documents() {
        let docs = [(0, "alpha"), (1, "alpha")];
        let err = LexicalIndex::fit(LexicalConfig::default(), &docs).unwrap_err();
        assert_eq!(err, LexicalFitError::TooFewDocuments { documents: 2 });
    }

    #[test]
    fn test_no_shared_terms_gives_empty_vocabulary() {
        let docs = [(0, "alpha beta"), (1, "gamma delta"), (2, "epsilon zeta")];
        let err = LexicalIndex::fit(LexicalConfig::default(), &docs).unwrap_err();
        assert_eq!(err, LexicalFitError::EmptyVocabulary);
    }

    #[test]
    fn test_document_frequency_bounds() {
        let index = LexicalIndex::fit(LexicalConfig::default(), &corpus()).unwrap();
        // "neural" appears in 2 of 3 documents (<= 2.4); everything else in one.
        assert!(index.model.contains_term("neural"));
        assert!(!index.model.contains_term("quantum"));
        assert_eq!(index.vocabulary_size(), 1);
    }

    #[test]
    fn test_terms_in_too_many_documents_are_dropped() {
        let docs = [
            (0, "graph learning"),
            (1, "graph theory"),
            (2, "graph learning theory"),
            (3, "optics"),
            (4, "optics lasers"),
        ];
        let index = LexicalIndex::fit(LexicalConfig::default(), &docs).unwrap();
        // graph: 3/5 docs <= 4.0 kept; learning, theory, optics: 2 docs each.
        assert!(index.model.contains_term("graph"));
        assert!(index.model.contains_term("graph learning"));
        assert!(!index.model.contains_term("lasers"));

        let docs = [
            (0, "graph a"),
            (1, "graph b"),
            (2, "graph c"),
            (3, "graph dd ee"),
            (4, "dd ee"),
        ];
        let index = LexicalIndex::fit(LexicalConfig::default(), &docs).unwrap();
        // graph: 4/5 docs = 4.0, still admitted at max_df 0.8
        assert!(index.model.contains_term("graph"));
        let strict = LexicalConfig {
            max_df: 0.7,
            ..LexicalConfig::default()
        };
        let index = LexicalIndex::fit(strict, &docs).unwrap();
        assert!(!index.model.contains_term("graph"));
        assert!(index.model.contains_term("dd ee"));
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let docs = [
            (0, "alpha alpha alpha beta"),
            (1, "alpha beta gamma"),
            (2, "gamma delta"),
            (3, "delta omega"),
            (4, "omega"),
        ];
        let config = LexicalConfig {
            max_features: 1,
            ngram_max: 1,
            ..LexicalConfig::default()
        };
        let index = LexicalIndex::fit(config, &docs).unwrap();
        assert_eq!(index.vocabulary_size(), 1);
        assert!(index.model.contains_term("alpha"));
    }

    #[test]
    fn test_rows_are_unit_normalized() {
        let index = LexicalIndex::fit(LexicalConfig::default(), &corpus()).unwrap();
        for row in &index.matrix.rows {
            if row.is_empty() {
                continue;
            }
            let norm: f32 = row.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
        assert!(index.is_aligned_with(3));
        assert!(!index.is_aligned_with(4));
    }

    #[test]
    fn test_search_ties_keep_insertion_order_and_skip_zero_scores() {
        let index = LexicalIndex::fit(LexicalConfig::default(), &corpus()).unwrap();
        let results = index.search("neural", 10);
        assert_eq!(results.iter().map(|r| r.0).collect::<Vec<_>>(), vec![0, 2]);
        assert!((results[0].1 - results[1].1).abs() < 1e-6);
        assert!(index.search("photonics", 10).is_empty());
        assert!(index.search("neural", 0).is_empty());
    }

    #[test]
    fn test_missing_idf_weights_are_inconsistent() {
        let mut index = LexicalIndex::fit(LexicalConfig::default(), &corpus()).unwrap();
        assert!(index.check_consistency().is_ok());

        index.model.idf.clear();
        assert!(index.check_consistency().is_err());
        assert!(!index.is_aligned_with(3));
    }

    #[test]
    fn test_out_of_range_indices_are_inconsistent() {
        let mut index = LexicalIndex::fit(LexicalConfig::default(), &corpus()).unwrap();
        index.model.vocabulary.insert("photonics".to_string(), 7);
        index.model.idf.push(1.0);
        assert!(index.check_consistency().is_err());

        let mut index = LexicalIndex::fit(LexicalConfig::default(), &corpus()).unwrap();
        index.matrix.rows[1].push((5, 0.5));
        assert!(index.check_consistency().is_err());
        assert!(!index.is_aligned_with(3));
    }

    #[test]
    fn test_search_prefers_higher_overlap() {
        let docs = [
            (0, "graph neural networks for molecules"),
            (1, "graph kernels"),
            (2, "neural networks"),
            (3, "molecules and kernels"),
        ];
        let index = LexicalIndex::fit(LexicalConfig::default(), &docs).unwrap();
        let results = index.search("graph neural networks", 4);
        assert_eq!(results[0].0, 0);
    }
}
