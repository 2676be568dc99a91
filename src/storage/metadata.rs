//! Metadata store: `vector_id → Paper`.

use std::collections::{BTreeMap, HashSet};

use crate::embedding::normalize_text;
use crate::models::{Paper, VectorId};

/// Ordered map from internal id to the full paper record.
///
/// Every stored paper carries its `vector_id` and synthesized `index_text`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataStore {
    papers: BTreeMap<VectorId, Paper>,
    titles: HashSet<String>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from its persisted map.
    pub fn from_map(papers: BTreeMap<VectorId, Paper>) -> Self {
        let titles = papers.values().map(|p| normalize_text(&p.title)).collect();
        Self { papers, titles }
    }

    pub fn as_map(&self) -> &BTreeMap<VectorId, Paper> {
        &self.papers
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    pub fn get(&self, id: VectorId) -> Option<&Paper> {
        self.papers.get(&id)
    }

    /// Store a paper under `id`, stamping `vector_id` on the record.
    pub fn insert(&mut self, id: VectorId, mut paper: Paper) {
        paper.vector_id = Some(id);
        self.titles.insert(normalize_text(&paper.title));
        self.papers.insert(id, paper);
    }

    /// Whether a paper with the same normalized title is stored.
    pub fn contains_title(&self, title: &str) -> bool {
        self.titles.contains(&normalize_text(title))
    }

    /// `(id, index_text)` pairs in id order.
    pub fn texts(&self) -> Vec<(VectorId, &str)> {
        self.papers
            .iter()
            .map(|(id, p)| (*id, p.index_text.as_deref().unwrap_or("")))
            .collect()
    }

    /// Ids are exactly `0..len`.
    pub fn is_contiguous(&self) -> bool {
        self.papers
            .keys()
            .enumerate()
            .all(|(i, id)| *id == i as VectorId)
    }

    /// Approximate bytes of the stored text fields.
    pub fn memory_bytes(&self) -> usize {
        self.papers
            .values()
            .map(|p| {
                p.title.len()
                    + p.abstract_text.len()
                    + p.index_text.as_ref().map_or(0, String::len)
                    + p.authors.iter().map(|a| a.name.len()).sum::<usize>()
                    + p.concepts.iter().map(String::len).sum::<usize>()
                    + p.keywords.iter().map(String::len).sum::<usize>()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(title: &str, text: &str) -> Paper {
        Paper {
            index_text: Some(text.to_string()),
            ..Paper::new(title)
        }
    }

    #[test]
    fn test_insert_stamps_id_and_tracks_title() {
        let mut store = MetadataStore::new();
        store.insert(0, paper("Deep  Learning", "deep learning"));
        assert_eq!(store.get(0).unwrap().vector_id, Some(0));
        assert!(store.contains_title("deep learning"));
        assert!(!store.contains_title("shallow learning"));
    }

    #[test]
    fn test_texts_in_id_order() {
        let mut store = MetadataStore::new();
        store.insert(1, paper("B", "b text"));
        store.insert(0, paper("A", "a text"));
        assert_eq!(store.texts(), vec![(0, "a text"), (1, "b text")]);
        assert!(store.is_contiguous());
    }

    #[test]
    fn test_from_map_rebuilds_titles() {
        let mut store = MetadataStore::new();
        store.insert(0, paper("Graph Theory", "g"));
        let rebuilt = MetadataStore::from_map(store.as_map().clone());
        assert!(rebuilt.contains_title("GRAPH theory"));
        assert_eq!(rebuilt, store);
    }

    #[test]
    fn test_gap_is_not_contiguous() {
        let mut store = MetadataStore::new();
        store.insert(0, paper("A", "a"));
        store.insert(2, paper("C", "c"));
        assert!(!store.is_contiguous());
    }
}
