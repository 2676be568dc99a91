//! End-to-end tests against on-disk snapshots, using the hash encoder.

use paper_hybrid_search::{
    embedding::hash::HashEmbeddingProvider,
    ingestion::IngestionPipeline,
    provider::json::JsonFilePaperProvider,
    storage::{DENSE_INDEX_FILE, LEXICAL_MATRIX_FILE, LEXICAL_MODEL_FILE, METADATA_FILE},
    Author, EngineConfig, FileStorage, HybridIndex, IndexStorage, Paper, SearchMethod,
    SearchResult,
};
use paper_hybrid_search::index::LexicalConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

const DIM: usize = 384;

type Index = HybridIndex<HashEmbeddingProvider, FileStorage>;

async fn open(dir: &Path) -> Index {
    let config = EngineConfig::new(dir, "", DIM);
    HybridIndex::open_dir(config, HashEmbeddingProvider::new(DIM))
        .await
        .unwrap()
}

fn paper(title: &str, concepts: &[&str]) -> Paper {
    Paper {
        concepts: concepts.iter().map(|c| c.to_string()).collect(),
        ..Paper::new(title)
    }
}

fn scenario_papers() -> Vec<Paper> {
    vec![
        Paper::new("Neural Networks"),
        Paper::new("Quantum Computing"),
        Paper::new("Neural Architecture Search"),
    ]
}

fn corpus() -> Vec<Paper> {
    let mut attention = paper("Attention Is All You Need", &["deep learning", "transformers"]);
    attention.venue = Some("NeurIPS".to_string());
    attention.authors = vec![Author::new("Ashish Vaswani"), Author::new("Noam Shazeer")];

    let mut federated = paper("Federated Learning at Scale", &["distributed systems"]);
    federated.venue = Some("NeurIPS".to_string());

    vec![
        paper("Graph Neural Networks for Molecules", &["graph learning", "chemistry"]),
        paper("Convolutional Neural Networks for Vision", &["deep learning", "computer vision"]),
        attention,
        paper("Quantum Error Correction", &["quantum computing"]),
        paper("Quantum Algorithms for Linear Systems", &["quantum computing", "linear algebra"]),
        paper("Graph Transformers", &["graph learning", "transformers"]),
        federated,
        paper("Reinforcement Learning for Robotics", &["robotics"]),
    ]
}

fn titles(results: &[SearchResult]) -> Vec<String> {
    results.iter().map(|r| r.paper.title.clone()).collect()
}

#[tokio::test]
async fn empty_index_returns_no_results() {
    let dir = tempfile::tempdir().unwrap();
    let index = open(dir.path()).await;

    let results = index.search("anything", 10, None, None).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(index.stats().await.corpus_size, 0);
}

#[tokio::test]
async fn keyword_matches_rank_first_in_hybrid_mode() {
    let dir = tempfile::tempdir().unwrap();
    let index = open(dir.path()).await;
    assert_eq!(index.add(scenario_papers()).await.unwrap(), 3);

    let results = index.search("neural", 3, Some(0.7), None).await.unwrap();
    let top: Vec<&str> = results.iter().take(2).map(|r| r.paper.title.as_str()).collect();
    assert!(top.contains(&"Neural Networks"));
    assert!(top.contains(&"Neural Architecture Search"));
    assert!(results.iter().all(|r| r.search_method == SearchMethod::Hybrid));
}

#[tokio::test]
async fn missing_lexical_artifacts_disable_keyword_search_until_next_insert() {
    let dir = tempfile::tempdir().unwrap();
    {
        let index = open(dir.path()).await;
        index.add(scenario_papers()).await.unwrap();
    }
    std::fs::remove_file(dir.path().join(LEXICAL_MODEL_FILE)).unwrap();

    let index = open(dir.path()).await;
    let stats = index.stats().await;
    assert_eq!(stats.corpus_size, 3);
    assert!(!stats.lexical_enabled);

    let results = index.search("neural", 3, None, Some(0.0)).await.unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.search_method == SearchMethod::Semantic));
    assert!(results.iter().all(|r| r.keyword_score.is_none()));

    index.add(vec![Paper::new("Neural Search")]).await.unwrap();
    assert!(index.is_lexical_enabled().await);
    assert!(dir.path().join(LEXICAL_MODEL_FILE).exists());
}

#[tokio::test]
async fn corrupt_lexical_matrix_keeps_dense_search() {
    let dir = tempfile::tempdir().unwrap();
    {
        let index = open(dir.path()).await;
        index.add(corpus()).await.unwrap();
    }
    std::fs::write(dir.path().join(LEXICAL_MATRIX_FILE), b"not a matrix").unwrap();

    let index = open(dir.path()).await;
    assert_eq!(index.len().await, 8);
    assert!(!index.is_lexical_enabled().await);
    let results = index.search("quantum computing", 2, None, None).await.unwrap();
    assert!(results.iter().all(|r| r.search_method == SearchMethod::Semantic));
}

/// Field layout of a persisted TF-IDF model.
#[derive(Serialize)]
struct RawModel {
    config: LexicalConfig,
    vocabulary: HashMap<String, u32>,
    idf: Vec<f32>,
}

#[tokio::test]
async fn lexical_model_missing_idf_weights_disables_keyword_search() {
    let dir = tempfile::tempdir().unwrap();
    {
        let index = open(dir.path()).await;
        index.add(scenario_papers()).await.unwrap();
        assert_eq!(index.stats().await.lexical_vocabulary_size, 1);
    }
    let raw = RawModel {
        config: LexicalConfig::default(),
        vocabulary: HashMap::from([("neural".to_string(), 0)]),
        idf: Vec::new(),
    };
    std::fs::write(
        dir.path().join(LEXICAL_MODEL_FILE),
        bincode::serialize(&raw).unwrap(),
    )
    .unwrap();

    let index = open(dir.path()).await;
    assert_eq!(index.len().await, 3);
    assert!(!index.is_lexical_enabled().await);

    let results = index.search("neural", 3, None, Some(-1.0)).await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.search_method == SearchMethod::Semantic));
}

#[tokio::test]
async fn corrupt_dense_artifact_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    {
        let index = open(dir.path()).await;
        index.add(corpus()).await.unwrap();
    }
    std::fs::write(dir.path().join(DENSE_INDEX_FILE), b"garbage").unwrap();

    let index = open(dir.path()).await;
    assert!(index.is_empty().await);
    assert!(index.search("graph", 5, None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn reload_preserves_size_and_ranking() {
    let dir = tempfile::tempdir().unwrap();
    let queries = ["graph learning", "quantum", "transformers attention"];

    let mut before = Vec::new();
    {
        let index = open(dir.path()).await;
        index.add(corpus()).await.unwrap();
        index.save().await.unwrap();
        for query in queries {
            before.push(index.search(query, 5, None, None).await.unwrap());
        }
    }

    let index = open(dir.path()).await;
    assert_eq!(index.len().await, 8);
    assert!(index.is_lexical_enabled().await);
    for (query, expected) in queries.iter().zip(&before) {
        let results = index.search(query, 5, None, None).await.unwrap();
        assert_eq!(titles(&results), titles(expected));
        for (a, b) in results.iter().zip(expected) {
            assert_eq!(a.final_score, b.final_score);
        }
    }
}

#[tokio::test]
async fn stores_stay_aligned_across_insertions() {
    let dir = tempfile::tempdir().unwrap();
    let index = open(dir.path()).await;
    let storage = FileStorage::new(dir.path());

    let mut expected = 0;
    for batch in corpus().chunks(3) {
        index.add(batch.to_vec()).await.unwrap();
        expected += batch.len();

        assert_eq!(index.len().await, expected);
        let core = storage.load_core().await.unwrap().unwrap();
        assert_eq!(core.dense.len(), expected);
        assert_eq!(core.metadata.len(), expected);
        assert!(core.metadata.is_contiguous());

        if let Some(lexical) = storage.load_lexical().await.unwrap() {
            assert!(lexical.is_aligned_with(expected));
            assert!(index.is_lexical_enabled().await);
        }
    }

    for id in 0..expected as u64 {
        assert_eq!(index.get(id).await.unwrap().vector_id, Some(id));
    }
}

#[tokio::test]
async fn semantic_weight_one_follows_dense_order() {
    let dir = tempfile::tempdir().unwrap();
    let index = open(dir.path()).await;
    index.add(corpus()).await.unwrap();

    let results = index.search("graph neural networks", 8, Some(1.0), Some(-1.0)).await.unwrap();
    assert!(!results.is_empty());
    for pair in results.windows(2) {
        assert!(pair[0].final_score >= pair[1].final_score);
        assert!(pair[0].semantic_score >= pair[1].semantic_score);
    }
}

#[tokio::test]
async fn semantic_weight_zero_follows_keyword_order() {
    let dir = tempfile::tempdir().unwrap();
    let index = open(dir.path()).await;
    index.add(corpus()).await.unwrap();

    let results = index.search("quantum", 8, Some(0.0), None).await.unwrap();
    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(result.paper.title.starts_with("Quantum"));
        assert!(result.keyword_score.unwrap() > 0.0);
    }
    assert!(results[0].keyword_score >= results[1].keyword_score);
}

#[tokio::test]
async fn results_are_truncated_and_thresholded() {
    let dir = tempfile::tempdir().unwrap();
    let index = open(dir.path()).await;
    index.add(corpus()).await.unwrap();

    let results = index.search("learning", 2, Some(0.5), Some(-1.0)).await.unwrap();
    assert_eq!(results.len(), 2);

    let results = index
        .search("deep learning transformers", 8, Some(0.5), Some(0.4))
        .await
        .unwrap();
    assert!(results.len() <= 8);
    for result in &results {
        assert!(result.final_score >= 0.4);
    }
    for pair in results.windows(2) {
        assert!(pair[0].final_score >= pair[1].final_score);
    }
}

#[tokio::test]
async fn clear_removes_artifacts_and_restarts_ids() {
    let dir = tempfile::tempdir().unwrap();
    let index = open(dir.path()).await;
    index.add(corpus()).await.unwrap();

    index.clear().await.unwrap();
    for name in [DENSE_INDEX_FILE, METADATA_FILE, LEXICAL_MODEL_FILE, LEXICAL_MATRIX_FILE] {
        assert!(!dir.path().join(name).exists(), "{} still present", name);
    }
    assert!(index.search("graph", 5, None, None).await.unwrap().is_empty());

    index.add(vec![Paper::new("After Clear")]).await.unwrap();
    drop(index);

    let index = open(dir.path()).await;
    assert_eq!(index.len().await, 1);
    assert_eq!(index.get(0).await.unwrap().title, "After Clear");
}

#[tokio::test]
async fn ingests_papers_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("papers.json");
    std::fs::write(
        &input,
        r#"[
            {"title": "Neural Networks", "abstract": "Layers of units.", "publish_year": 1986},
            {"title": "  ", "concepts": ["orphan"]},
            {"title": "Quantum Computing", "authors": [{"name": "Richard Feynman"}]},
            {"title": "Neural Architecture Search", "keywords": ["automl"]}
        ]"#,
    )
    .unwrap();

    let index = open(&dir.path().join("index")).await;
    let provider = JsonFilePaperProvider::from_file(&input).await.unwrap();
    let stats = IngestionPipeline::new(&index)
        .ingest_from_provider(&provider)
        .await
        .unwrap();

    assert_eq!(stats.total_processed, 4);
    assert_eq!(stats.inserted, 3);
    assert_eq!(stats.failed, 1);

    let first = index.get(0).await.unwrap();
    assert_eq!(first.abstract_text, "Layers of units.");
    assert_eq!(first.publish_year, Some(1986));
    assert_eq!(
        index.get(2).await.unwrap().index_text.as_deref(),
        Some("Neural Architecture Search Neural Architecture Search automl")
    );
}
