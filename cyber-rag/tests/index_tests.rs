//! Vector index ranking, build contract and retrieval selection properties.

mod common;

use std::sync::Arc;

use common::{KeywordEmbedder, REPORT};
use cyber_rag::retriever::select;
use cyber_rag::{
    Chunk, Embedder, FixedSizeChunker, RagError, Retrieval, Retriever, SearchResult, VectorIndex,
};
use proptest::prelude::*;

/// A unit vector in the plane whose first coordinate is `score`.
fn with_score(score: f32) -> Vec<f32> {
    vec![score, (1.0 - score * score).sqrt(), 0.0]
}

fn chunks(n: usize) -> Vec<Chunk> {
    (0..n).map(|i| Chunk::new(i, format!("chunk {i}"))).collect()
}

#[test]
fn ranks_by_descending_similarity() {
    let mut index = VectorIndex::new();
    index
        .build(vec![with_score(0.5), with_score(0.9), with_score(0.1)], chunks(3))
        .unwrap();

    let results = index.search(&[1.0, 0.0, 0.0], 2).unwrap();

    let order: Vec<usize> = results.iter().map(|r| r.chunk.index).collect();
    assert_eq!(order, vec![1, 0]);
    assert!((results[0].score - 0.9).abs() < 1e-5);
    assert!((results[1].score - 0.5).abs() < 1e-5);
}

#[test]
fn ties_prefer_lower_chunk_index() {
    let mut index = VectorIndex::new();
    index.build(vec![with_score(0.3), with_score(0.7), with_score(0.7)], chunks(3)).unwrap();

    let order: Vec<usize> =
        index.search(&[1.0, 0.0, 0.0], 3).unwrap().iter().map(|r| r.chunk.index).collect();
    assert_eq!(order, vec![1, 2, 0]);
}

#[test]
fn k_larger_than_index_returns_everything() {
    let mut index = VectorIndex::new();
    index.build(vec![with_score(0.2), with_score(0.4)], chunks(2)).unwrap();
    assert_eq!(index.search(&[1.0, 0.0, 0.0], 10).unwrap().len(), 2);
}

#[test]
fn building_from_nothing_is_an_error() {
    let mut index = VectorIndex::new();
    assert!(matches!(index.build(Vec::new(), Vec::new()), Err(RagError::EmptyIndex)));
    assert!(!index.is_built());
}

#[test]
fn search_before_build_is_an_error() {
    let index = VectorIndex::new();
    assert!(matches!(index.search(&[1.0, 0.0], 1), Err(RagError::IndexNotBuilt)));
}

#[test]
fn malformed_vectors_are_rejected() {
    let mut index = VectorIndex::new();
    assert!(matches!(
        index.build(vec![vec![3.0, 4.0]], chunks(1)),
        Err(RagError::IndexError(_))
    ));
    assert!(matches!(
        index.build(vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]], chunks(2)),
        Err(RagError::IndexError(_))
    ));
    assert!(matches!(index.build(vec![vec![1.0, 0.0]], chunks(2)), Err(RagError::IndexError(_))));
}

#[test]
fn no_index_selects_nothing() {
    assert!(Retrieval::NoIndex.results().is_empty());
    assert!(!Retrieval::NoIndex.is_degraded());
}

#[tokio::test]
async fn zero_top_k_still_returns_context() {
    let embedder = Embedder::new(Arc::new(KeywordEmbedder::new()), 8);
    let mut retriever = Retriever::new(embedder, Arc::new(FixedSizeChunker::new(12, 0.0)));
    retriever.prepare_index(REPORT).await.unwrap();

    let retrieval = retriever.query("malware", 0, 0.2).await.unwrap();
    assert_eq!(retrieval.results().len(), 1);
    assert!(!retrieval.context("\n").is_empty());
}

fn arb_unit_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero vector", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-3 {
            return None;
        }
        v.iter_mut().for_each(|x| *x /= norm);
        Some(v)
    })
}

fn arb_candidates() -> impl Strategy<Value = Vec<SearchResult>> {
    proptest::collection::vec(-1.0f32..1.0f32, 1..12).prop_map(|mut scores| {
        scores.sort_by(|a, b| b.total_cmp(a));
        scores
            .into_iter()
            .enumerate()
            .map(|(i, score)| SearchResult { chunk: Chunk::new(i, format!("c{i}")), score })
            .collect()
    })
}

/// Searching a built index returns at most `k` results, best first, with
/// scores that match the inner product of query and stored vector.
mod prop_search_ordering {
    use super::*;

    const DIM: usize = 8;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_sorted_and_bounded(
            vectors in proptest::collection::vec(arb_unit_vector(DIM), 1..20),
            query in arb_unit_vector(DIM),
            k in 1usize..25,
        ) {
            let n = vectors.len();
            let stored = vectors.clone();
            let mut index = VectorIndex::new();
            index.build(vectors, chunks(n)).unwrap();

            let results = index.search(&query, k).unwrap();

            prop_assert_eq!(results.len(), k.min(n));
            for pair in results.windows(2) {
                prop_assert!(
                    pair[0].score > pair[1].score
                        || (pair[0].score == pair[1].score && pair[0].chunk.index < pair[1].chunk.index)
                );
            }
            for result in &results {
                let expected = cyber_rag::index::dot(&stored[result.chunk.index], &query);
                prop_assert!((result.score - expected).abs() < 1e-5);
            }
        }
    }
}

/// Selection never returns an empty context when candidates exist, and falls
/// back to exactly the best candidate when none clears the threshold.
mod prop_fallback_selection {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn never_empty_and_falls_back_to_best(
            candidates in arb_candidates(),
            threshold in -1.0f32..1.0f32,
        ) {
            let best = candidates[0].clone();
            let above = candidates.iter().filter(|c| c.score >= threshold).count();

            let retrieval = select(candidates, threshold);

            prop_assert!(!retrieval.results().is_empty());
            if above == 0 {
                prop_assert_eq!(retrieval, Retrieval::Fallback(best));
            } else {
                prop_assert_eq!(retrieval.results().len(), above);
                prop_assert!(retrieval.results().iter().all(|r| r.score >= threshold));
                prop_assert!(!retrieval.is_degraded());
            }
        }
    }
}
