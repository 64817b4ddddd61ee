//! Per-document retrieval with a relevance threshold and best-match fallback.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chunking::Chunker;
use crate::document::{Chunk, SearchResult};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// The outcome of one retrieval query.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// No index has been built, so nothing could be searched.
    NoIndex,
    /// Candidates that cleared the relevance threshold, best first.
    Relevant(Vec<SearchResult>),
    /// Nothing cleared the threshold; the single best candidate is used anyway.
    Fallback(SearchResult),
}

impl Retrieval {
    /// The selected results, best first.
    pub fn results(&self) -> &[SearchResult] {
        match self {
            Self::NoIndex => &[],
            Self::Relevant(results) => results,
            Self::Fallback(result) => std::slice::from_ref(result),
        }
    }

    /// The selected chunks, best first.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.results().iter().map(|r| &r.chunk)
    }

    /// Whether the context comes from the below-threshold fallback.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    /// Join the selected chunk texts with `separator`, in retrieved order.
    pub fn context(&self, separator: &str) -> String {
        self.chunks().map(|c| c.text.as_str()).collect::<Vec<_>>().join(separator)
    }
}

/// Keep candidates scoring at least `threshold`; fall back to the best one.
///
/// `candidates` must already be sorted best first.
pub fn select(candidates: Vec<SearchResult>, threshold: f32) -> Retrieval {
    let best = candidates.first().cloned();
    let relevant: Vec<SearchResult> =
        candidates.into_iter().filter(|r| r.score >= threshold).collect();

    match best {
        Some(best) if relevant.is_empty() => Retrieval::Fallback(best),
        _ => Retrieval::Relevant(relevant),
    }
}

/// Chunks, embeds and indexes one document, then answers retrieval queries.
///
/// A retriever belongs to a single document: build a new one for every
/// document instead of re-preparing an existing one.
pub struct Retriever {
    embedder: Embedder,
    chunker: Arc<dyn Chunker>,
    index: VectorIndex,
}

impl Retriever {
    /// Create a retriever with an empty index.
    pub fn new(embedder: Embedder, chunker: Arc<dyn Chunker>) -> Self {
        Self { embedder, chunker, index: VectorIndex::new() }
    }

    /// Chunk `text`, embed every chunk in one pass and build the index.
    ///
    /// Returns the number of indexed chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyDocument`] if chunking yields nothing (the
    /// embedder is not called), or any embedding or index error.
    pub async fn prepare_index(&mut self, text: &str) -> Result<usize> {
        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            return Err(RagError::EmptyDocument);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let chunk_count = chunks.len();
        self.index.build(vectors, chunks)?;
        info!(chunk_count, dimensions = ?self.index.dimensions(), "built document index");

        Ok(chunk_count)
    }

    /// Retrieve context for `question`.
    ///
    /// Searches for `top_k` candidates (at least one) and keeps those scoring
    /// at least `threshold`. When none qualifies, the single best candidate is returned
    /// as [`Retrieval::Fallback`]. Without a built index the result is
    /// [`Retrieval::NoIndex`] and the embedder is not called.
    ///
    /// # Errors
    ///
    /// Returns embedding or index errors.
    pub async fn query(&self, question: &str, top_k: usize, threshold: f32) -> Result<Retrieval> {
        if !self.index.is_built() {
            return Ok(Retrieval::NoIndex);
        }

        let query = self.embedder.embed_one(question).await?;
        let candidates = self.index.search(&query, top_k.max(1))?;
        let best_score = candidates.first().map(|r| r.score);

        let retrieval = select(candidates, threshold);
        match &retrieval {
            Retrieval::Fallback(best) => warn!(
                score = best.score,
                threshold,
                chunk = best.chunk.index,
                "no chunk cleared the relevance threshold, using best match"
            ),
            Retrieval::Relevant(results) => {
                debug!(selected = results.len(), ?best_score, "retrieved context")
            }
            Retrieval::NoIndex => {}
        }

        Ok(retrieval)
    }

    /// The index built for this retriever's document.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(index: usize, score: f32) -> SearchResult {
        SearchResult { chunk: Chunk::new(index, format!("chunk {index}")), score }
    }

    #[test]
    fn select_keeps_results_above_threshold_in_order() {
        let retrieval = select(vec![hit(2, 0.9), hit(0, 0.5), hit(1, 0.1)], 0.2);
        let order: Vec<usize> = retrieval.chunks().map(|c| c.index).collect();
        assert_eq!(order, vec![2, 0]);
        assert!(!retrieval.is_degraded());
    }

    #[test]
    fn select_falls_back_to_best_candidate() {
        let retrieval = select(vec![hit(3, 0.15), hit(1, 0.05)], 0.2);
        assert_eq!(retrieval, Retrieval::Fallback(hit(3, 0.15)));
        assert!(retrieval.is_degraded());
        assert_eq!(retrieval.results().len(), 1);
    }

    #[test]
    fn threshold_is_inclusive() {
        let retrieval = select(vec![hit(0, 0.2)], 0.2);
        assert!(matches!(retrieval, Retrieval::Relevant(ref r) if r.len() == 1));
    }

    #[test]
    fn context_joins_in_retrieved_order() {
        let retrieval = select(vec![hit(5, 0.8), hit(1, 0.7)], 0.0);
        assert_eq!(retrieval.context("\n"), "chunk 5\nchunk 1");
        assert_eq!(Retrieval::NoIndex.context("\n"), "");
    }
}
