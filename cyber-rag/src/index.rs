//! Exact in-memory vector index for one document.
//!
//! [`VectorIndex`] stores unit-length chunk embeddings and scores queries by
//! inner product, which equals cosine similarity for unit vectors. The index
//! is built once per document and never updated incrementally.

use std::cmp::Ordering;

use crate::document::{Chunk, SearchResult};
use crate::embedding::{is_unit, l2_norm};
use crate::error::{RagError, Result};

/// Inner product of two equal-length vectors.
///
/// For unit vectors this is their cosine similarity.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[derive(Debug, Clone)]
struct Entries {
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
    chunks: Vec<Chunk>,
}

/// Embeddings for one document's chunks plus the chunks themselves.
///
/// Created empty, populated once with [`build`](VectorIndex::build), then
/// queried with [`search`](VectorIndex::search).
///
/// # Example
///
/// ```rust
/// use cyber_rag::{Chunk, VectorIndex};
///
/// let mut index = VectorIndex::new();
/// index.build(vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![Chunk::new(0, "a"), Chunk::new(1, "b")])?;
/// let hits = index.search(&[1.0, 0.0], 1)?;
/// assert_eq!(hits[0].chunk.text, "a");
/// # Ok::<(), cyber_rag::RagError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Option<Entries>,
}

impl VectorIndex {
    /// Create an empty, unbuilt index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the index contents with `vectors` and their parallel `chunks`.
    ///
    /// Prior contents are discarded even when the new input is rejected.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyIndex`] if `chunks` is empty
    /// - [`RagError::IndexError`] if the lengths differ, the vectors disagree on
    ///   dimensionality, or any vector is not unit length
    pub fn build(&mut self, vectors: Vec<Vec<f32>>, chunks: Vec<Chunk>) -> Result<()> {
        self.entries = None;
        if chunks.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        if vectors.len() != chunks.len() {
            return Err(RagError::IndexError(format!(
                "{} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let dimensions = vectors[0].len();
        if dimensions == 0 {
            return Err(RagError::IndexError("vectors must not be empty".to_string()));
        }
        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != dimensions {
                return Err(RagError::IndexError(format!(
                    "vector {i} has {} dimensions, expected {dimensions}",
                    vector.len()
                )));
            }
            if !is_unit(vector) {
                return Err(RagError::IndexError(format!(
                    "vector {i} has norm {}, expected 1",
                    l2_norm(vector)
                )));
            }
        }

        self.entries = Some(Entries { dimensions, vectors, chunks });
        Ok(())
    }

    /// Return up to `k` chunks most similar to `query`, best first.
    ///
    /// Scores are inner products; equal scores are ordered by chunk position.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexNotBuilt`] if called before [`build`](Self::build)
    /// - [`RagError::IndexError`] if `query` has the wrong dimensionality or is
    ///   not unit length
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let entries = self.entries.as_ref().ok_or(RagError::IndexNotBuilt)?;

        if query.len() != entries.dimensions {
            return Err(RagError::IndexError(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                entries.dimensions
            )));
        }
        if !is_unit(query) {
            return Err(RagError::IndexError(format!(
                "query has norm {}, expected 1",
                l2_norm(query)
            )));
        }

        let mut scored: Vec<(usize, f32)> =
            entries.vectors.iter().map(|v| dot(v, query)).enumerate().collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(row, score)| SearchResult { chunk: entries.chunks[row].clone(), score })
            .collect())
    }

    /// Whether [`build`](Self::build) has succeeded.
    pub fn is_built(&self) -> bool {
        self.entries.is_some()
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.chunks.len())
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensionality of the indexed vectors, once built.
    pub fn dimensions(&self) -> Option<usize> {
        self.entries.as_ref().map(|e| e.dimensions)
    }

    /// The indexed chunks in document order.
    pub fn chunks(&self) -> &[Chunk] {
        match &self.entries {
            Some(entries) => &entries.chunks,
            None => &[],
        }
    }
}
