//! Embedding provider trait and the normalizing [`Embedder`] wrapper.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::EmbedderConfig;
use crate::error::{RagError, Result};

/// Vectors whose norm is within this distance of 1.0 count as unit length.
pub const NORM_TOLERANCE: f32 = 1e-4;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (Ollama, OpenAI, etc.)
/// behind a unified async interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// Providers may return vectors of any magnitude; [`Embedder`] normalizes them.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Short provider name used in logs and errors.
    fn name(&self) -> &str {
        "custom"
    }
}

/// Scale a vector to unit L2 norm in place.
///
/// Normalizing an already-unit vector leaves it unchanged (up to rounding).
///
/// # Errors
///
/// Returns [`RagError::EmbeddingError`] for a zero or non-finite vector.
pub fn normalize(vector: &mut [f32]) -> Result<()> {
    let norm = l2_norm(vector);
    if norm == 0.0 || !norm.is_finite() {
        return Err(RagError::EmbeddingError {
            provider: "normalize".to_string(),
            message: format!("cannot normalize vector with norm {norm}"),
        });
    }
    vector.iter_mut().for_each(|x| *x /= norm);
    Ok(())
}

/// Euclidean length of a vector.
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Whether a vector has unit length within [`NORM_TOLERANCE`].
pub fn is_unit(vector: &[f32]) -> bool {
    (l2_norm(vector) - 1.0).abs() <= NORM_TOLERANCE
}

/// Maps text to unit-length embedding vectors.
///
/// Wraps an [`EmbeddingProvider`], sends inputs in batches of `batch_size`
/// and normalizes every returned vector. The batch size only affects how many
/// provider calls are made, never the vectors produced.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl Embedder {
    /// Create an embedder over `provider` sending `batch_size` texts per call.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self { provider, batch_size: batch_size.max(1) }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Number of texts per provider call.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embed `texts`, returning one unit vector per input in the same order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if the provider fails, returns the
    /// wrong number of vectors, or returns a vector that cannot be normalized.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            debug!(provider = self.provider.name(), batch_size = batch.len(), "embedding batch");
            let embedded = self.provider.embed_batch(batch).await?;
            if embedded.len() != batch.len() {
                return Err(RagError::EmbeddingError {
                    provider: self.provider.name().to_string(),
                    message: format!(
                        "expected {} embeddings, provider returned {}",
                        batch.len(),
                        embedded.len()
                    ),
                });
            }
            for mut vector in embedded {
                normalize(&mut vector)?;
                vectors.push(vector);
            }
        }

        Ok(vectors)
    }

    /// Embed a single query string as a unit vector.
    ///
    /// # Errors
    ///
    /// Same as [`embed`](Self::embed).
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = self.provider.embed(text).await?;
        normalize(&mut vector)?;
        Ok(vector)
    }
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("provider", &self.provider.name())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

/// Build the embedding provider described by `config`.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] if the configuration is invalid or the
/// backend's cargo feature is not enabled.
pub fn provider_from_config(config: &EmbedderConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    #[cfg(any(feature = "ollama", feature = "openai"))]
    {
        Ok(Arc::new(crate::embed_client::EmbeddingClient::new(config)?))
    }
    #[cfg(not(any(feature = "ollama", feature = "openai")))]
    {
        Err(RagError::ConfigError(format!(
            "the {} embedding backend requires the `ollama` or `openai` feature",
            config.backend
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_vector() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert!(is_unit(&v));
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut v = vec![0.2, -0.5, 0.9, 0.1];
        normalize(&mut v).unwrap();
        let once = v.clone();
        normalize(&mut v).unwrap();
        for (a, b) in once.iter().zip(&v) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_vector_cannot_be_normalized() {
        let mut v = vec![0.0; 8];
        assert!(matches!(normalize(&mut v), Err(RagError::EmbeddingError { .. })));
    }
}
