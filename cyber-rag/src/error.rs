//! Error types for the `cyber-rag` crate.

use thiserror::Error;

/// Errors that can occur while indexing a document and answering questions about it.
#[derive(Debug, Error)]
pub enum RagError {
    /// The document produced no chunks, so there is nothing to index.
    #[error("Document is empty: nothing to index")]
    EmptyDocument,

    /// A vector index was built from zero chunks.
    #[error("Cannot build an index from zero chunks")]
    EmptyIndex,

    /// A search was issued before the index was built.
    #[error("Index not initialized: search called before build")]
    IndexNotBuilt,

    /// Vectors handed to the index were malformed (length, dimension or norm).
    #[error("Index error: {0}")]
    IndexError(String),

    /// The predefined question list and retrieval query list differ in length.
    #[error(
        "Question set mismatch: {questions} questions but {queries} retrieval queries"
    )]
    ConfigMismatch {
        /// Number of analyst questions.
        questions: usize,
        /// Number of retrieval queries.
        queries: usize,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The answer-generation model failed.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The chat provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Reading a question set or dataset failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A question set or dataset could not be parsed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Answers could not be written as CSV.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
