//! Data types for chunks, search results and answered questions.

use serde::{Deserialize, Serialize};

/// An ordered segment of a document's text, the unit of retrieval.
///
/// `index` is the chunk's position in the chunker output and is the join key
/// between the chunk list and the rows of a [`VectorIndex`](crate::VectorIndex).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Position of this chunk within its document, starting at zero.
    pub index: usize,
    /// The text content of the chunk.
    pub text: String,
}

impl Chunk {
    /// Create a chunk at the given position.
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self { index, text: text.into() }
    }
}

/// A retrieved [`Chunk`] paired with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score in `[-1, 1]` (higher is more relevant).
    pub score: f32,
}

/// The result of answering one question about one document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnsweredQuestion {
    /// 1-based position of the question in its batch.
    pub question_id: usize,
    /// The question shown to the generator, verbatim.
    pub question: String,
    /// The text used to search the index.
    pub retrieval_query: String,
    /// Retrieved chunk texts joined with the configured separator.
    pub context: String,
    /// The generated answer, or an `Error: ...` marker when generation failed.
    pub answer: String,
    /// True when no chunk cleared the relevance threshold and the best match was used.
    pub low_confidence: bool,
    /// The generation failure message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnsweredQuestion {
    /// Whether generation failed for this question.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
