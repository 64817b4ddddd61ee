//! Predefined analyst questions and their retrieval queries.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// An ordered list of analyst questions with a parallel list of retrieval queries.
///
/// The question is what the generator is asked; the retrieval query is what
/// the index is searched with. They may differ, but the lists must be the same
/// length. When `retrieval_queries` is absent from the JSON, each question is
/// used as its own query.
///
/// ```json
/// {
///   "analyst_questions": ["Which malware family is described?"],
///   "retrieval_queries": ["malware family name"]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionSet {
    /// Questions shown to the generator.
    pub analyst_questions: Vec<String>,
    /// Texts used to search the index, one per question.
    #[serde(default)]
    pub retrieval_queries: Vec<String>,
}

impl QuestionSet {
    /// Create a set from parallel question and query lists.
    ///
    /// Lengths are checked by [`validate`](Self::validate), not here.
    pub fn new(analyst_questions: Vec<String>, retrieval_queries: Vec<String>) -> Self {
        Self { analyst_questions, retrieval_queries }
    }

    /// Create a set where every question is also its own retrieval query.
    pub fn from_questions(questions: Vec<String>) -> Self {
        Self { retrieval_queries: questions.clone(), analyst_questions: questions }
    }

    /// Parse a set from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Json`] for malformed JSON or
    /// [`RagError::ConfigMismatch`] if the lists differ in length.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut set: Self = serde_json::from_str(json)?;
        if set.retrieval_queries.is_empty() {
            set.retrieval_queries = set.analyst_questions.clone();
        }
        set.validate()?;
        Ok(set)
    }

    /// Load a set from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the file cannot be read, otherwise as
    /// [`from_json`](Self::from_json).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Check that every question has exactly one retrieval query.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigMismatch`] when the list lengths differ.
    pub fn validate(&self) -> Result<()> {
        if self.analyst_questions.len() != self.retrieval_queries.len() {
            return Err(RagError::ConfigMismatch {
                questions: self.analyst_questions.len(),
                queries: self.retrieval_queries.len(),
            });
        }
        Ok(())
    }

    /// Number of questions.
    pub fn len(&self) -> usize {
        self.analyst_questions.len()
    }

    /// Whether the set has no questions.
    pub fn is_empty(&self) -> bool {
        self.analyst_questions.is_empty()
    }

    /// `(question, retrieval_query)` pairs in order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.analyst_questions
            .iter()
            .zip(&self.retrieval_queries)
            .map(|(q, r)| (q.as_str(), r.as_str()))
    }
}
