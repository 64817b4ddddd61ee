//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] answers questions about one document at a time by
//! composing a [`Chunker`], an [`Embedder`] and a [`Generator`]. Every call
//! builds a fresh [`Retriever`] for its document and drops it on return.
//!
//! # Example
//!
//! ```rust,ignore
//! use cyber_rag::{GeneratorConfig, QuestionSet, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .generator_config(GeneratorConfig::ollama("phi3"))
//!     .questions(QuestionSet::load("questions.json")?)
//!     .build()?;
//!
//! let answer = pipeline.run(&article, "Which malware is described?").await?;
//! let report = pipeline.run_all(&article).await?;
//! ```

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::chunking::{Chunker, chunker_from_config};
use crate::config::{EmbedderConfig, GeneratorConfig, RagConfig};
use crate::document::AnsweredQuestion;
use crate::embedding::{Embedder, EmbeddingProvider, provider_from_config};
use crate::error::{RagError, Result};
use crate::generation::{Generator, generator_from_config};
use crate::questions::QuestionSet;
use crate::retriever::{Retrieval, Retriever};
use crate::source::DocumentSource;

/// The RAG pipeline orchestrator.
///
/// Coordinates indexing (chunk → embed → build) and answering
/// (embed query → search → select → generate). Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedder: Embedder,
    chunker: Arc<dyn Chunker>,
    generator: Arc<dyn Generator>,
    questions: Option<QuestionSet>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return the embedder used for chunks and queries.
    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    /// Return the answer generator.
    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// Return the predefined question set, if one was configured.
    pub fn questions(&self) -> Option<&QuestionSet> {
        self.questions.as_ref()
    }

    /// Answer a single question about `document`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyDocument`] if the document yields no chunks,
    /// [`RagError::GenerationError`] if the generator fails, or any embedding
    /// or index error.
    pub async fn run(&self, document: &str, question: &str) -> Result<String> {
        let retriever = self.index_document(document).await?;
        let (context, _) = self.retrieve(&retriever, question).await?;

        self.generator.generate_answer(question, &context).await.inspect_err(|e| {
            error!(generator = self.generator.name(), error = %e, "answer generation failed");
        })
    }

    /// Answer a single question and report the context it was answered from.
    ///
    /// The result is numbered 1 and uses the question as its own retrieval
    /// query. A generation failure is recorded in the result, not returned.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyDocument`] or any embedding or index error.
    pub async fn answer(&self, document: &str, question: &str) -> Result<AnsweredQuestion> {
        let retriever = self.index_document(document).await?;
        self.answer_with(&retriever, 1, question, question).await
    }

    /// Answer every predefined question about `document`, in order.
    ///
    /// The question set is checked before the document is touched. The index
    /// is built once and shared by all questions. A generation failure is
    /// recorded on that question's result and the batch continues.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if no question set is configured,
    /// [`RagError::ConfigMismatch`] if its lists differ in length,
    /// [`RagError::EmptyDocument`] if the document yields no chunks, or any
    /// embedding or index error.
    pub async fn run_all(&self, document: &str) -> Result<Vec<AnsweredQuestion>> {
        let questions = self.question_set()?;
        let retriever = self.index_document(document).await?;

        let mut answers = Vec::with_capacity(questions.len());
        for (position, (question, query)) in questions.pairs().enumerate() {
            answers.push(self.answer_with(&retriever, position + 1, question, query).await?);
        }

        let failed = answers.iter().filter(|a| a.is_error()).count();
        let low_confidence = answers.iter().filter(|a| a.low_confidence).count();
        info!(answered = answers.len(), failed, low_confidence, "question batch completed");

        Ok(answers)
    }

    /// Fetch `url` through `source` and answer every predefined question about it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyDocument`] without chunking anything when the
    /// source yields no text, otherwise as [`run_all`](Self::run_all).
    pub async fn run_all_from_source(
        &self,
        source: &dyn DocumentSource,
        url: &str,
    ) -> Result<Vec<AnsweredQuestion>> {
        self.question_set()?;

        let Some(document) = source.textual_content(url).await.filter(|t| !t.trim().is_empty())
        else {
            error!(url, "no textual content extracted");
            return Err(RagError::EmptyDocument);
        };

        self.run_all(&document).await
    }

    fn question_set(&self) -> Result<&QuestionSet> {
        let questions = self
            .questions
            .as_ref()
            .ok_or_else(|| RagError::ConfigError("no question set configured".to_string()))?;
        questions.validate()?;
        Ok(questions)
    }

    async fn index_document(&self, document: &str) -> Result<Retriever> {
        let mut retriever = Retriever::new(self.embedder.clone(), Arc::clone(&self.chunker));
        retriever.prepare_index(document).await?;
        Ok(retriever)
    }

    /// Retrieve context for `query`, returning it with the low-confidence flag.
    async fn retrieve(&self, retriever: &Retriever, query: &str) -> Result<(String, bool)> {
        let retrieval = retriever
            .query(query, self.config.top_k, self.config.similarity_threshold)
            .await?;
        if let Retrieval::NoIndex = retrieval {
            return Err(RagError::IndexNotBuilt);
        }
        Ok((retrieval.context(&self.config.context_separator), retrieval.is_degraded()))
    }

    async fn answer_with(
        &self,
        retriever: &Retriever,
        question_id: usize,
        question: &str,
        query: &str,
    ) -> Result<AnsweredQuestion> {
        let (context, low_confidence) = self.retrieve(retriever, query).await?;

        let (answer, error) = match self.generator.generate_answer(question, &context).await {
            Ok(answer) => (answer, None),
            Err(e) => {
                warn!(question_id, error = %e, "answer generation failed, continuing");
                (format!("Error: {e}"), Some(e.to_string()))
            }
        };

        Ok(AnsweredQuestion {
            question_id,
            question: question.to_string(),
            retrieval_query: query.to_string(),
            context,
            answer,
            low_confidence,
            error,
        })
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, an embedding source and a generator source are required; the
/// chunker defaults to the configured strategy and the question set is
/// optional. Call [`build()`](RagPipelineBuilder::build) to validate and
/// produce the pipeline.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedder_config(EmbedderConfig::default())
///     .generator(Arc::new(generator))
///     .chunker(Arc::new(FixedSizeChunker::new(100, 0.2)))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    embedder_config: Option<EmbedderConfig>,
    generator: Option<Arc<dyn Generator>>,
    generator_config: Option<GeneratorConfig>,
    chunker: Option<Arc<dyn Chunker>>,
    questions: Option<QuestionSet>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider. Takes precedence over [`embedder_config`](Self::embedder_config).
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Describe the embedding provider to construct at build time.
    pub fn embedder_config(mut self, config: EmbedderConfig) -> Self {
        self.embedder_config = Some(config);
        self
    }

    /// Set the answer generator. Takes precedence over [`generator_config`](Self::generator_config).
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Describe the chat model to construct at build time.
    pub fn generator_config(mut self, config: GeneratorConfig) -> Self {
        self.generator_config = Some(config);
        self
    }

    /// Override the chunker selected by the configured strategy.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the predefined questions answered by [`RagPipeline::run_all`].
    pub fn questions(mut self, questions: QuestionSet) -> Self {
        self.questions = Some(questions);
        self
    }

    /// Build the [`RagPipeline`], validating the configuration and required parts.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the configuration is invalid or a
    /// required part is missing, or a provider construction error.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;

        let provider = match (self.embedding_provider, self.embedder_config) {
            (Some(provider), _) => provider,
            (None, Some(embedder_config)) => provider_from_config(&embedder_config)?,
            (None, None) => {
                return Err(RagError::ConfigError(
                    "embedding_provider or embedder_config is required".to_string(),
                ));
            }
        };

        let generator = match (self.generator, self.generator_config) {
            (Some(generator), _) => generator,
            (None, Some(generator_config)) => generator_from_config(&generator_config)?,
            (None, None) => {
                return Err(RagError::ConfigError(
                    "generator or generator_config is required".to_string(),
                ));
            }
        };

        let chunker = self.chunker.unwrap_or_else(|| chunker_from_config(&config));
        let embedder = Embedder::new(provider, config.embed_batch_size);

        Ok(RagPipeline { config, embedder, chunker, generator, questions: self.questions })
    }
}
