//! # cyber-rag
//!
//! Retrieval-augmented question answering over a single cybersecurity blog post.
//!
//! ## Overview
//!
//! Each document is processed in one pass:
//!
//! 1. a [`Chunker`] splits the text into ordered [`Chunk`]s
//! 2. an [`Embedder`] maps every chunk to a unit-length vector
//! 3. a [`VectorIndex`] ranks chunks by cosine similarity to a query
//! 4. the [`Retriever`] keeps chunks above the relevance threshold, falling
//!    back to the single best match when none qualifies
//! 5. a [`Generator`] answers from the joined context
//!
//! [`RagPipeline`] drives the whole flow for one question ([`RagPipeline::run`])
//! or for a predefined [`QuestionSet`] ([`RagPipeline::run_all`]).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cyber_rag::{EmbedderConfig, GeneratorConfig, QuestionSet, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedder_config(EmbedderConfig::default())
//!     .generator_config(GeneratorConfig::ollama("phi3"))
//!     .questions(QuestionSet::load("questions.json")?)
//!     .build()?;
//!
//! for answer in pipeline.run_all(&article_text).await? {
//!     println!("{}: {}", answer.question, answer.answer);
//! }
//! ```
//!
//! ## Features
//!
//! | Feature | Enables |
//! |---------|---------|
//! | `ollama` (default) | Ollama embeddings and chat |
//! | `openai` | OpenAI-compatible embeddings and hosted chat |
//! | `fetch` | [`HttpDocumentSource`] for downloading and cleaning blog pages |
//! | `full` | all of the above |

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod generation;
pub mod index;
pub mod pipeline;
pub mod questions;
pub mod retriever;
pub mod source;

#[cfg(any(feature = "ollama", feature = "openai"))]
pub mod chat;
#[cfg(any(feature = "ollama", feature = "openai"))]
pub mod embed_client;
#[cfg(any(feature = "ollama", feature = "openai"))]
mod http;

pub use chunking::{
    Chunker, FixedSizeChunker, RecursiveChunker, SentenceWindowChunker, chunk_text, chunker_for,
    chunker_from_config, count_tokens,
};
pub use config::{
    ChunkingStrategy, EmbedderConfig, EmbeddingBackend, GeneratorConfig, Provider, RagConfig,
    RagConfigBuilder,
};
pub use document::{AnsweredQuestion, Chunk, SearchResult};
pub use embedding::{Embedder, EmbeddingProvider, normalize, provider_from_config};
pub use error::{RagError, Result};
pub use eval::{AnswerEvaluator, EvalExample, EvalRecord, Verdict};
pub use generation::{
    ChatModel, DEFAULT_SYSTEM_PROMPT, Generator, LlmGenerator, PromptTemplate,
    generator_from_config,
};
pub use index::VectorIndex;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use questions::QuestionSet;
pub use retriever::{Retrieval, Retriever};
pub use source::DocumentSource;

#[cfg(any(feature = "ollama", feature = "openai"))]
pub use chat::ChatClient;
#[cfg(any(feature = "ollama", feature = "openai"))]
pub use embed_client::EmbeddingClient;
#[cfg(feature = "fetch")]
pub use source::{HttpDocumentSource, html_to_text};
