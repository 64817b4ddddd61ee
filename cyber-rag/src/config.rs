//! Configuration for chunking, retrieval, embedding and generation.
//!
//! Every knob is passed explicitly: [`RagConfig`] for the retrieval core,
//! [`EmbedderConfig`] for the embedding backend and [`GeneratorConfig`] for the
//! chat model. Nothing is read from the process environment here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// How a document is split into chunks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Pack whole sentences into a sliding window.
    #[default]
    SentenceWindow,
    /// Split paragraphs, then sentences, then words until pieces fit.
    Recursive,
    /// Fixed word windows regardless of sentence boundaries.
    FixedSize,
}

impl ChunkingStrategy {
    /// The configuration name of this strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SentenceWindow => "sentence_window",
            Self::Recursive => "recursive",
            Self::FixedSize => "fixed_size",
        }
    }
}

impl fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkingStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sentence_window" | "sentence" => Ok(Self::SentenceWindow),
            "recursive" => Ok(Self::Recursive),
            "fixed_size" | "fixed" => Ok(Self::FixedSize),
            other => Err(format!(
                "unknown chunking strategy '{other}' (expected sentence_window, recursive or fixed_size)"
            )),
        }
    }
}

/// Configuration parameters for the retrieval core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Chunking strategy.
    pub strategy: ChunkingStrategy,
    /// Approximate maximum chunk length in tokens (whitespace-delimited words).
    pub chunk_size: usize,
    /// Fraction of `chunk_size` repeated between consecutive chunks, in `[0, 1)`.
    pub chunk_overlap: f32,
    /// Number of candidates to retrieve per question.
    pub top_k: usize,
    /// Minimum similarity for a candidate to count as relevant.
    pub similarity_threshold: f32,
    /// Separator placed between retrieved chunks in the generator context.
    pub context_separator: String,
    /// Number of texts sent to the embedding provider per call.
    pub embed_batch_size: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::SentenceWindow,
            chunk_size: 100,
            chunk_overlap: 0.2,
            top_k: 4,
            similarity_threshold: 0.2,
            context_separator: "\n".to_string(),
            embed_batch_size: 32,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Number of tokens shared between consecutive chunks.
    pub fn overlap_tokens(&self) -> usize {
        overlap_tokens(self.chunk_size, self.chunk_overlap)
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap` is outside `[0, 1)`
    /// - `top_k == 0`
    /// - `similarity_threshold` is outside `[-1, 1]`
    /// - `embed_batch_size == 0`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if !(0.0..1.0).contains(&self.chunk_overlap) {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be a fraction in [0, 1)",
                self.chunk_overlap
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RagError::ConfigError(format!(
                "similarity_threshold ({}) must be within [-1, 1]",
                self.similarity_threshold
            )));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embed_batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Overlap budget in tokens for a chunk size and overlap fraction.
pub(crate) fn overlap_tokens(chunk_size: usize, overlap: f32) -> usize {
    let tokens = (chunk_size as f64 * f64::from(overlap.clamp(0.0, 1.0))).floor() as usize;
    tokens.min(chunk_size.saturating_sub(1))
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the chunking strategy.
    pub fn strategy(mut self, strategy: ChunkingStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set the approximate maximum chunk size in tokens.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks as a fraction of the chunk size.
    pub fn chunk_overlap(mut self, overlap: f32) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of candidates retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity for a candidate to count as relevant.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the separator used to join retrieved chunks into a context string.
    pub fn context_separator(mut self, separator: impl Into<String>) -> Self {
        self.config.context_separator = separator.into();
        self
    }

    /// Set the number of texts per embedding call.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Chat model provider used for answer generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// A local Ollama server.
    #[default]
    Ollama,
    /// A hosted OpenAI-compatible chat completions endpoint.
    Hosted,
}

impl Provider {
    /// The configuration name of this provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Hosted => "hosted",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hosted" => Ok(Self::Hosted),
            other => Err(format!("unknown provider '{other}' (expected ollama or hosted)")),
        }
    }
}

/// Default Ollama chat model.
pub const DEFAULT_CHAT_MODEL: &str = "phi3";

/// Configuration for the answer-generation chat model.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratorConfig {
    /// Which backend serves the model.
    pub provider: Provider,
    /// Model name as understood by the provider.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Override for the provider's base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// API key for hosted providers.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.2,
            max_tokens: 512,
            base_url: None,
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl GeneratorConfig {
    /// Configuration for a local Ollama model.
    pub fn ollama(model: impl Into<String>) -> Self {
        Self { model: model.into(), ..Self::default() }
    }

    /// Configuration for a hosted OpenAI-compatible model.
    pub fn hosted(
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            provider: Provider::Hosted,
            model: model.into(),
            base_url: Some(base_url.into()),
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the generation token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the provider base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Check that the configuration can be used to build a client.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for an empty model name, a temperature
    /// outside `[0, 2]`, a zero token limit, or a hosted provider without a base
    /// URL or API key.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(RagError::ConfigError("model must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::ConfigError(format!(
                "temperature ({}) must be within [0, 2]",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(RagError::ConfigError("max_tokens must be greater than zero".to_string()));
        }
        if self.provider == Provider::Hosted {
            if self.base_url.as_deref().is_none_or(|u| u.trim().is_empty()) {
                return Err(RagError::ConfigError(
                    "hosted provider requires a base_url".to_string(),
                ));
            }
            if self.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
                return Err(RagError::ConfigError("hosted provider requires an api_key".to_string()));
            }
        }
        Ok(())
    }
}

/// Embedding backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Ollama `/api/embed`.
    #[default]
    Ollama,
    /// OpenAI-compatible `/embeddings`.
    OpenAI,
}

impl EmbeddingBackend {
    /// The configuration name of this backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
        }
    }
}

impl fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            other => Err(format!("unknown embedding backend '{other}' (expected ollama or openai)")),
        }
    }
}

fn default_embed_timeout() -> u64 {
    60
}

/// Configuration for the sentence-embedding backend.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedderConfig {
    /// Which backend computes embeddings.
    pub backend: EmbeddingBackend,
    /// Model name; `None` uses the backend default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Override for the backend base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// API key for the OpenAI backend.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Output dimensionality override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    /// Request timeout in seconds.
    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: None,
            base_url: None,
            api_key: None,
            dimensions: None,
            timeout_secs: default_embed_timeout(),
        }
    }
}

impl EmbedderConfig {
    /// Configuration for an OpenAI-compatible embedding endpoint.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            backend: EmbeddingBackend::OpenAI,
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Override the backend base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Check that the configuration can be used to build a client.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for a zero timeout, a zero dimension
    /// override, or an OpenAI backend without an API key.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(RagError::ConfigError(
                "embedding timeout must be greater than zero".to_string(),
            ));
        }
        if self.dimensions == Some(0) {
            return Err(RagError::ConfigError("embedding dimensions must be greater than zero".to_string()));
        }
        if self.backend == EmbeddingBackend::OpenAI
            && self.api_key.as_deref().is_none_or(|k| k.trim().is_empty())
        {
            return Err(RagError::ConfigError("openai embedding backend requires an api_key".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for EmbedderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedderConfig")
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("dimensions", &self.dimensions)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config, RagConfig::default());
        assert_eq!(config.top_k, 4);
        assert_eq!(config.overlap_tokens(), 20);
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert!(RagConfig::builder().chunk_size(0).build().is_err());
        assert!(RagConfig::builder().chunk_overlap(1.0).build().is_err());
        assert!(RagConfig::builder().chunk_overlap(-0.1).build().is_err());
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().similarity_threshold(1.5).build().is_err());
        assert!(RagConfig::builder().embed_batch_size(0).build().is_err());
    }

    #[test]
    fn overlap_never_consumes_whole_window() {
        assert_eq!(overlap_tokens(1, 0.9), 0);
        assert_eq!(overlap_tokens(10, 0.99), 9);
        assert_eq!(overlap_tokens(100, 0.0), 0);
    }

    #[test]
    fn strategy_and_provider_parse() {
        assert_eq!("sentence-window".parse::<ChunkingStrategy>(), Ok(ChunkingStrategy::SentenceWindow));
        assert_eq!("Recursive".parse::<ChunkingStrategy>(), Ok(ChunkingStrategy::Recursive));
        assert!("paragraph".parse::<ChunkingStrategy>().is_err());
        assert_eq!("HOSTED".parse::<Provider>(), Ok(Provider::Hosted));
        assert_eq!("openai".parse::<EmbeddingBackend>(), Ok(EmbeddingBackend::OpenAI));
    }

    #[test]
    fn embedder_config_validation() {
        assert!(EmbedderConfig::default().validate().is_ok());
        assert_eq!(EmbedderConfig::default().timeout_secs, 60);
        assert!(EmbedderConfig::default().with_timeout_secs(0).validate().is_err());
        assert!(EmbedderConfig::openai("sk-test").validate().is_ok());
        assert!(EmbedderConfig::openai(" ").validate().is_err());

        let parsed: EmbedderConfig = serde_json::from_str(r#"{"backend": "ollama"}"#).unwrap();
        assert_eq!(parsed, EmbedderConfig::default());
    }

    #[test]
    fn hosted_generator_requires_credentials() {
        let mut config = GeneratorConfig::hosted("llama-3", "https://llm.example.com/v1", "key");
        assert!(config.validate().is_ok());
        config.api_key = None;
        assert!(config.validate().is_err());
        assert!(GeneratorConfig::ollama("").validate().is_err());
        assert!(GeneratorConfig::default().with_temperature(3.0).validate().is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = GeneratorConfig::hosted("m", "https://x", "secret-key");
        assert!(!format!("{config:?}").contains("secret-key"));
    }
}
