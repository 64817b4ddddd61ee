//! HTTP embedding client for Ollama and OpenAI-compatible endpoints.
//!
//! Like [`ChatClient`](crate::ChatClient), one type serves both backends and
//! the [`EmbeddingBackend`] tag from [`EmbedderConfig`] picks the wire format.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{EmbedderConfig, EmbeddingBackend};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::http::{self, OLLAMA_DEFAULT_BASE};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Model, base URL and output size used when the configuration leaves them unset.
fn backend_defaults(backend: EmbeddingBackend) -> (&'static str, &'static str, usize) {
    match backend {
        EmbeddingBackend::Ollama => ("all-minilm", OLLAMA_DEFAULT_BASE, 384),
        EmbeddingBackend::OpenAI => ("text-embedding-3-small", OPENAI_API_BASE, 1536),
    }
}

fn backend_enabled(backend: EmbeddingBackend) -> bool {
    match backend {
        EmbeddingBackend::Ollama => cfg!(feature = "ollama"),
        EmbeddingBackend::OpenAI => cfg!(feature = "openai"),
    }
}

/// An [`EmbeddingProvider`] reached over HTTP.
///
/// # Example
///
/// ```rust,ignore
/// use cyber_rag::{EmbedderConfig, EmbeddingClient, EmbeddingProvider};
///
/// let client = EmbeddingClient::new(&EmbedderConfig::default())?;
/// let vectors = client.embed_batch(&["first chunk", "second chunk"]).await?;
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: reqwest::Client,
    backend: EmbeddingBackend,
    model: String,
    base_url: String,
    api_key: Option<String>,
    dimensions: usize,
    /// Sent to OpenAI-compatible hosts for Matryoshka truncation.
    request_dimensions: Option<usize>,
}

impl EmbeddingClient {
    /// Build a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the configuration is invalid, the
    /// backend's feature is disabled, or the HTTP client cannot be built.
    pub fn new(config: &EmbedderConfig) -> Result<Self> {
        config.validate()?;
        if !backend_enabled(config.backend) {
            return Err(RagError::ConfigError(format!(
                "the {0} embedding backend requires the `{0}` feature",
                config.backend
            )));
        }

        let (model, base_url, dimensions) = backend_defaults(config.backend);
        let request_dimensions =
            config.dimensions.filter(|_| config.backend == EmbeddingBackend::OpenAI);

        Ok(Self {
            client: http::build_client(config.timeout_secs)?,
            backend: config.backend,
            model: config.model.clone().unwrap_or_else(|| model.to_string()),
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(base_url)
                .trim_end_matches('/')
                .to_string(),
            api_key: config.api_key.clone(),
            dimensions: config.dimensions.unwrap_or(dimensions),
            request_dimensions,
        })
    }

    /// The backend this client talks to.
    pub fn backend(&self) -> EmbeddingBackend {
        self.backend
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{path}", self.base_url);
        http::post_json(&self.client, self.backend.as_str(), &url, self.api_key.as_deref(), body)
            .await
            .map_err(|message| RagError::EmbeddingError {
                provider: self.backend.to_string(),
                message,
            })
    }

    async fn embed_ollama(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = OllamaEmbedRequest { model: &self.model, input: texts };
        let parsed: OllamaEmbedResponse = self.post("/api/embed", &body).await?;
        Ok(parsed.embeddings)
    }

    async fn embed_openai(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = OpenAIEmbedRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions,
        };
        let parsed: OpenAIEmbedResponse = self.post("/embeddings", &body).await?;

        // Each item carries its input position; hosts are not bound to reply in order.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text]).await?.into_iter().next().ok_or_else(|| {
            RagError::EmbeddingError {
                provider: self.backend.to_string(),
                message: "server returned no embeddings".into(),
            }
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(backend = %self.backend, model = %self.model, batch_size = texts.len(), "embedding batch");
        match self.backend {
            EmbeddingBackend::Ollama => self.embed_ollama(texts).await,
            EmbeddingBackend::OpenAI => self.embed_openai(texts).await,
        }
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        self.backend.as_str()
    }
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct OpenAIEmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct OpenAIEmbedResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(feature = "ollama")]
    fn ollama_defaults() {
        let client = EmbeddingClient::new(&EmbedderConfig::default()).unwrap();
        assert_eq!(client.model, "all-minilm");
        assert_eq!(client.base_url, OLLAMA_DEFAULT_BASE);
        assert_eq!(client.dimensions(), 384);
        assert_eq!(client.request_dimensions, None);
    }

    #[test]
    #[cfg(feature = "ollama")]
    fn dimension_override_is_only_requested_from_openai() {
        let config = EmbedderConfig { dimensions: Some(768), ..EmbedderConfig::default() };
        let client = EmbeddingClient::new(&config).unwrap();
        assert_eq!(client.dimensions(), 768);
        assert_eq!(client.request_dimensions, None);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EmbedderConfig { timeout_secs: 0, ..EmbedderConfig::default() };
        assert!(matches!(EmbeddingClient::new(&config), Err(RagError::ConfigError(_))));
    }
}
