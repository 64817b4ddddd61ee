//! HTTP chat client for Ollama and hosted OpenAI-compatible models.
//!
//! One [`ChatClient`] type serves both backends; the [`Provider`] tag from
//! [`GeneratorConfig`] picks the wire format when the client is built.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{GeneratorConfig, Provider};
use crate::error::{RagError, Result};
use crate::generation::ChatModel;
use crate::http::{self, OLLAMA_DEFAULT_BASE};

/// A chat model reached over HTTP.
///
/// # Example
///
/// ```rust,ignore
/// use cyber_rag::{ChatClient, ChatModel, GeneratorConfig};
///
/// let client = ChatClient::new(&GeneratorConfig::ollama("mistral"))?;
/// let reply = client.chat("You are terse.", "Say hi").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    provider: Provider,
    model: String,
    temperature: f32,
    max_tokens: u32,
    base_url: String,
    api_key: Option<String>,
}

impl ChatClient {
    /// Build a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the configuration is invalid or the
    /// HTTP client cannot be constructed.
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        config.validate()?;

        let client = http::build_client(config.timeout_secs)?;

        let base_url = match (&config.base_url, config.provider) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Provider::Ollama) => OLLAMA_DEFAULT_BASE.to_string(),
            // validate() guarantees hosted configs carry a base URL
            (None, Provider::Hosted) => String::new(),
        };

        Ok(Self {
            client,
            provider: config.provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// The provider this client talks to.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    fn failure(&self, message: String) -> RagError {
        RagError::GenerationError { provider: self.provider.to_string(), message }
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{path}", self.base_url);
        let provider = self.provider.to_string();
        http::post_json(&self.client, &provider, &url, self.api_key.as_deref(), body)
            .await
            .map_err(|message| self.failure(message))
    }

    async fn chat_ollama(&self, system: &str, prompt: &str) -> Result<String> {
        let body = OllamaChatRequest {
            model: &self.model,
            messages: messages(system, prompt),
            stream: false,
            options: OllamaOptions { temperature: self.temperature, num_predict: self.max_tokens },
        };
        let parsed: OllamaChatResponse = self.post("/api/chat", &body).await?;
        Ok(parsed.message.content)
    }

    async fn chat_hosted(&self, system: &str, prompt: &str) -> Result<String> {
        let body = HostedChatRequest {
            model: &self.model,
            messages: messages(system, prompt),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let parsed: HostedChatResponse = self.post("/chat/completions", &body).await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| self.failure("response contained no choices".to_string()))
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, system: &str, prompt: &str) -> Result<String> {
        debug!(provider = %self.provider, model = %self.model, "sending chat request");
        let reply = match self.provider {
            Provider::Ollama => self.chat_ollama(system, prompt).await?,
            Provider::Hosted => self.chat_hosted(system, prompt).await?,
        };
        Ok(reply.trim().to_string())
    }
}

fn messages<'a>(system: &'a str, prompt: &'a str) -> Vec<Message<'a>> {
    vec![Message { role: "system", content: system }, Message { role: "user", content: prompt }]
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

#[derive(Serialize)]
struct HostedChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct HostedChatResponse {
    choices: Vec<HostedChoice>,
}

#[derive(Deserialize)]
struct HostedChoice {
    message: HostedMessage,
}

#[derive(Deserialize)]
struct HostedMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_defaults_to_local_server() {
        let client = ChatClient::new(&GeneratorConfig::ollama("phi3")).unwrap();
        assert_eq!(client.base_url, OLLAMA_DEFAULT_BASE);
        assert_eq!(client.provider(), Provider::Ollama);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = GeneratorConfig { provider: Provider::Hosted, ..GeneratorConfig::default() };
        assert!(matches!(ChatClient::new(&config), Err(RagError::ConfigError(_))));
    }
}
