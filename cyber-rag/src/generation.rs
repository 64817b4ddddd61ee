//! Answer generation from a question and retrieved context.
//!
//! [`Generator`] is the seam the pipeline depends on. [`LlmGenerator`] is the
//! standard implementation: it renders a [`PromptTemplate`] and sends it to a
//! [`ChatModel`] such as [`ChatClient`](crate::ChatClient).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::GeneratorConfig;
use crate::error::{RagError, Result};

/// System prompt sent with every answer request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a cybersecurity assistant.";

/// Prompt used to extract an answer from retrieved blog passages.
pub const EXTRACT_QA_PROMPT: &str = "\
You are given excerpts from a cybersecurity blog post.

Excerpts:
{context}

Using only the excerpts above, answer the question below. Be concise and \
specific: name malware families, threat actors, techniques, domains, IP \
addresses and file names exactly as they appear. If the excerpts do not \
contain the answer, reply \"Not mentioned in the article.\"

Question: {question}

Answer:";

/// Turns a question and its retrieved context into an answer.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Short name of the model behind this generator.
    fn name(&self) -> &str;

    /// Generate an answer to `question` grounded in `context`.
    async fn generate_answer(&self, question: &str, context: &str) -> Result<String>;
}

/// A chat-style language model: one system message, one user message, one reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model name.
    fn name(&self) -> &str;

    /// Send `prompt` with the given system message and return the reply text.
    async fn chat(&self, system: &str, prompt: &str) -> Result<String>;
}

/// A prompt with `{context}` and `{question}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self { template: EXTRACT_QA_PROMPT.to_string() }
    }
}

impl PromptTemplate {
    /// Create a template from text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if either placeholder is missing.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in ["{context}", "{question}"] {
            if !template.contains(placeholder) {
                return Err(RagError::ConfigError(format!(
                    "prompt template is missing the {placeholder} placeholder"
                )));
            }
        }
        Ok(Self { template })
    }

    /// Load a template from a text file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(std::fs::read_to_string(path)?)
    }

    /// Fill the placeholders with the trimmed context and question.
    pub fn render(&self, question: &str, context: &str) -> String {
        fill_placeholders(
            &self.template,
            &[("context", context.trim()), ("question", question.trim())],
        )
    }
}

/// Replace each `{name}` in `template` with its value in a single scan.
///
/// Inserted values are never rescanned, so text that itself contains a
/// placeholder is passed through unchanged. Unknown `{...}` spans are kept.
pub(crate) fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let hit = values.iter().find(|(name, _)| {
            tail.strip_prefix(name).is_some_and(|after| after.starts_with('}'))
        });
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

/// A [`Generator`] that prompts a [`ChatModel`].
pub struct LlmGenerator {
    model: Arc<dyn ChatModel>,
    prompt: PromptTemplate,
    system_prompt: String,
}

impl LlmGenerator {
    /// Create a generator with the default prompt and system message.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            prompt: PromptTemplate::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Replace the prompt template.
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    /// Replace the system message.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    fn name(&self) -> &str {
        self.model.name()
    }

    async fn generate_answer(&self, question: &str, context: &str) -> Result<String> {
        let prompt = self.prompt.render(question, context);
        debug!(model = self.model.name(), prompt_len = prompt.len(), "generating answer");
        let answer = self.model.chat(&self.system_prompt, &prompt).await?;
        Ok(answer.trim().to_string())
    }
}

/// Build an [`LlmGenerator`] over the chat client described by `config`.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] for an invalid configuration or when no
/// HTTP provider feature is enabled.
pub fn generator_from_config(config: &GeneratorConfig) -> Result<Arc<dyn Generator>> {
    #[cfg(any(feature = "ollama", feature = "openai"))]
    {
        let client = crate::chat::ChatClient::new(config)?;
        Ok(Arc::new(LlmGenerator::new(Arc::new(client))))
    }
    #[cfg(not(any(feature = "ollama", feature = "openai")))]
    {
        let _ = config;
        Err(RagError::ConfigError(
            "chat providers require the `ollama` or `openai` feature".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_and_trims_placeholders() {
        let prompt = PromptTemplate::new("C: {context}\nQ: {question}").unwrap();
        assert_eq!(prompt.render("  What?  ", "\nctx\n"), "C: ctx\nQ: What?");
    }

    #[test]
    fn placeholders_inside_context_are_left_alone() {
        let prompt = PromptTemplate::new("C: {context}\nQ: {question}").unwrap();
        assert_eq!(
            prompt.render("What?", "template uses {question} literally"),
            "C: template uses {question} literally\nQ: What?"
        );
        assert_eq!(
            prompt.render("Is {context} a variable?", "ctx"),
            "C: ctx\nQ: Is {context} a variable?"
        );
    }

    #[test]
    fn unknown_braces_are_kept() {
        let filled = fill_placeholders("{\"grade\": {x}} {a}", &[("a", "1")]);
        assert_eq!(filled, "{\"grade\": {x}} 1");
    }

    #[test]
    fn template_requires_both_placeholders() {
        assert!(PromptTemplate::new("only {context}").is_err());
        assert!(PromptTemplate::new("only {question}").is_err());
    }

    #[test]
    fn default_template_is_valid() {
        assert!(PromptTemplate::new(EXTRACT_QA_PROMPT).is_ok());
    }
}
