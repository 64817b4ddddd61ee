//! Shared mock providers for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cyber_rag::{DocumentSource, EmbeddingProvider, Generator, RagError, Result};

/// Keywords that each own one embedding dimension.
pub const KEYWORDS: [&str; 6] = ["malware", "cookie", "credential", "domain", "ransom", "phish"];

/// Deterministic embedder: one dimension per keyword occurrence count plus a
/// small constant bias so no text embeds to the zero vector.
#[derive(Default)]
pub struct KeywordEmbedder {
    texts_embedded: AtomicUsize,
    calls: AtomicUsize,
    fail: bool,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// An embedder whose every call fails.
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    /// Number of provider calls (single or batch).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of texts embedded across all calls.
    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> =
            KEYWORDS.iter().map(|kw| lower.matches(kw).count() as f32).collect();
        vector.push(0.1);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts_embedded.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::EmbeddingError {
                provider: "keyword".into(),
                message: "embedding backend down".into(),
            });
        }
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        if self.fail {
            return Err(RagError::EmbeddingError {
                provider: "keyword".into(),
                message: "embedding backend down".into(),
            });
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len() + 1
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// A recorded generator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorCall {
    pub question: String,
    pub context: String,
}

/// Generator that replays scripted replies and records what it was asked.
///
/// `None` in the script makes that call fail. When the script runs out the
/// generator answers `answer to <question>`.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Option<String>>>,
    calls: Mutex<Vec<GeneratorCall>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<Option<&str>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().map(|s| s.map(str::to_string)).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<GeneratorCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_answer(&self, question: &str, context: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push(GeneratorCall { question: question.to_string(), context: context.to_string() });

        match self.script.lock().unwrap().pop_front() {
            Some(Some(reply)) => Ok(reply),
            Some(None) => Err(RagError::GenerationError {
                provider: "scripted".into(),
                message: "model overloaded".into(),
            }),
            None => Ok(format!("answer to {question}")),
        }
    }
}

/// A document source that never finds anything.
pub struct NoSource;

#[async_trait]
impl DocumentSource for NoSource {
    async fn textual_content(&self, _url: &str) -> Option<String> {
        None
    }
}

/// A document source that serves fixed text.
pub struct StaticSource(pub String);

#[async_trait]
impl DocumentSource for StaticSource {
    async fn textual_content(&self, _url: &str) -> Option<String> {
        Some(self.0.clone())
    }
}

/// A short threat report whose sentences each land in their own chunk with a
/// 12-word sentence window.
pub const REPORT: &str = "Acme Stealer is a new malware family. \
It steals browser cookie data and saved credential stores. \
The operators register the domain evil-example for command and control. \
The weather in the report was sunny.";
