mod commands;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use cyber_rag::{
    ChunkingStrategy, EmbedderConfig, EmbeddingBackend, GeneratorConfig, Provider, RagConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "cyber-rag",
    about = "Answer analyst questions about a cybersecurity blog post",
    version
)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text", env = "CYBER_RAG_LOG_FORMAT")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Model, embedding and retrieval settings shared by every subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct Settings {
    /// Chat provider for answer generation
    #[arg(long, global = true, default_value = "ollama", env = "CYBER_RAG_PROVIDER")]
    pub provider: Provider,

    /// Chat model name
    #[arg(long, global = true, default_value = cyber_rag::config::DEFAULT_CHAT_MODEL, env = "CYBER_RAG_MODEL")]
    pub model: String,

    /// Sampling temperature
    #[arg(long, global = true, default_value_t = 0.2, env = "CYBER_RAG_TEMPERATURE")]
    pub temperature: f32,

    /// Maximum tokens per answer
    #[arg(long, global = true, default_value_t = 512, env = "CYBER_RAG_MAX_TOKENS")]
    pub max_tokens: u32,

    /// Chat endpoint base URL (required for hosted providers)
    #[arg(long, global = true, env = "CYBER_RAG_BASE_URL")]
    pub base_url: Option<String>,

    /// API key for hosted providers
    #[arg(long, global = true, env = "CYBER_RAG_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Embedding backend
    #[arg(long, global = true, default_value = "ollama", env = "CYBER_RAG_EMBED_BACKEND")]
    pub embed_backend: EmbeddingBackend,

    /// Embedding model (backend default when unset)
    #[arg(long, global = true, env = "CYBER_RAG_EMBED_MODEL")]
    pub embed_model: Option<String>,

    /// Embedding endpoint base URL
    #[arg(long, global = true, env = "CYBER_RAG_EMBED_URL")]
    pub embed_url: Option<String>,

    /// API key for the OpenAI embedding backend
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub embed_api_key: Option<String>,

    /// Embedding request timeout in seconds
    #[arg(long, global = true, default_value_t = 60, env = "CYBER_RAG_EMBED_TIMEOUT")]
    pub embed_timeout: u64,

    /// Chunking strategy: sentence_window, recursive or fixed_size
    #[arg(long, global = true, default_value = "sentence_window", env = "CYBER_RAG_STRATEGY")]
    pub strategy: ChunkingStrategy,

    /// Maximum words per chunk
    #[arg(long, global = true, default_value_t = 100, env = "CYBER_RAG_CHUNK_SIZE")]
    pub chunk_size: usize,

    /// Fraction of a chunk repeated in the next one
    #[arg(long, global = true, default_value_t = 0.2, env = "CYBER_RAG_OVERLAP")]
    pub overlap: f32,

    /// Candidates retrieved per question
    #[arg(long, global = true, default_value_t = 4, env = "CYBER_RAG_TOP_K")]
    pub top_k: usize,

    /// Minimum similarity for a chunk to count as relevant
    #[arg(long, global = true, default_value_t = 0.2, env = "CYBER_RAG_THRESHOLD")]
    pub threshold: f32,
}

impl Settings {
    pub fn rag_config(&self) -> cyber_rag::Result<RagConfig> {
        RagConfig::builder()
            .strategy(self.strategy)
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.overlap)
            .top_k(self.top_k)
            .similarity_threshold(self.threshold)
            .build()
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            provider: self.provider,
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            ..GeneratorConfig::default()
        }
    }

    pub fn embedder_config(&self) -> EmbedderConfig {
        EmbedderConfig {
            backend: self.embed_backend,
            model: self.embed_model.clone(),
            base_url: self.embed_url.clone(),
            api_key: self.embed_api_key.clone(),
            dimensions: None,
            timeout_secs: self.embed_timeout,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a blog post and answer the predefined analyst questions
    Extract {
        /// Blog post URL (prompted for when omitted)
        #[arg(long)]
        url: Option<String>,
        /// Question set JSON (built-in set when omitted)
        #[arg(long)]
        questions: Option<PathBuf>,
        /// Write the answers to this JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print JSON instead of panels
        #[arg(long)]
        json: bool,
    },

    /// Ask one question about a blog post or a local text file
    Ask {
        /// Blog post URL
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        url: Option<String>,
        /// Plain-text document
        #[arg(long)]
        file: Option<PathBuf>,
        /// The question to answer
        #[arg(long, short)]
        question: String,
    },

    /// Answer a labelled JSONL dataset and grade the answers with a judge model
    Evaluate {
        /// JSONL dataset with article text and question-answer pairs
        #[arg(long)]
        dataset: PathBuf,
        /// Where to write graded results
        #[arg(long, default_value = "answers_with_rag.json")]
        output: PathBuf,
        /// Answer at most this many examples
        #[arg(long)]
        limit: Option<usize>,
        /// Judge model (defaults to the chat model)
        #[arg(long)]
        judge_model: Option<String>,
        /// Skip grading and only record answers
        #[arg(long)]
        no_judge: bool,
    },

    /// Grade answers saved by `evaluate --no-judge`
    Grade {
        /// Answers JSON written by `evaluate`
        #[arg(long, default_value = "answers_with_rag.json")]
        answers: PathBuf,
        /// Where to write graded results
        #[arg(long, default_value = "evaluation_results.json")]
        output: PathBuf,
        /// Judge model (defaults to the chat model)
        #[arg(long)]
        judge_model: Option<String>,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Extract { url, questions, output, json } => {
            commands::extract(&cli.settings, url, questions, output, json).await
        }
        Command::Ask { url, file, question } => {
            commands::ask(&cli.settings, url, file, &question).await
        }
        Command::Evaluate { dataset, output, limit, judge_model, no_judge } => {
            commands::evaluate(&cli.settings, &dataset, &output, limit, judge_model, no_judge).await
        }
        Command::Grade { answers, output, judge_model } => {
            commands::grade(&cli.settings, &answers, &output, judge_model).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn settings_map_to_configs() {
        let cli = Cli::parse_from([
            "cyber-rag",
            "--provider",
            "hosted",
            "--model",
            "llama-3-70b",
            "--base-url",
            "https://llm.example/v1",
            "--api-key",
            "k",
            "--top-k",
            "2",
            "--strategy",
            "recursive",
            "ask",
            "--file",
            "post.txt",
            "-q",
            "Who?",
        ]);

        let generator = cli.settings.generator_config();
        assert_eq!(generator.provider, Provider::Hosted);
        assert_eq!(generator.model, "llama-3-70b");
        assert!(generator.validate().is_ok());

        let config = cli.settings.rag_config().unwrap();
        assert_eq!(config.top_k, 2);
        assert_eq!(cli.settings.embedder_config().timeout_secs, 60);
        assert_eq!(config.strategy, ChunkingStrategy::Recursive);
    }

    #[test]
    fn grade_defaults_to_saved_answers() {
        let cli = Cli::parse_from(["cyber-rag", "grade", "--judge-model", "granite"]);
        let Command::Grade { answers, output, judge_model } = cli.command else {
            panic!("expected the grade subcommand");
        };
        assert_eq!(answers, PathBuf::from("answers_with_rag.json"));
        assert_eq!(output, PathBuf::from("evaluation_results.json"));
        assert_eq!(judge_model.as_deref(), Some("granite"));
    }

    #[test]
    fn ask_needs_a_document() {
        assert!(Cli::try_parse_from(["cyber-rag", "ask", "-q", "Who?"]).is_err());
        assert!(
            Cli::try_parse_from(["cyber-rag", "ask", "--url", "u", "--file", "f", "-q", "Who?"])
                .is_err()
        );
    }
}
