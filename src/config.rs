//! Command-line and environment configuration for the assistant binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::Level;

use crate::error::RagError;
use crate::generator::{GenerationConfig, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::llm::openai::DEFAULT_CHAT_BASE_URL;
use crate::session::DEFAULT_TOP_K;
use crate::startup::ArtifactPaths;

/// Which query encoder to load.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum EmbedderKind {
    /// OpenAI-compatible `/embeddings` endpoint.
    Openai,
    /// In-process all-MiniLM-L6-v2 (requires the `local-embeddings` feature).
    Local,
}

/// Command-line interface for the mandi assistant.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "mandi-sahayak",
    version,
    about = "Answer APMC / mandi rule questions from a prebuilt passage index"
)]
pub struct Cli {
    /// Persisted vector index
    #[arg(long, env = "MANDI_INDEX_PATH", default_value = "faiss.index")]
    pub index: PathBuf,

    /// Metadata records aligned with the index (JSON Lines or JSON array)
    #[arg(long, env = "MANDI_META_PATH", default_value = "meta.jsonl")]
    pub metadata: PathBuf,

    /// Passages retrieved per question
    #[arg(long, env = "MANDI_TOP_K", default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Ask a single question and exit instead of starting the chat loop
    #[arg(long)]
    pub query: Option<String>,

    /// Only print the retrieved context (skip the chat model)
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Query encoder backend. It must be the model that built the index;
    /// startup halts when its vectors do not match the index dimension
    #[arg(long, value_enum, env = "MANDI_EMBEDDER", default_value = "openai")]
    pub embedder: EmbedderKind,

    /// Base URL for the OpenAI-compatible embeddings API
    #[arg(
        long,
        env = "MANDI_EMBED_BASE",
        default_value = "https://api.openai.com/v1"
    )]
    pub embed_base_url: String,

    /// Embedding model identifier. Must be the model that built the index:
    /// vectors from another model can share its dimension and still rank
    /// unrelated passages first
    #[arg(long, env = "MANDI_EMBED_MODEL", default_value = "text-embedding-3-small")]
    pub embed_model: String,

    /// API key for the embeddings endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub embed_api_key: Option<String>,

    /// Dimension requested from the embeddings API. Only sent when set, and
    /// only for models that accept a `dimensions` parameter
    #[arg(long, env = "MANDI_EMBED_DIMENSIONS")]
    pub embed_dimensions: Option<usize>,

    /// Seconds before an embedding request times out
    #[arg(long, env = "MANDI_EMBED_TIMEOUT_SECS", default_value_t = 30)]
    pub embed_timeout_secs: u64,

    /// Attempts for throttled or unreachable embedding requests
    #[arg(long, env = "MANDI_EMBED_MAX_RETRIES", default_value_t = 3)]
    pub embed_max_retries: usize,

    /// Base URL for the OpenAI-compatible chat-completions API
    #[arg(long, env = "MANDI_CHAT_BASE", default_value = DEFAULT_CHAT_BASE_URL)]
    pub chat_base_url: String,

    /// Chat model used to answer
    #[arg(long, env = "MANDI_CHAT_MODEL", default_value = DEFAULT_MODEL)]
    pub chat_model: String,

    /// API key for the chat-completions endpoint
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub chat_api_key: Option<String>,

    /// Sampling temperature for the answer model
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    /// Maximum tokens generated per answer
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: usize,

    /// Seconds before a chat-completion request times out
    #[arg(long, env = "MANDI_CHAT_TIMEOUT_SECS", default_value_t = 60)]
    pub chat_timeout_secs: u64,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Index and metadata locations.
    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::new(self.index.clone(), self.metadata.clone())
    }

    /// Validated decoding configuration.
    pub fn generation_config(&self) -> Result<GenerationConfig, RagError> {
        GenerationConfig::new(self.chat_model.clone(), self.temperature, self.max_tokens)
    }

    /// Embedding request timeout (at least one second).
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs.max(1))
    }

    /// Chat request timeout (at least one second).
    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs.max(1))
    }

    /// Log level implied by `-v` occurrences.
    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}
