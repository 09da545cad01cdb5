#![warn(missing_docs)]
//! Retrieval-augmented Q&A over APMC / mandi rule passages.
//!
//! A question is embedded, matched against a prebuilt [`FlatIndex`], and the
//! aligned [`PassageRecord`]s are handed to a chat-completion model that must
//! answer from that context alone, in Hindi or English.

pub mod config;
pub mod embedder;
pub mod error;
pub mod generator;
pub mod index;
pub mod llm;
pub mod passage;
pub mod retriever;
pub mod session;
pub mod startup;

pub use config::{Cli, EmbedderKind};
pub use embedder::{Embedder, OpenAiEmbedder};
pub use error::RagError;
pub use generator::{render_context, AnswerGenerator, GenerationConfig};
pub use index::{FlatIndex, Neighbour};
pub use llm::{ChatMessage, ChatProvider, OpenAiChatProvider, ProviderRequest};
pub use passage::{MetadataStore, PassageRecord};
pub use retriever::{RetrievedPassage, Retriever};
pub use session::{Assistant, ConversationMessage, Sender, Session, TurnOutcome};
pub use startup::{ArtifactPaths, Startup, StartupState};
