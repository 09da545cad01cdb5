//! Error taxonomy shared by the retrieval and generation stages.

use std::fmt;
use std::path::PathBuf;

/// Failures surfaced by the assistant pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum RagError {
    /// A persisted artifact (vector index or metadata) is missing or unreadable.
    IndexUnavailable {
        /// Artifact path that failed to load.
        path: PathBuf,
        /// Human-readable cause.
        reason: String,
    },
    /// The embedding backend or the vector search failed during a turn.
    RetrievalUnavailable(String),
    /// The chat-completion call failed (network, auth, quota, bad payload).
    GenerationFailed(String),
    /// Caller supplied an argument outside the accepted domain.
    InvalidInput(String),
}

impl RagError {
    pub(crate) fn index_unavailable(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::IndexUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for RagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexUnavailable { path, reason } => {
                write!(f, "index unavailable ({}): {reason}", path.display())
            }
            Self::RetrievalUnavailable(msg) => write!(f, "retrieval unavailable: {msg}"),
            Self::GenerationFailed(msg) => write!(f, "generation failed: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl std::error::Error for RagError {}
