//! Query encoders that turn text into index-compatible vectors.

use crate::error::RagError;

#[cfg(feature = "local-embeddings")]
pub mod local;
pub mod openai;

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;
pub use openai::OpenAiEmbedder;

/// Maps a string to a fixed-length embedding.
///
/// Implementations must produce vectors of the dimension the persisted index
/// was built with; the retriever reports a mismatch as a retrieval failure.
pub trait Embedder {
    /// Encodes a single query string.
    fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        (**self).embed(text)
    }
}
