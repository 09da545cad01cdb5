//! In-process sentence encoder (`all-MiniLM-L6-v2`, 384 dimensions).

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

use super::Embedder;
use crate::error::RagError;

/// Output dimension of `all-MiniLM-L6-v2`.
pub const MINILM_DIMENSION: usize = 384;

/// Local ONNX sentence-embedding model, loaded once at startup.
///
/// `TextEmbedding::embed` needs `&mut self`, so the model sits behind a
/// mutex to keep [`Embedder::embed`] usable through a shared reference.
pub struct LocalEmbedder {
    model: Mutex<TextEmbedding>,
}

impl LocalEmbedder {
    /// Loads `all-MiniLM-L6-v2`, downloading weights on first use.
    pub fn load() -> Result<Self> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
        )
        .map_err(|err| anyhow!("failed to load all-MiniLM-L6-v2: {err}"))?;
        info!(dimension = MINILM_DIMENSION, "loaded all-MiniLM-L6-v2 sentence encoder");
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl Embedder for LocalEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| RagError::RetrievalUnavailable("encoder mutex poisoned".to_string()))?;
        let mut vectors = model
            .embed(vec![text], None)
            .map_err(|err| RagError::RetrievalUnavailable(format!("local encoder failed: {err}")))?;
        vectors
            .pop()
            .ok_or_else(|| RagError::RetrievalUnavailable("encoder returned no vector".to_string()))
    }
}
