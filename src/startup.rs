//! One-shot process startup: load artifacts, then wire the pipeline.
//!
//! `Uninitialized → IndexLoaded → Ready` when both artifacts load, or
//! `Uninitialized → Halted` when either is missing, unreadable, or the
//! metadata store is empty. `IndexLoaded → Halted` when the query encoder
//! cannot produce vectors of the index's dimension. `Halted` is terminal.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::embedder::Embedder;
use crate::error::RagError;
use crate::generator::{AnswerGenerator, GenerationConfig};
use crate::index::FlatIndex;
use crate::llm::ChatProvider;
use crate::passage::MetadataStore;
use crate::retriever::Retriever;
use crate::session::Assistant;

/// Message shown when startup cannot find usable artifacts.
pub const NO_INDEX_MESSAGE: &str = "⚠️ No index found. Please upload documents and build index.";

/// Text embedded once at attach time to check the encoder's output size.
const ENCODER_CHECK_TEXT: &str = "मंडी शुल्क / mandi fee";

/// Locations of the persisted index and metadata artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Binary vector index.
    pub index: PathBuf,
    /// Metadata records aligned with the index.
    pub metadata: PathBuf,
}

impl ArtifactPaths {
    /// Builds the pair of paths.
    pub fn new(index: impl Into<PathBuf>, metadata: impl Into<PathBuf>) -> Self {
        Self {
            index: index.into(),
            metadata: metadata.into(),
        }
    }
}

/// Startup lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupState {
    /// Nothing loaded yet.
    Uninitialized,
    /// Index and metadata are in memory.
    IndexLoaded,
    /// The assistant has been handed out; input may be accepted.
    Ready,
    /// Startup failed; no input is ever accepted.
    Halted,
}

impl fmt::Display for StartupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::IndexLoaded => "index-loaded",
            Self::Ready => "ready",
            Self::Halted => "halted",
        };
        f.write_str(label)
    }
}

/// Drives the startup state machine.
#[derive(Debug)]
pub struct Startup {
    paths: ArtifactPaths,
    state: StartupState,
    artifacts: Option<(FlatIndex, MetadataStore)>,
    failure: Option<RagError>,
}

impl Startup {
    /// Fresh, `Uninitialized` startup for the given artifacts.
    pub fn new(paths: ArtifactPaths) -> Self {
        Self {
            paths,
            state: StartupState::Uninitialized,
            artifacts: None,
            failure: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StartupState {
        self.state
    }

    /// The error that halted startup, if any.
    pub fn failure(&self) -> Option<&RagError> {
        self.failure.as_ref()
    }

    /// Whether chat input may be accepted.
    pub fn accepts_input(&self) -> bool {
        self.state == StartupState::Ready
    }

    /// Loads both artifacts, moving to `IndexLoaded` or `Halted`.
    pub fn load_artifacts(&mut self) -> Result<(), RagError> {
        if self.state != StartupState::Uninitialized {
            return Err(self.refusal("artifacts already loaded"));
        }
        match load_pair(&self.paths) {
            Ok((index, metadata)) => {
                info!(
                    vectors = index.len(),
                    dimension = index.dimension(),
                    records = metadata.len(),
                    "loaded index artifacts"
                );
                self.artifacts = Some((index, metadata));
                self.state = StartupState::IndexLoaded;
                Ok(())
            }
            Err(err) => Err(self.halt(err)),
        }
    }

    /// Dimension of the loaded index, once `IndexLoaded`.
    pub fn index_dimension(&self) -> Option<usize> {
        self.artifacts.as_ref().map(|(index, _)| index.dimension())
    }

    /// Injects the encoder and chat provider, moving to `Ready`.
    ///
    /// The encoder is asked for one embedding first; if it fails, or its
    /// length differs from the index dimension, startup halts instead.
    pub fn attach<E: Embedder, P: ChatProvider>(
        &mut self,
        embedder: E,
        provider: P,
        config: GenerationConfig,
        top_k: usize,
    ) -> Result<Assistant<E, P>, RagError> {
        if self.state != StartupState::IndexLoaded {
            return Err(self.refusal("artifacts are not loaded"));
        }
        let expected = self
            .index_dimension()
            .ok_or_else(|| self.refusal("artifacts were already consumed"))?;
        if let Err(err) = check_encoder(&embedder, &self.paths.index, expected) {
            return Err(self.halt(err));
        }
        let (index, metadata) = self
            .artifacts
            .take()
            .ok_or_else(|| self.refusal("artifacts were already consumed"))?;
        let retriever = Retriever::new(embedder, index, metadata);
        let generator = AnswerGenerator::new(provider, config);
        self.state = StartupState::Ready;
        Ok(Assistant::new(retriever, generator, top_k))
    }

    fn halt(&mut self, err: RagError) -> RagError {
        error!(error = %err, "startup halted");
        self.state = StartupState::Halted;
        self.artifacts = None;
        self.failure = Some(err.clone());
        err
    }

    fn refusal(&self, detail: &str) -> RagError {
        match (&self.state, &self.failure) {
            (StartupState::Halted, Some(err)) => err.clone(),
            _ => RagError::InvalidInput(format!("cannot advance from {}: {detail}", self.state)),
        }
    }
}

fn load_pair(paths: &ArtifactPaths) -> Result<(FlatIndex, MetadataStore), RagError> {
    require_file(&paths.index)?;
    require_file(&paths.metadata)?;
    let index = FlatIndex::load(&paths.index)?;
    let metadata = MetadataStore::load(&paths.metadata)?;
    if metadata.is_empty() {
        return Err(RagError::index_unavailable(
            &paths.metadata,
            "metadata store holds no passages",
        ));
    }
    Ok((index, metadata))
}

fn check_encoder<E: Embedder>(embedder: &E, index: &Path, expected: usize) -> Result<(), RagError> {
    let produced = embedder.embed(ENCODER_CHECK_TEXT)?.len();
    if produced != expected {
        return Err(RagError::index_unavailable(
            index,
            format!(
                "query encoder produces {produced}-dimensional vectors but the index holds \
                 {expected}; rebuild the index with the same embedding model"
            ),
        ));
    }
    Ok(())
}

fn require_file(path: &Path) -> Result<(), RagError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RagError::index_unavailable(path, "file not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderRequest;
    use crate::passage::PassageRecord;

    /// Embeds everything to a zero vector of the given length.
    struct ZeroEmbedder(usize);

    impl Embedder for ZeroEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
            Ok(vec![0.0; self.0])
        }
    }

    struct OfflineEmbedder;

    impl Embedder for OfflineEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
            Err(RagError::RetrievalUnavailable("connection refused".to_string()))
        }
    }

    struct EchoProvider;

    impl ChatProvider for EchoProvider {
        fn complete(&self, request: &ProviderRequest<'_>) -> Result<String, RagError> {
            Ok(request.model.to_string())
        }
    }

    fn write_artifacts(dir: &Path, records: Vec<PassageRecord>) -> ArtifactPaths {
        let paths = ArtifactPaths::new(dir.join("faiss.index"), dir.join("meta.jsonl"));
        let mut index = FlatIndex::new(2).unwrap();
        for _ in &records {
            index.add(&[0.0, 0.0]).unwrap();
        }
        index.save(&paths.index).unwrap();
        MetadataStore::from_records(records).save(&paths.metadata).unwrap();
        paths
    }

    #[test]
    fn walks_to_ready() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_artifacts(dir.path(), vec![PassageRecord::new("S.1", "t")]);
        let mut startup = Startup::new(paths);
        assert_eq!(startup.state(), StartupState::Uninitialized);
        startup.load_artifacts().expect("load");
        assert_eq!(startup.state(), StartupState::IndexLoaded);
        assert_eq!(startup.index_dimension(), Some(2));
        assert!(!startup.accepts_input());
        let assistant = startup
            .attach(ZeroEmbedder(2), EchoProvider, GenerationConfig::default(), 3)
            .expect("attach");
        assert_eq!(startup.state(), StartupState::Ready);
        assert!(startup.accepts_input());
        assert_eq!(assistant.top_k(), 3);
    }

    #[test]
    fn missing_metadata_halts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_artifacts(dir.path(), vec![PassageRecord::new("S.1", "t")]);
        std::fs::remove_file(&paths.metadata).unwrap();
        let mut startup = Startup::new(paths);
        let err = startup.load_artifacts().expect_err("halt");
        assert!(matches!(err, RagError::IndexUnavailable { .. }));
        assert_eq!(startup.state(), StartupState::Halted);
        assert_eq!(startup.failure(), Some(&err));
    }

    #[test]
    fn halted_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let mut startup = Startup::new(ArtifactPaths::new(
            dir.path().join("absent.index"),
            dir.path().join("absent.jsonl"),
        ));
        let err = startup.load_artifacts().expect_err("halt");
        assert_eq!(startup.load_artifacts().expect_err("still halted"), err);
        let attach = startup.attach(ZeroEmbedder(2), EchoProvider, GenerationConfig::default(), 3);
        assert!(attach.is_err());
        assert_eq!(startup.state(), StartupState::Halted);
        assert!(!startup.accepts_input());
    }

    #[test]
    fn encoder_of_another_dimension_halts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_artifacts(dir.path(), vec![PassageRecord::new("S.1", "t")]);
        let mut startup = Startup::new(paths.clone());
        startup.load_artifacts().expect("load");

        let err = startup
            .attach(ZeroEmbedder(384), EchoProvider, GenerationConfig::default(), 3)
            .err()
            .expect("a 384-dimensional encoder must not attach to a 2-dimensional index");
        match &err {
            RagError::IndexUnavailable { path, reason } => {
                assert_eq!(path, &paths.index);
                assert!(reason.contains("384"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(startup.state(), StartupState::Halted);
        assert_eq!(startup.failure(), Some(&err));
        assert!(!startup.accepts_input());

        let retry = startup.attach(ZeroEmbedder(2), EchoProvider, GenerationConfig::default(), 3);
        assert_eq!(retry.err(), Some(err));
    }

    #[test]
    fn unreachable_encoder_halts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_artifacts(dir.path(), vec![PassageRecord::new("S.1", "t")]);
        let mut startup = Startup::new(paths);
        startup.load_artifacts().expect("load");
        let attach = startup.attach(OfflineEmbedder, EchoProvider, GenerationConfig::default(), 3);
        assert!(matches!(attach, Err(RagError::RetrievalUnavailable(_))));
        assert_eq!(startup.state(), StartupState::Halted);
    }
}
