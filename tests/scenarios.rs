use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use mandi_sahayak::llm::ProviderRequest;
use mandi_sahayak::session::TurnOutcome;
use mandi_sahayak::{
    ArtifactPaths, ChatProvider, Embedder, FlatIndex, GenerationConfig, MetadataStore,
    PassageRecord, RagError, Sender, Session, Startup, StartupState,
};

/// Every query lands on the same point; enough for single-passage corpora.
struct UnitEmbedder;

impl Embedder for UnitEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
        Ok(vec![1.0, 0.0, 0.0])
    }
}

/// Like [`UnitEmbedder`], but its backend can be taken down mid-session.
struct SwitchableEmbedder {
    online: Rc<Cell<bool>>,
}

impl Embedder for SwitchableEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        if self.online.get() {
            UnitEmbedder.embed(text)
        } else {
            Err(RagError::RetrievalUnavailable(
                "embedding service unreachable".to_string(),
            ))
        }
    }
}

/// Answers by quoting the first context line after the SOURCE label.
struct QuotingProvider;

impl ChatProvider for QuotingProvider {
    fn complete(&self, request: &ProviderRequest<'_>) -> Result<String, RagError> {
        let user = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let quoted = user
            .lines()
            .skip_while(|line| !line.starts_with("SOURCE:"))
            .nth(1)
            .unwrap_or("I have no context for that.")
            .to_string();
        Ok(format!("As the rules say: {quoted}"))
    }
}

/// Fails the first `failures` calls with a simulated network error.
struct FlakyProvider {
    failures: Cell<usize>,
}

impl ChatProvider for FlakyProvider {
    fn complete(&self, _request: &ProviderRequest<'_>) -> Result<String, RagError> {
        if self.failures.get() > 0 {
            self.failures.set(self.failures.get() - 1);
            return Err(RagError::GenerationFailed(
                "connection reset by peer".to_string(),
            ));
        }
        Ok("Registration with the Board is required.".to_string())
    }
}

fn write_corpus(dir: &Path, records: &[PassageRecord]) -> ArtifactPaths {
    let paths = ArtifactPaths::new(dir.join("faiss.index"), dir.join("meta.jsonl"));
    let mut index = FlatIndex::new(3).expect("dimension");
    for (i, _) in records.iter().enumerate() {
        index.add(&[1.0, i as f32, 0.0]).expect("add");
    }
    index.save(&paths.index).expect("save index");
    MetadataStore::from_records(records.to_vec())
        .save(&paths.metadata)
        .expect("save metadata");
    paths
}

fn apmc_record() -> PassageRecord {
    PassageRecord::new(
        "APMC Act S.4",
        "Mandi license requires registration with the Board.",
    )
}

#[test]
fn single_passage_answer_cites_its_source() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_corpus(dir.path(), &[apmc_record()]);
    let mut startup = Startup::new(paths);
    startup.load_artifacts().expect("artifacts load");
    let assistant = startup
        .attach(UnitEmbedder, QuotingProvider, GenerationConfig::default(), 3)
        .expect("ready");

    let docs = assistant
        .retriever()
        .retrieve("How do I get a mandi license?", 3)
        .expect("retrieve");
    assert_eq!(docs, vec![apmc_record()]);

    let mut session = Session::new();
    let outcome = assistant.handle_turn(&mut session, "How do I get a mandi license?");
    assert_eq!(
        outcome,
        TurnOutcome::Answered {
            sources: vec!["APMC Act S.4".to_string()]
        }
    );
    assert_eq!(session.messages().len(), 2);
    let user = &session.messages()[0];
    assert_eq!(user.sender(), Sender::User);
    assert_eq!(user.text(), "How do I get a mandi license?");
    let bot = &session.messages()[1];
    assert_eq!(bot.sender(), Sender::Bot);
    assert!(bot.text().contains("registration with the Board"));
    assert_eq!(bot.sources(), Some(&["APMC Act S.4".to_string()][..]));
}

#[test]
fn empty_metadata_store_halts_before_input() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_corpus(dir.path(), &[]);
    let mut startup = Startup::new(paths);

    let err = startup.load_artifacts().expect_err("empty store halts");
    assert!(matches!(err, RagError::IndexUnavailable { .. }));
    assert_eq!(startup.state(), StartupState::Halted);
    assert!(!startup.accepts_input());
    assert!(startup.attach(UnitEmbedder, QuotingProvider, GenerationConfig::default(), 3).is_err());
}

#[test]
fn generation_failure_keeps_session_usable() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_corpus(dir.path(), &[apmc_record()]);
    let mut startup = Startup::new(paths);
    startup.load_artifacts().unwrap();
    let assistant = startup
        .attach(
            UnitEmbedder,
            FlakyProvider {
                failures: Cell::new(1),
            },
            GenerationConfig::default(),
            3,
        )
        .unwrap();

    let mut session = Session::with_welcome();
    let outcome = assistant.handle_turn(&mut session, "मंडी लाइसेंस?");
    assert!(matches!(
        outcome,
        TurnOutcome::Failed(RagError::GenerationFailed(_))
    ));
    assert_eq!(session.messages().len(), 3);
    assert_eq!(session.messages()[1].text(), "मंडी लाइसेंस?");
    let notice = &session.messages()[2];
    assert_eq!(notice.sender(), Sender::Bot);
    assert!(notice.text().starts_with("⚠️"));
    assert_eq!(notice.sources(), None);

    let outcome = assistant.handle_turn(&mut session, "How do I get a mandi license?");
    assert!(matches!(outcome, TurnOutcome::Answered { .. }));
    assert_eq!(session.messages().len(), 5);
    assert_eq!(
        session.messages()[4].text(),
        "Registration with the Board is required."
    );
}

#[test]
fn retrieval_failure_keeps_session_usable() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_corpus(dir.path(), &[apmc_record()]);
    let mut startup = Startup::new(paths);
    startup.load_artifacts().unwrap();
    let online = Rc::new(Cell::new(true));
    let embedder = SwitchableEmbedder {
        online: Rc::clone(&online),
    };
    let assistant = startup
        .attach(embedder, QuotingProvider, GenerationConfig::default(), 3)
        .unwrap();

    online.set(false);
    let mut session = Session::new();
    let outcome = assistant.handle_turn(&mut session, "मंडी शुल्क कितना है?");
    assert_eq!(
        outcome,
        TurnOutcome::Failed(RagError::RetrievalUnavailable(
            "embedding service unreachable".to_string()
        ))
    );
    assert_eq!(session.messages().len(), 2);
    assert_eq!(session.messages()[0].sender(), Sender::User);
    assert_eq!(session.messages()[0].text(), "मंडी शुल्क कितना है?");
    let notice = session.messages()[1].clone();
    assert_eq!(notice.sender(), Sender::Bot);
    assert!(notice.text().starts_with("⚠️"));
    assert!(notice.text().contains("Document search failed"));
    assert_eq!(notice.sources(), None);

    online.set(true);
    let outcome = assistant.handle_turn(&mut session, "How do I get a mandi license?");
    assert_eq!(
        outcome,
        TurnOutcome::Answered {
            sources: vec!["APMC Act S.4".to_string()]
        }
    );
    assert_eq!(session.messages().len(), 4);
    assert_eq!(session.messages()[1], notice);
}

#[test]
fn encoder_of_another_dimension_halts_before_input() {
    /// Two components against a three-component index.
    struct NarrowEmbedder;

    impl Embedder for NarrowEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
            Ok(vec![1.0, 0.0])
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let paths = write_corpus(dir.path(), &[apmc_record()]);
    let mut startup = Startup::new(paths);
    startup.load_artifacts().unwrap();
    let attach = startup.attach(NarrowEmbedder, QuotingProvider, GenerationConfig::default(), 3);
    assert!(matches!(attach, Err(RagError::IndexUnavailable { .. })));
    assert_eq!(startup.state(), StartupState::Halted);
    assert!(!startup.accepts_input());
}

#[test]
fn out_of_range_hits_are_dropped_and_generation_still_runs() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::new(dir.path().join("faiss.index"), dir.path().join("meta.jsonl"));
    // Three vectors but only one metadata record.
    let mut index = FlatIndex::new(3).unwrap();
    index.add(&[0.0, 5.0, 0.0]).unwrap();
    index.add(&[1.0, 0.0, 0.0]).unwrap();
    index.add(&[1.0, 0.1, 0.0]).unwrap();
    index.save(&paths.index).unwrap();
    MetadataStore::from_records(vec![apmc_record()])
        .save(&paths.metadata)
        .unwrap();

    let mut startup = Startup::new(paths);
    startup.load_artifacts().unwrap();
    let provider = QuotingProvider;
    let assistant = startup
        .attach(UnitEmbedder, provider, GenerationConfig::default(), 2)
        .unwrap();

    // The two nearest ordinals (1, 2) are past the metadata end.
    let mut session = Session::new();
    let outcome = assistant.handle_turn(&mut session, "fees?");
    assert_eq!(outcome, TurnOutcome::Answered { sources: Vec::new() });
    assert_eq!(session.messages()[1].sources(), Some(&[][..]));
    assert_eq!(
        session.messages()[1].text(),
        "As the rules say: I have no context for that."
    );
}
