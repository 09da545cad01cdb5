//! Conversation transcript and per-turn orchestration.

use std::fmt::Write as _;

use serde::Serialize;
use tracing::{info, warn};

use crate::embedder::Embedder;
use crate::error::RagError;
use crate::generator::AnswerGenerator;
use crate::llm::ChatProvider;
use crate::retriever::Retriever;

/// Greeting shown as the first bot message of a fresh session.
pub const WELCOME_MESSAGE: &str = "👋 **नमस्ते किसान भाई!**\n\n\
मैं *मंडी सहायक चैटबोट* हूँ। मैं आपकी मदद कर सकता हूँ:\n\
- APMC Act 2020 से जुड़े सवालों में\n\
- मंडी लाइसेंस प्रक्रिया\n\
- व्यापारी पंजीकरण नियम\n\
- फसल खरीद, नीलामी और शुल्क\n\
- किसान अधिकार और सुरक्षा प्रावधान\n\n\
**अपना सवाल यहाँ लिखें 👇**";

/// Default number of passages retrieved per turn.
pub const DEFAULT_TOP_K: usize = 3;

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The person asking questions.
    User,
    /// The assistant.
    Bot,
}

/// One immutable transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationMessage {
    sender: Sender,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sources: Option<Vec<String>>,
}

impl ConversationMessage {
    /// A user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            sources: None,
        }
    }

    /// A bot answer citing `sources` (possibly empty).
    pub fn bot(text: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
            sources: Some(sources),
        }
    }

    /// A bot message without citations (welcome text, error notices).
    pub fn bot_notice(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
            sources: None,
        }
    }

    /// Message author.
    pub fn sender(&self) -> Sender {
        self.sender
    }

    /// Message body.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Cited source identifiers; only ever present on bot answers.
    pub fn sources(&self) -> Option<&[String]> {
        self.sources.as_deref()
    }

    /// Terminal rendering: prefix line(s) plus an optional sources caption.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match self.sender {
            Sender::User => {
                let _ = write!(out, "you> {}", self.text);
            }
            Sender::Bot => {
                let _ = write!(out, "sahayak> {}", self.text);
                if let Some(sources) = self.sources.as_deref().filter(|s| !s.is_empty()) {
                    let _ = write!(out, "\n📄 Sources: {}", sources.join(", "));
                }
            }
        }
        out
    }
}

/// Append-only transcript owned by one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    messages: Vec<ConversationMessage>,
}

impl Session {
    /// Empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transcript seeded with the bilingual welcome message.
    pub fn with_welcome() -> Self {
        Self {
            messages: vec![ConversationMessage::bot_notice(WELCOME_MESSAGE)],
        }
    }

    /// Messages in arrival order.
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Most recent message.
    pub fn last(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }

    fn push(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }
}

/// Result of a single turn; the transcript is updated either way.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The bot answered, citing these sources.
    Answered {
        /// Sources of the retrieved passages, in retrieval order.
        sources: Vec<String>,
    },
    /// Retrieval or generation failed; an error notice was appended.
    Failed(RagError),
}

/// Stateless pipeline shared by every session: retrieve, then generate.
pub struct Assistant<E, P> {
    retriever: Retriever<E>,
    generator: AnswerGenerator<P>,
    top_k: usize,
}

impl<E: Embedder, P: ChatProvider> Assistant<E, P> {
    /// Assembles the pipeline; `top_k` is clamped to at least 1.
    pub fn new(retriever: Retriever<E>, generator: AnswerGenerator<P>, top_k: usize) -> Self {
        Self {
            retriever,
            generator,
            top_k: top_k.max(1),
        }
    }

    /// Retrieval stage.
    pub fn retriever(&self) -> &Retriever<E> {
        &self.retriever
    }

    /// Passages requested per turn.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Runs one user turn against `session`.
    ///
    /// Appends exactly two messages: the user input and either the answer or
    /// an error notice. Failures never remove earlier messages.
    pub fn handle_turn(&self, session: &mut Session, input: &str) -> TurnOutcome {
        session.push(ConversationMessage::user(input));
        match self.answer(input) {
            Ok((answer, sources)) => {
                session.push(ConversationMessage::bot(answer, sources.clone()));
                TurnOutcome::Answered { sources }
            }
            Err(err) => {
                warn!(error = %err, "turn failed");
                session.push(ConversationMessage::bot_notice(error_notice(&err)));
                TurnOutcome::Failed(err)
            }
        }
    }

    fn answer(&self, input: &str) -> Result<(String, Vec<String>), RagError> {
        let docs = self.retriever.retrieve(input, self.top_k)?;
        if docs.is_empty() {
            info!("no passages retrieved; answering without context");
        }
        let answer = self.generator.generate(input, &docs)?;
        let sources = docs.into_iter().map(|doc| doc.source).collect();
        Ok((answer, sources))
    }
}

/// User-facing text for a failed turn.
pub fn error_notice(err: &RagError) -> String {
    match err {
        RagError::RetrievalUnavailable(_) => {
            format!("⚠️ दस्तावेज़ खोज विफल रही / Document search failed: {err}. Please try again.")
        }
        RagError::GenerationFailed(_) => {
            format!("⚠️ उत्तर नहीं बन सका / Could not generate an answer: {err}. Please resubmit.")
        }
        other => format!("⚠️ {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn welcome_session_starts_with_one_bot_notice() {
        let session = Session::with_welcome();
        assert_eq!(session.messages().len(), 1);
        let first = &session.messages()[0];
        assert_eq!(first.sender(), Sender::Bot);
        assert_eq!(first.sources(), None);
        assert!(first.text().contains("APMC Act 2020"));
    }

    #[test]
    fn renders_sources_caption_only_when_present() {
        let sources = vec!["S.4".to_string(), "S.4".to_string()];
        let answer = ConversationMessage::bot("Register with the Board.", sources);
        assert_eq!(
            answer.render(),
            "sahayak> Register with the Board.\n📄 Sources: S.4, S.4"
        );
        let bare = ConversationMessage::bot("No context.", Vec::new());
        assert_eq!(bare.render(), "sahayak> No context.");
        assert_eq!(ConversationMessage::user("hi").render(), "you> hi");
    }

    #[test]
    fn serializes_like_the_chat_transcript() {
        let answer = ConversationMessage::bot("ok", vec!["S.1".into()]);
        let json = serde_json::to_value(answer).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"sender": "bot", "text": "ok", "sources": ["S.1"]})
        );
        let json = serde_json::to_value(ConversationMessage::user("q")).unwrap();
        assert_eq!(json, serde_json::json!({"sender": "user", "text": "q"}));
    }

    #[test]
    fn error_notice_mentions_cause() {
        let notice = error_notice(&RagError::GenerationFailed("503".into()));
        assert!(notice.starts_with("⚠️"));
        assert!(notice.contains("503"));
    }
}
