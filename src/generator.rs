//! Prompt assembly and answer generation over retrieved context.

use tracing::info;

use crate::error::RagError;
use crate::llm::{ChatMessage, ChatProvider, ProviderRequest};
use crate::passage::PassageRecord;

/// Fixed instruction sent as the system turn.
pub const SYSTEM_INSTRUCTION: &str =
    "You are Mandi Sahayak Assistant. Reply in Hindi or English based only on context docs.";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
/// Default output token cap.
pub const DEFAULT_MAX_TOKENS: usize = 500;

/// Decoding knobs passed to the chat-completion model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl GenerationConfig {
    /// Validates and builds a decoding configuration.
    pub fn new(
        model: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<Self, RagError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(RagError::InvalidInput("model identifier is required".to_string()));
        }
        if !(0.0..=2.0).contains(&temperature) {
            return Err(RagError::InvalidInput(format!(
                "temperature {temperature} outside [0, 2]"
            )));
        }
        if max_tokens == 0 {
            return Err(RagError::InvalidInput("max_tokens must be positive".to_string()));
        }
        Ok(Self {
            model,
            temperature,
            max_tokens,
        })
    }

    /// Model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sampling temperature.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Output token cap.
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Turns a question plus retrieved passages into a model answer.
pub struct AnswerGenerator<P> {
    provider: P,
    config: GenerationConfig,
}

impl<P: ChatProvider> AnswerGenerator<P> {
    /// Binds a provider to a decoding configuration.
    pub fn new(provider: P, config: GenerationConfig) -> Self {
        Self { provider, config }
    }

    /// Asks the model once; an empty `context` still produces a request.
    pub fn generate(&self, question: &str, context: &[PassageRecord]) -> Result<String, RagError> {
        let messages = build_messages(question, context);
        let request = ProviderRequest {
            model: &self.config.model,
            messages: &messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let answer = self.provider.complete(&request)?;
        info!(
            passages = context.len(),
            answer_chars = answer.chars().count(),
            "generated answer"
        );
        Ok(answer)
    }
}

/// Renders `SOURCE: <source>\n<text>` sections separated by blank lines.
pub fn render_context(context: &[PassageRecord]) -> String {
    context
        .iter()
        .map(|record| format!("SOURCE: {}\n{}", record.source, record.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds the system + user prompt turns.
pub fn build_messages(question: &str, context: &[PassageRecord]) -> Vec<ChatMessage> {
    let user = format!("Context:\n{}\n\nUser: {}", render_context(context), question);
    vec![ChatMessage::system(SYSTEM_INSTRUCTION), ChatMessage::user(user)]
}
