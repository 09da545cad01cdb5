//! Chat-completion providers used by the answer generator.

use serde::Serialize;

use crate::error::RagError;

pub mod openai;

pub use openai::OpenAiChatProvider;

/// Conversation role understood by chat-completion APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Fixed instruction turn.
    System,
    /// End-user turn.
    User,
}

/// One `{role, content}` entry of a chat prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Speaker role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// System instruction message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request envelope handed to a provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderRequest<'a> {
    /// Model identifier.
    pub model: &'a str,
    /// Ordered prompt turns.
    pub messages: &'a [ChatMessage],
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token cap.
    pub max_tokens: usize,
}

/// Trait implemented by concrete chat-completion backends.
pub trait ChatProvider {
    /// Sends one blocking completion request and returns the generated text.
    fn complete(&self, request: &ProviderRequest<'_>) -> Result<String, RagError>;
}

impl<P: ChatProvider + ?Sized> ChatProvider for Box<P> {
    fn complete(&self, request: &ProviderRequest<'_>) -> Result<String, RagError> {
        (**self).complete(request)
    }
}
