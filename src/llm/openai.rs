//! OpenAI-compatible `/chat/completions` client (OpenAI, Groq, ...).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatMessage, ChatProvider, ProviderRequest};
use crate::error::RagError;

/// Default base URL: Groq's OpenAI-compatible API.
pub const DEFAULT_CHAT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Blocking chat-completion client.
pub struct OpenAiChatProvider {
    client: Client,
    endpoint: String,
}

impl OpenAiChatProvider {
    /// Builds the client with a bearer credential and request timeout.
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing chat-completion API key");
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid chat-completion API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build chat-completion HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    /// Endpoint the client posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn send(&self, request: &ProviderRequest<'_>) -> Result<String> {
        let body = ChatRequest {
            model: request.model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .with_context(|| format!("failed to call {}", self.endpoint))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("chat completion returned {}: {}", status, text);
        }
        let text = resp.text().context("failed to read chat completion body")?;
        parse_answer(&text)
    }
}

impl ChatProvider for OpenAiChatProvider {
    fn complete(&self, request: &ProviderRequest<'_>) -> Result<String, RagError> {
        debug!(
            model = request.model,
            turns = request.messages.len(),
            "requesting chat completion"
        );
        self.send(request)
            .map_err(|err| RagError::GenerationFailed(format!("{err:#}")))
    }
}

/// Extracts the first choice's content; missing or null content becomes `""`.
fn parse_answer(body: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).context("failed to parse chat completion response")?;
    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default())
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}
