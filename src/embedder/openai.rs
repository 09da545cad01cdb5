//! Query encoder backed by an OpenAI-compatible `/embeddings` endpoint.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Embedder;
use crate::error::RagError;

/// Blocking embeddings client for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    max_retries: usize,
}

impl OpenAiEmbedder {
    /// Builds the client; the API key is sent as a bearer token on every call.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: String,
        dimensions: Option<usize>,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing embedding API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid embedding API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build embedding HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model,
            dimensions,
            max_retries: max_retries.max(1),
        })
    }

    /// Endpoint the client posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let inputs = [text];
        let request = EmbeddingRequest {
            model: &self.model,
            input: &inputs,
            dimensions: self.dimensions,
        };
        let mut attempt = 0usize;
        loop {
            match self.client.post(&self.endpoint).json(&request).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let body = resp.text().context("failed to read embedding response")?;
                        return parse_single_embedding(&body);
                    }
                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(%status, attempt, "embedding request throttled; retrying");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    anyhow::bail!("embedding request failed ({}): {}", status, body);
                }
                Err(err) => {
                    if (err.is_timeout() || err.is_connect()) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        warn!(error = %err, attempt, "embedding request failed; retrying");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(err).with_context(|| format!("failed to call {}", self.endpoint));
                }
            }
        }
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        debug!(model = %self.model, chars = text.len(), "encoding query");
        self.request_embedding(text)
            .map_err(|err| RagError::RetrievalUnavailable(format!("{err:#}")))
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(250 * (1 << capped))
}

fn parse_single_embedding(body: &str) -> Result<Vec<f32>> {
    let mut parsed: EmbeddingResponse =
        serde_json::from_str(body).context("failed to parse embedding response")?;
    parsed.data.sort_by_key(|entry| entry.index);
    anyhow::ensure!(
        parsed.data.len() == 1,
        "endpoint returned {} embeddings for 1 input",
        parsed.data.len()
    );
    let embedding = parsed
        .data
        .pop()
        .map(|entry| entry.embedding)
        .unwrap_or_default();
    anyhow::ensure!(!embedding.is_empty(), "endpoint returned an empty embedding");
    Ok(embedding)
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}
