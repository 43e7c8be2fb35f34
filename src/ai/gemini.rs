//! Client for the Gemini generative-language API.
//!
//! Streaming generation uses the SSE variant of `streamGenerateContent`; embeddings
//! use `embedContent` with one text per request.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures::stream::BoxStream;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::GeminiConfig;

use super::error::{AiError, ApiErrorResponse};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const EMBED_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_OUTPUT_TOKENS: u32 = 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".into()),
            parts: vec![Part { text: text.into() }],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Some("model".into()),
            parts: vec![Part { text: text.into() }],
        }
    }

    fn text(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

/// One chunk of a streamed generation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateChunk {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

impl GenerateChunk {
    /// Text carried by the first candidate, if any.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: String,
    content: Content,
    task_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Purpose of an embedding; documents and queries are embedded differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedTask {
    Document,
    Query,
}

impl EmbedTask {
    fn as_str(self) -> &'static str {
        match self {
            EmbedTask::Document => "RETRIEVAL_DOCUMENT",
            EmbedTask::Query => "RETRIEVAL_QUERY",
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    inner: Arc<GeminiClientInner>,
}

struct GeminiClientInner {
    client: reqwest::Client,
    model: String,
    embedding_model: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, AiError> {
        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|_| AiError::Config("API key contains invalid characters".into()))?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-goog-api-key", api_key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(GeminiClientInner {
                client,
                model: config.model.clone(),
                embedding_model: config.embedding_model.clone(),
            }),
        })
    }

    pub fn embedding_model(&self) -> &str {
        &self.inner.embedding_model
    }

    /// Start a streamed generation. Errors before the first byte are returned
    /// directly; later failures arrive as stream items.
    #[instrument(skip(self, system, contents), fields(model = %self.inner.model))]
    pub async fn stream_generate(
        &self,
        system: String,
        contents: Vec<Content>,
    ) -> Result<BoxStream<'static, Result<GenerateChunk, AiError>>, AiError> {
        let request = GenerateRequest {
            system_instruction: Content::text(system),
            contents,
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };
        let url = format!(
            "{GEMINI_API_URL}/{}:streamGenerateContent?alt=sse",
            self.inner.model
        );

        let response = self.inner.client.post(url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        Ok(Box::pin(stream! {
            use futures::StreamExt;

            let mut pending: Vec<u8> = Vec::new();
            let mut buffer = String::new();
            let mut byte_stream = std::pin::pin!(response.bytes_stream());

            while let Some(chunk_result) = byte_stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        pending.extend_from_slice(&chunk);
                        buffer.push_str(&drain_utf8(&mut pending));

                        while let Some(event) = extract_sse_event(&mut buffer) {
                            if let Some(parsed) = parse_sse_event(&event) {
                                yield parsed;
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(AiError::Stream(e.to_string()));
                        break;
                    }
                }
            }

            if let Some(parsed) = parse_sse_event(&buffer) {
                yield parsed;
            }
        }))
    }

    #[instrument(skip(self, text), fields(model = %self.inner.embedding_model))]
    pub async fn embed(&self, text: &str, task: EmbedTask) -> Result<Vec<f32>, AiError> {
        let model = &self.inner.embedding_model;
        let request = EmbedRequest {
            model: format!("models/{model}"),
            content: Content::text(text),
            task_type: task.as_str(),
        };
        let url = format!("{GEMINI_API_URL}/{model}:embedContent");

        let response = self
            .inner
            .client
            .post(url)
            .timeout(EMBED_TIMEOUT)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        let body = response.text().await?;
        let parsed: EmbedResponse = serde_json::from_str(&body)
            .map_err(|e| AiError::Parse(format!("Failed to parse embedding: {e}")))?;
        if parsed.embedding.values.is_empty() {
            return Err(AiError::Parse("Empty embedding".into()));
        }
        Ok(parsed.embedding.values)
    }
}

async fn error_from_response(status: reqwest::StatusCode, response: reqwest::Response) -> AiError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return AiError::RateLimited(retry_after);
    }
    if status == reqwest::StatusCode::GATEWAY_TIMEOUT {
        return AiError::Timeout;
    }

    match response.text().await {
        Ok(body) => {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            AiError::Api {
                status: status.as_u16(),
                message,
            }
        }
        Err(e) => AiError::Http(e),
    }
}

/// Move the longest valid UTF-8 prefix out of `pending`, keeping a split
/// multi-byte character for the next chunk.
pub(crate) fn drain_utf8(pending: &mut Vec<u8>) -> String {
    let valid = match std::str::from_utf8(pending) {
        Ok(text) => text.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(e) => {
            // Invalid sequence mid-stream: replace it rather than stall.
            let end = e.valid_up_to() + e.error_len().unwrap_or(1);
            let text = String::from_utf8_lossy(&pending[..end]).into_owned();
            pending.drain(..end);
            return text + &drain_utf8(pending);
        }
    };
    let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
    pending.drain(..valid);
    text
}

/// Take one complete SSE event off the front of `buffer`.
pub(crate) fn extract_sse_event(buffer: &mut String) -> Option<String> {
    if buffer.contains('\r') {
        *buffer = buffer.replace("\r\n", "\n");
    }
    buffer.find("\n\n").map(|idx| {
        let event = buffer[..idx].to_string();
        buffer.drain(..idx + 2);
        event
    })
}

fn parse_sse_event(event: &str) -> Option<Result<GenerateChunk, AiError>> {
    if event.trim().is_empty() {
        return None;
    }

    let data: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|line| line.strip_prefix(' ').unwrap_or(line))
        .collect();
    if data.is_empty() {
        return None;
    }
    let data = data.join("\n");
    if data == "[DONE]" {
        return None;
    }

    Some(
        serde_json::from_str::<GenerateChunk>(&data)
            .map_err(|e| AiError::Parse(format!("Failed to parse stream chunk: {e}"))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_events_across_line_endings() {
        let mut buffer = "data: {\"candidates\":[]}\r\n\r\ndata: {}\n\npartial".to_string();
        assert!(extract_sse_event(&mut buffer).is_some());
        assert_eq!(extract_sse_event(&mut buffer).as_deref(), Some("data: {}"));
        assert!(extract_sse_event(&mut buffer).is_none());
        assert_eq!(buffer, "partial");
    }

    #[test]
    fn parses_candidate_text() {
        let event = r#"data: {"candidates":[{"content":{"role":"model","parts":[{"text":"مرحبا"},{"text":"!"}]}}]}"#;
        let chunk = parse_sse_event(event)
            .expect("event")
            .expect("valid chunk");
        assert_eq!(chunk.text().as_deref(), Some("مرحبا!"));
    }

    #[test]
    fn chunk_without_content_has_no_text() {
        let event = r#"data: {"candidates":[{"finishReason":"SAFETY"}]}"#;
        let chunk = parse_sse_event(event).expect("event").expect("valid chunk");
        assert_eq!(chunk.text(), None);
        assert_eq!(chunk.candidates[0].finish_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn skips_comments_and_reports_bad_json() {
        assert!(parse_sse_event(": keep-alive").is_none());
        assert!(parse_sse_event("").is_none());
        assert!(matches!(
            parse_sse_event("data: {not json"),
            Some(Err(AiError::Parse(_)))
        ));
    }

    #[test]
    fn split_multibyte_characters_wait_for_next_chunk() {
        let word = "سلام".as_bytes();
        let mut pending = word[..3].to_vec();
        assert_eq!(drain_utf8(&mut pending), "س");
        assert_eq!(pending.len(), 1);
        pending.extend_from_slice(&word[3..]);
        assert_eq!(drain_utf8(&mut pending), "لام");
        assert!(pending.is_empty());
    }

    #[test]
    fn client_is_clone_send_sync() {
        fn assert_traits<T: Clone + Send + Sync>() {}
        assert_traits::<GeminiClient>();
    }
}
