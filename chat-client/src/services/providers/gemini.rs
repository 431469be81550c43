//! Gemini answer provider.
//!
//! Sends every prompt with the tutor persona as system instruction and the
//! Google Search tool enabled; the model decides per request whether to
//! search. Citations come back as grounding chunks.

use super::{
    classify_failure, AnswerChunk, AnswerProvider, AnswerStream, ProviderError,
    DEFAULT_SOURCE_TITLE, EMPTY_ANSWER_FALLBACK,
};
use crate::models::{Answer, Source};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Default Gemini API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Persona sent as the system instruction of every request.
pub const TUTOR_INSTRUCTION: &str = r#"You are "CodeBuddy", a friendly, patient, and encouraging programming tutor.
Your goal is to help beginners and students solve coding doubts in the simplest way possible.

Guidelines:
1. **Be Encouraging**: Start with a friendly tone. Don't make the user feel bad for asking simple questions.
2. **Explain Like I'm 5 (ELI5)**: Break down complex concepts into simple analogies.
3. **Show, Don't Just Tell**: Provide clear, commented code examples.
4. **Step-by-Step Debugging**: If the user provides code, explain exactly where the error is and how to fix it line-by-line.
5. **Safety First**: Always provide secure code.

If the question requires up-to-date information (like "latest version of React" or "newest Python features"), use the googleSearch tool."#;

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
}

/// Gemini answer provider.
pub struct GeminiAnswerProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiAnswerProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::Generic(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Build the API URL for the given method.
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.config.api_base.trim_end_matches('/'),
            self.config.model,
            method,
            self.config.api_key
        )
    }

    fn build_request(prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: Some(TUTOR_INSTRUCTION.to_string()),
                }],
            },
            tools: vec![Tool {
                google_search: GoogleSearch {},
            }],
        }
    }

    /// Send a request and turn non-2xx replies into classified errors.
    async fn send(&self, url: &str, prompt: &str) -> Result<reqwest::Response, ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::AuthInvalid(
                "API key not configured".to_string(),
            ));
        }

        let request = Self::build_request(prompt);

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            // The URL carries the key; keep it out of error text and logs.
            .map_err(|e| classify_failure(None, &e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!(
                model = %self.config.model,
                status = status.as_u16(),
                "Gemini API returned an error"
            );
            return Err(classify_failure(Some(status.as_u16()), &error_text));
        }

        Ok(response)
    }
}

#[async_trait]
impl AnswerProvider for GeminiAnswerProvider {
    async fn generate(&self, prompt: &str) -> Result<Answer, ProviderError> {
        tracing::debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Sending request to Gemini API"
        );

        let url = self.api_url("generateContent");
        let response = self.send(&url, prompt).await?;

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Generic(format!("Failed to parse response: {}", e)))?;

        extract_answer(&api_response)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<AnswerStream, ProviderError> {
        tracing::debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Starting streaming request to Gemini API"
        );

        let url = format!("{}&alt=sse", self.api_url("streamGenerateContent"));
        let response = self.send(&url, prompt).await?;

        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut events = SseBuffer::default();

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(classify_failure(None, &e.without_url().to_string())))
                            .await;
                        return;
                    }
                };

                for data in events.push(&chunk) {
                    if !forward_event(&tx, &data).await {
                        return;
                    }
                }
            }

            // The last event may arrive without a closing blank line.
            if let Some(data) = events.finish() {
                forward_event(&tx, &data).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)) as AnswerStream)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Send the chunks of one SSE payload. Returns false once the stream is done.
async fn forward_event(
    tx: &mpsc::Sender<Result<AnswerChunk, ProviderError>>,
    data: &str,
) -> bool {
    let Ok(response) = serde_json::from_str::<GenerateContentResponse>(data) else {
        tracing::debug!(len = data.len(), "Skipping unparsable SSE event");
        return true;
    };

    for item in stream_chunks(&response) {
        let failed = item.is_err();
        if tx.send(item).await.is_err() || failed {
            return false;
        }
    }
    true
}

/// Pull the answer out of a complete (non-streamed) response.
fn extract_answer(response: &GenerateContentResponse) -> Result<Answer, ProviderError> {
    check_blocked(response)?;

    let text = response_text(response);
    let text = if text.trim().is_empty() {
        EMPTY_ANSWER_FALLBACK.to_string()
    } else {
        text
    };

    Ok(Answer::new(text, response_sources(response)))
}

/// Chunks carried by one streamed response event.
fn stream_chunks(response: &GenerateContentResponse) -> Vec<Result<AnswerChunk, ProviderError>> {
    if let Err(e) = check_blocked(response) {
        return vec![Err(e)];
    }

    let mut chunks = Vec::new();
    let text = response_text(response);
    if !text.is_empty() {
        chunks.push(Ok(AnswerChunk::Text(text)));
    }
    let sources = response_sources(response);
    if !sources.is_empty() {
        chunks.push(Ok(AnswerChunk::Sources(sources)));
    }
    chunks
}

fn check_blocked(response: &GenerateContentResponse) -> Result<(), ProviderError> {
    if let Some(error) = &response.error {
        let text = format!(
            "{} {}",
            error.status.as_deref().unwrap_or_default(),
            error.message.as_deref().unwrap_or_default()
        );
        return Err(classify_failure(error.code, text.trim()));
    }

    let prompt_blocked = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_ref())
        .is_some();

    let candidate_blocked = response
        .candidates
        .first()
        .and_then(|c| c.finish_reason.as_deref())
        == Some("SAFETY");

    if prompt_blocked || candidate_blocked {
        Err(ProviderError::ContentRejected)
    } else {
        Ok(())
    }
}

/// Concatenated text parts of the first candidate.
fn response_text(response: &GenerateContentResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Web citations of the first candidate. Chunks without a URI are dropped.
fn response_sources(response: &GenerateContentResponse) -> Vec<Source> {
    response
        .candidates
        .first()
        .and_then(|c| c.grounding_metadata.as_ref())
        .map(|metadata| {
            metadata
                .grounding_chunks
                .iter()
                .filter_map(|chunk| chunk.web.as_ref())
                .filter_map(|web| {
                    let uri = web.uri.as_ref().filter(|u| !u.is_empty())?;
                    let title = web
                        .title
                        .clone()
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| DEFAULT_SOURCE_TITLE.to_string());
                    Some(Source::new(title, uri.clone()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Accumulates raw SSE bytes and yields complete `data:` payloads.
///
/// Network chunks may split a UTF-8 sequence; the incomplete tail waits
/// in `pending` for the next chunk.
#[derive(Debug, Default)]
struct SseBuffer {
    pending: Vec<u8>,
    buffer: String,
}

impl SseBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let decodable = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let text: Vec<u8> = self.pending.drain(..decodable).collect();
        self.buffer.push_str(&String::from_utf8_lossy(&text));
        // A CRLF pair can straddle two chunks.
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut payloads = Vec::new();
        while let Some(event_end) = self.buffer.find("\n\n") {
            let event: String = self.buffer.drain(..event_end + 2).collect();
            payloads.extend(event_data(&event));
        }
        payloads
    }

    /// Payload of whatever is left once the body has ended.
    fn finish(&mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned();
        self.buffer.push_str(&rest);
        let event = std::mem::take(&mut self.buffer);
        event_data(&event)
    }
}

/// Joined `data:` lines of one event, if it has any.
fn event_data(event: &str) -> Option<String> {
    let data: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect();
    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    /// Set when the API reports a failure inside a 200 stream.
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}
