//! Gemini Backend Implementation
//!
//! Chat backend for the Gemini REST API.
//!
//! # Gemini API
//!
//! - `POST {base}/models/{model}:streamGenerateContent?alt=sse` streams a
//!   reply as Server-Sent Events, one `GenerateContentResponse` JSON object
//!   per event.
//!
//! The API is stateless, so each [`GeminiSession`] keeps its own history and
//! sends it with every request. A turn is only added to the history once the
//! reply finished without error.

use std::fmt::Display;
use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::traits::{
    ChatBackend, ChatSessionHandle, GroundingMetadata, ProviderChunk, ProviderEvent,
    SessionConfig, SourceReference,
};
use crate::config::{ApiKey, BackendConfig};
use crate::modes::Tool;

/// Longest provider error body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 800;

/// Gemini backend client
#[derive(Clone)]
pub struct GeminiBackend {
    /// API key
    api_key: ApiKey,
    /// REST base URL
    base_url: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl GeminiBackend {
    /// Create a new Gemini backend
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    async fn create_session(
        &self,
        config: SessionConfig,
    ) -> anyhow::Result<Box<dyn ChatSessionHandle>> {
        tracing::debug!(model = %config.model, tools = config.tools.len(), "Creating Gemini session");
        Ok(Box::new(GeminiSession {
            endpoint: stream_endpoint(&self.base_url, &config.model),
            api_key: self.api_key.clone(),
            http_client: self.http_client.clone(),
            config,
            history: Arc::new(Mutex::new(Vec::new())),
        }))
    }
}

/// One Gemini conversation
pub struct GeminiSession {
    endpoint: String,
    api_key: ApiKey,
    http_client: reqwest::Client,
    config: SessionConfig,
    /// Shared with the reply task, which appends the finished turn
    history: Arc<Mutex<Vec<Content>>>,
}

#[async_trait]
impl ChatSessionHandle for GeminiSession {
    async fn send_stream(&mut self, text: &str) -> anyhow::Result<mpsc::Receiver<ProviderEvent>> {
        let user_turn = Content::user(text);
        let body = {
            let history = self.history.lock();
            build_request(&self.config, &history, &user_turn)
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("x-goog-api-key", self.api_key.expose())
            .json(&body)
            .send()
            .await?;

        // Check for HTTP errors
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini returned {status}: {}", truncate(&body, MAX_ERROR_BODY_CHARS));
        }

        let (tx, rx) = mpsc::channel(100);
        let events = response.bytes_stream().eventsource();
        let history = Arc::clone(&self.history);

        // Spawn task to process stream
        tokio::spawn(async move {
            let Some(reply) = pump(events, &tx).await else {
                return;
            };

            let mut history = history.lock();
            history.push(user_turn);
            history.push(Content::model(reply));
            tracing::debug!(turns = history.len(), "Gemini reply complete");
        });

        Ok(rx)
    }

    fn history_len(&self) -> usize {
        self.history.lock().len()
    }
}

/// Forward every SSE event to `tx`
///
/// Returns the full reply text if the stream ended cleanly, `None` if it
/// failed or the receiver went away.
async fn pump<S, E>(events: S, tx: &mpsc::Sender<ProviderEvent>) -> Option<String>
where
    S: Stream<Item = Result<Event, EventStreamError<E>>>,
    E: Display,
{
    let mut events = std::pin::pin!(events);
    let mut reply = String::new();

    while let Some(event) = events.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                let _ = tx.send(ProviderEvent::Failed(e.to_string())).await;
                return None;
            }
        };
        if forward(tx, &event.data, &mut reply).await.is_break() {
            return None;
        }
    }
    Some(reply)
}

/// Decode one SSE payload and pass it on. Breaks when the stream must stop,
/// either because it failed or because the receiver went away.
async fn forward(
    tx: &mpsc::Sender<ProviderEvent>,
    data: &str,
    reply: &mut String,
) -> ControlFlow<()> {
    if data.trim().is_empty() {
        return ControlFlow::Continue(());
    }

    let event = match serde_json::from_str::<StreamResponse>(data) {
        Ok(response) => match convert_chunk(response) {
            Ok(chunk) => {
                if let Some(text) = &chunk.text {
                    reply.push_str(text);
                }
                ProviderEvent::Chunk(chunk)
            }
            Err(reason) => ProviderEvent::Failed(reason),
        },
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable Gemini stream event");
            ProviderEvent::Failed(format!("malformed stream event: {e}"))
        }
    };

    let failed = matches!(event, ProviderEvent::Failed(_));
    if tx.send(event).await.is_err() || failed {
        // Receiver dropped or stream failed, stop streaming
        return ControlFlow::Break(());
    }
    ControlFlow::Continue(())
}

fn stream_endpoint(base_url: &str, model: &str) -> String {
    format!("{base_url}/models/{model}:streamGenerateContent?alt=sse")
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

fn build_request(config: &SessionConfig, history: &[Content], user_turn: &Content) -> GenerateContentRequest {
    let mut contents = history.to_vec();
    contents.push(user_turn.clone());

    GenerateContentRequest {
        contents,
        system_instruction: Some(Content {
            role: None,
            parts: vec![Part::text(&config.system_instruction)],
        }),
        tools: config
            .tools
            .iter()
            .map(|tool| match tool {
                Tool::GoogleSearch => ToolSpec {
                    google_search: Some(GoogleSearch {}),
                },
            })
            .collect(),
        generation_config: GenerationConfig {
            temperature: config.temperature,
        },
    }
}

/// Map one response object to a provider chunk, or to a failure reason
fn convert_chunk(response: StreamResponse) -> Result<ProviderChunk, String> {
    if let Some(error) = response.error {
        return Err(match error.status {
            Some(status) => format!("{status}: {}", error.message),
            None => error.message,
        });
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(format!("prompt blocked: {reason}"));
        }
        return Ok(ProviderChunk::default());
    };

    let text: String = candidate
        .content
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let grounding_metadata = candidate.grounding_metadata.map(|metadata| GroundingMetadata {
        references: metadata
            .grounding_chunks
            .into_iter()
            .filter_map(|chunk| {
                if let Some(web) = chunk.web {
                    let uri = web.uri?;
                    Some(SourceReference::web(uri, web.title.as_deref()))
                } else {
                    let context = chunk.retrieved_context?;
                    let uri = context.uri?;
                    Some(SourceReference::other(uri, context.title.as_deref()))
                }
            })
            .collect(),
    });

    Ok(ProviderChunk {
        text: (!text.is_empty()).then_some(text),
        grounding_metadata,
    })
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user(text: &str) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part::text(text)],
        }
    }

    fn model(text: String) -> Self {
        Self {
            role: Some("model".to_string()),
            parts: vec![Part { text: Some(text) }],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    google_search: Option<GoogleSearch>,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<RawGroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<RawGroundingChunk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGroundingChunk {
    web: Option<RawSource>,
    retrieved_context: Option<RawSource>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    status: Option<String>,
}
