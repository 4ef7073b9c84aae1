//! Streaming text generation against Vertex AI Gemini
//!
//! The response is consumed as server-sent events; each event carries a
//! partial candidate whose text parts are forwarded to the token callback and
//! accumulated into the final reply.

use crate::llm::config::{LLMConfig, SAFETY_CATEGORIES};
use crate::llm::sse::SseDecoder;
use crate::{ChronosError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Callback type for streaming token reception. Return `false` to stop early.
pub type TokenCallback = Box<dyn FnMut(&str) -> bool + Send>;

/// A single generation request
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub user_input: String,
    pub system_instruction: Option<String>,
}

impl GenerateRequest {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            system_instruction: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        let instruction = instruction.into();
        self.system_instruction = if instruction.trim().is_empty() {
            None
        } else {
            Some(instruction)
        };
        self
    }
}

/// Text generation backend
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Stream a reply, forwarding each text fragment to `on_token`, and
    /// return the full concatenated text.
    async fn generate_stream(
        &self,
        request: &GenerateRequest,
        on_token: TokenCallback,
    ) -> Result<String>;

    /// Generate a complete reply
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.generate_stream(request, Box::new(|_: &str| true)).await
    }
}

/// Vertex AI `streamGenerateContent` client
pub struct VertexClient {
    config: LLMConfig,
    http: reqwest::Client,
}

impl VertexClient {
    pub fn new(config: LLMConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChronosError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        info!(model = %config.model_id, location = %config.location, "Vertex client ready");
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &LLMConfig {
        &self.config
    }

    /// JSON body for a generation request
    pub fn build_body(&self, request: &GenerateRequest) -> Value {
        let safety: Vec<Value> = SAFETY_CATEGORIES
            .iter()
            .map(|category| {
                json!({
                    "category": category,
                    "threshold": self.config.safety_threshold,
                })
            })
            .collect();

        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.user_input }],
            }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "topP": self.config.top_p,
                "maxOutputTokens": self.config.max_output_tokens,
                "responseModalities": ["TEXT"],
            },
            "safetySettings": safety,
        });

        if let Some(instruction) = &request.system_instruction {
            body["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
        }
        body
    }
}

#[async_trait]
impl LlmClient for VertexClient {
    async fn generate_stream(
        &self,
        request: &GenerateRequest,
        mut on_token: TokenCallback,
    ) -> Result<String> {
        let url = self.config.stream_url();
        debug!(url = %url, chars = request.user_input.len(), "Starting generation");

        let mut builder = self.http.post(&url).json(&self.build_body(request));
        if let Some(token) = &self.config.access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ChronosError::InferenceError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChronosError::InferenceError(format!(
                "Vertex AI returned {}: {}",
                status, text
            )));
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut full = String::new();
        let mut stopped = false;

        'outer: while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| ChronosError::InferenceError(format!("Stream interrupted: {}", e)))?;

            for event in decoder.push(&chunk) {
                if !apply_event(&event, &mut full, &mut on_token)? {
                    stopped = true;
                    break 'outer;
                }
            }
        }

        if !stopped {
            if let Some(event) = decoder.finish() {
                apply_event(&event, &mut full, &mut on_token)?;
            }
        }

        debug!(chars = full.len(), stopped, "Generation finished");
        Ok(full)
    }
}

/// Fold one SSE payload into `full`. Returns `false` when the callback asked
/// to stop.
fn apply_event(event: &str, full: &mut String, on_token: &mut TokenCallback) -> Result<bool> {
    if event == "[DONE]" {
        return Ok(true);
    }

    let value: Value = match serde_json::from_str(event) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Skipping malformed stream event");
            return Ok(true);
        }
    };

    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(ChronosError::InferenceError(format!(
            "Vertex AI stream error: {}",
            message
        )));
    }

    for text in candidate_texts(&value) {
        full.push_str(text);
        if !on_token(text) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Text parts of the first candidate in a streamed chunk
fn candidate_texts(chunk: &Value) -> Vec<&str> {
    chunk
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}
