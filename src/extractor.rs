//! Turns a transcript into structured lead fields via a chat-completions call.
//!
//! Every failure (missing configuration, transport, non-2xx, timeout,
//! unparseable output) degrades to a usable [`ExtractorResponse`]; a chat turn
//! never fails because of the language model.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{ApiStyle, LlmConfig, RetryPolicy};
use crate::error::ExtractorError;
use crate::prompting::render_extractor_system_prompt;
use crate::types::{ConversationState, ExtractorResponse, MessageRole, DEFAULT_GREETING};

pub const TEMPERATURE: f64 = 0.3;
pub const MAX_TOKENS: u32 = 500;

#[derive(Debug, Clone)]
pub struct Extractor {
    client: reqwest::Client,
    config: LlmConfig,
}

impl Extractor {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Runs one extraction over the whole session transcript.
    pub async fn extract(&self, state: &ConversationState) -> ExtractorResponse {
        if !self.config.is_configured() {
            warn!(
                session_id = %state.session_id,
                error = %ExtractorError::NotConfigured,
                "using default extractor response"
            );
            return ExtractorResponse::default();
        }

        let body = self.request_body(state);
        let raw = match self.complete(&body).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    session_id = %state.session_id,
                    error = %err,
                    "language model call failed; using default extractor response"
                );
                return ExtractorResponse::default();
            }
        };

        match parse_extractor_payload(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(
                    session_id = %state.session_id,
                    error = %err,
                    "extractor output was not a JSON object; using it as the reply"
                );
                ExtractorResponse {
                    message: raw.trim().to_string(),
                    ..ExtractorResponse::default()
                }
            }
        }
    }

    fn request_body(&self, state: &ConversationState) -> Value {
        let mut messages = Vec::with_capacity(state.messages.len() + 1);
        messages.push(json!({
            "role": "system",
            "content": render_extractor_system_prompt(&state.customer_info),
        }));
        for message in &state.messages {
            let role = match message.role {
                MessageRole::Human => "user",
                MessageRole::Ai => "assistant",
            };
            messages.push(json!({ "role": role, "content": message.content }));
        }

        let mut body = json!({
            "messages": messages,
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
            "response_format": { "type": "json_object" },
        });
        if let Some(model) = &self.config.model {
            body["model"] = json!(model);
        }
        body
    }

    async fn complete(&self, body: &Value) -> Result<String, ExtractorError> {
        let attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = tokio::time::timeout(self.config.timeout, self.complete_once(body))
                .await
                .unwrap_or(Err(ExtractorError::Timeout));
            match result {
                Err(err) if err.is_retryable() && attempt < attempts => {
                    let delay = retry_delay(attempt, &self.config.retry);
                    warn!(
                        attempt,
                        attempts,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "retrying language model call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn complete_once(&self, body: &Value) -> Result<String, ExtractorError> {
        let request = self.client.post(&self.config.endpoint).json(body);
        let request = match self.config.api_style {
            ApiStyle::Azure => request.header("api-key", &self.config.api_key),
            ApiStyle::OpenAi => request.bearer_auth(&self.config.api_key),
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractorError::Status { status, body });
        }

        let payload = response.json::<Value>().await?;
        let text = payload
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("")
            .to_string();
        if text.is_empty() {
            return Err(ExtractorError::EmptyContent);
        }
        debug!(bytes = text.len(), "language model responded");
        Ok(text)
    }
}

fn retry_delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let base = policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms);
    let jitter_span = (base / 2).max(1);
    let jitter = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0)
        % jitter_span;
    Duration::from_millis(base.saturating_add(jitter))
}

/// Parses model output, tolerating code fences and prose around the object.
pub fn parse_extractor_payload(raw: &str) -> Result<ExtractorResponse, ExtractorError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ExtractorError::EmptyContent);
    }

    let mut candidates = vec![trimmed.to_string()];
    if trimmed.starts_with("```") {
        let stripped = trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
            .to_string();
        if !stripped.is_empty() {
            candidates.push(stripped);
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            candidates.push(trimmed[start..=end].to_string());
        }
    }

    let mut last_error = None;
    for candidate in candidates {
        match serde_json::from_str::<Value>(&candidate) {
            Ok(value @ Value::Object(_)) => {
                let mut parsed: ExtractorResponse = serde_json::from_value(value)?;
                if parsed.message.trim().is_empty() {
                    parsed.message = DEFAULT_GREETING.to_string();
                }
                return Ok(parsed);
            }
            Ok(_) => continue,
            Err(err) => last_error = Some(err),
        }
    }

    Err(match last_error {
        Some(err) => ExtractorError::Parse(err),
        None => ExtractorError::NotAnObject,
    })
}
