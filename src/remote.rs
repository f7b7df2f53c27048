//! Minimal chat-completion client.
//!
//! One POST per call, bounded by the client timeout. Calls are instrumented and log the
//! model name, latency and response size (not contents).
//!
//! NOTE: We never log the credential.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::RemoteConfig;
use crate::error::GenerationError;

/// One text-in, text-out request.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
  pub system: String,
  pub user: String,
  pub max_new_tokens: u32,
  pub temperature: f32,
}

/// Seam over the remote model so the orchestrator can be exercised without a network.
#[async_trait]
pub trait CompletionService: Send + Sync {
  /// Raw completion text. Never empty on success.
  async fn complete(&self, req: &CompletionRequest) -> Result<String, GenerationError>;

  /// Model name recorded in provenance.
  fn model(&self) -> Option<&str> {
    None
  }
}

#[derive(Clone)]
pub struct ChatCompletionClient {
  client: reqwest::Client,
  api_key: Option<String>,
  base_url: String,
  model: String,
  timeout_secs: u64,
}

impl ChatCompletionClient {
  pub fn new(cfg: &RemoteConfig) -> Result<Self, GenerationError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(cfg.timeout_secs))
      .build()
      .map_err(|e| GenerationError::RemoteUnavailable(format!("http client build failed: {e}")))?;

    Ok(Self {
      client,
      api_key: cfg.api_key.clone(),
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      model: cfg.model.clone(),
      timeout_secs: cfg.timeout_secs,
    })
  }

  pub fn has_credential(&self) -> bool {
    self.api_key.is_some()
  }
}

#[async_trait]
impl CompletionService for ChatCompletionClient {
  #[instrument(level = "info", skip(self, req), fields(model = %self.model, max_new_tokens = req.max_new_tokens))]
  async fn complete(&self, req: &CompletionRequest) -> Result<String, GenerationError> {
    let api_key = self
      .api_key
      .as_deref()
      .ok_or_else(|| GenerationError::RemoteUnavailable("COMPLETION_API_KEY not set".into()))?;

    let url = format!("{}/chat/completions", self.base_url);
    let body = ChatCompletionRequest {
      model: &self.model,
      messages: vec![
        ChatMessageReq { role: "system", content: &req.system },
        ChatMessageReq { role: "user", content: &req.user },
      ],
      stream: false,
      max_new_tokens: req.max_new_tokens,
      temperature: req.temperature,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "trainforge/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", api_key))
      .json(&body)
      .send()
      .await
      .map_err(|e| self.transport_error(e))?;

    let status = res.status();
    if !status.is_success() {
      let text = res.text().await.unwrap_or_default();
      let msg = extract_api_error(&text).unwrap_or(text);
      warn!(target: "generation", %status, elapsed = ?start.elapsed(), "Completion endpoint returned an error status");
      return Err(GenerationError::RemoteUnavailable(format!("HTTP {}: {}", status, msg)));
    }

    let raw: Value = res.json().await.map_err(|e| self.transport_error(e))?;
    let text = completion_text(&raw);
    info!(target: "generation", elapsed = ?start.elapsed(), response_chars = text.chars().count(), "Completion received");

    if text.trim().is_empty() {
      return Err(GenerationError::RemoteUnavailable("empty completion body".into()));
    }
    Ok(text)
  }

  fn model(&self) -> Option<&str> {
    Some(&self.model)
  }
}

impl ChatCompletionClient {
  fn transport_error(&self, e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
      GenerationError::RemoteTimeout { secs: self.timeout_secs }
    } else {
      GenerationError::RemoteUnavailable(e.to_string())
    }
  }
}

/// Defensive unwrap of the completion payload so extraction always gets *some* string:
/// `choices[0].message.content`, then `choices[0].text`, then `choices[0]` serialized,
/// then a top-level `output` string, then the whole body serialized.
pub fn completion_text(body: &Value) -> String {
  match body.get("choices").and_then(Value::as_array).and_then(|c| c.first()) {
    Some(choice) => {
      if let Some(s) = choice.pointer("/message/content").and_then(Value::as_str) {
        s.to_string()
      } else if let Some(s) = choice.get("text").and_then(Value::as_str) {
        s.to_string()
      } else {
        choice.to_string()
      }
    }
    None => match body.get("output").and_then(Value::as_str) {
      Some(s) => s.to_string(),
      None => body.to_string(),
    },
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessageReq<'a>>,
  stream: bool,
  max_new_tokens: u32,
  temperature: f32,
}
#[derive(Serialize)]
struct ChatMessageReq<'a> { role: &'a str, content: &'a str }

/// Try to extract a clean error message from an `{"error":{"message":..}}` or `{"error":".."}` body.
fn extract_api_error(body: &str) -> Option<String> {
  let v: Value = serde_json::from_str(body).ok()?;
  let err = v.get("error")?;
  err.get("message")
    .and_then(Value::as_str)
    .or_else(|| err.as_str())
    .map(str::to_string)
}
