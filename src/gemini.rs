//! Minimal Gemini client for our single use-case: one prompt in, one text reply out.
//!
//! Calls `models/{model}:generateContent`. Calls are instrumented and log the model,
//! latency, and response size (not contents).
//!
//! NOTE: We never log the API key; it travels in the `x-goog-api-key` header, not the URL.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::GeminiConfig;
use crate::error::ScoreError;
use crate::scoring::Scorer;
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct Gemini {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  temperature: f32,
}

impl Gemini {
  /// `request_timeout` bounds the HTTP exchange itself; keep it at or below the
  /// overall scoring deadline.
  pub fn new(cfg: &GeminiConfig, request_timeout: Duration, temperature: f32) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder()
      .timeout(request_timeout)
      .build()?;
    Ok(Self {
      client,
      api_key: cfg.api_key.clone(),
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      model: cfg.model.clone(),
      temperature,
    })
  }

  /// Plain-text generation for a single user prompt.
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  pub async fn generate_text(&self, prompt: &str) -> Result<String, String> {
    let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
    let req = GenerateRequest {
      contents: vec![Content { role: "user".into(), parts: vec![Part { text: prompt.into() }] }],
      generation_config: GenerationConfig { temperature: self.temperature },
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, concat!("sysdesign-trainer/", env!("CARGO_PKG_VERSION")))
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&req).send().await.map_err(describe_reqwest_error)?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_gemini_error(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
      return Err(format!("Gemini HTTP {}: {}", status, msg));
    }

    let body: GenerateResponse = res.json().await.map_err(describe_reqwest_error)?;
    if let Some(usage) = &body.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, candidates_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }

    let candidate = body.candidates.into_iter().next();
    let text = candidate
      .as_ref()
      .and_then(|c| c.content.as_ref())
      .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect::<String>())
      .unwrap_or_default();

    if text.trim().is_empty() {
      let reason = body
        .prompt_feedback
        .and_then(|f| f.block_reason)
        .or_else(|| candidate.and_then(|c| c.finish_reason))
        .unwrap_or_else(|| "no content".into());
      warn!(elapsed = ?start.elapsed(), %reason, "Gemini returned an empty reply");
      return Err(format!("Gemini returned no text ({reason})"));
    }

    info!(elapsed = ?start.elapsed(), reply_len = text.len(), "Gemini reply received");
    Ok(text)
  }
}

#[async_trait]
impl Scorer for Gemini {
  async fn score(&self, prompt: &str) -> Result<String, ScoreError> {
    self.generate_text(prompt).await.map_err(ScoreError::Transport)
  }
}

fn describe_reqwest_error(e: reqwest::Error) -> String {
  if e.is_timeout() {
    format!("Gemini request timed out: {e}")
  } else if e.is_connect() {
    format!("Could not reach Gemini: {e}")
  } else {
    e.to_string()
  }
}

// --- Gemini DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct Content { role: String, parts: Vec<Part> }
#[derive(Serialize)]
struct Part { text: String }
#[derive(Serialize)]
struct GenerationConfig { temperature: f32 }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] prompt_feedback: Option<PromptFeedback>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  #[serde(default)] content: Option<CandidateContent>,
  #[serde(default)] finish_reason: Option<String>,
}
#[derive(Deserialize)]
struct CandidateContent { #[serde(default)] parts: Vec<PartResp> }
#[derive(Deserialize)]
struct PartResp { #[serde(default)] text: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback { #[serde(default)] block_reason: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String, #[serde(default)] status: Option<String> }
  let w = serde_json::from_str::<EWrap>(body).ok()?;
  Some(match w.error.status {
    Some(status) => format!("{} ({})", w.error.message, status),
    None => w.error.message,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client_for(server: &MockServer, timeout: Duration) -> Gemini {
    let cfg = GeminiConfig { api_key: "test-key".into(), base_url: format!("{}/", server.uri()), model: "gemini-test".into() };
    Gemini::new(&cfg, timeout, 0.2).unwrap()
  }

  #[tokio::test]
  async fn returns_concatenated_candidate_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/models/gemini-test:generateContent"))
      .and(header("x-goog-api-key", "test-key"))
      .and(body_partial_json(json!({"contents": [{"role": "user", "parts": [{"text": "grade me"}]}]})))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{"content": {"parts": [{"text": "Requirements Score: 3 - ok\n"}, {"text": "Summary: fine"}]}, "finishReason": "STOP"}],
        "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15}
      })))
      .mount(&server)
      .await;

    let text = client_for(&server, Duration::from_secs(5)).score("grade me").await.unwrap();
    assert_eq!(text, "Requirements Score: 3 - ok\nSummary: fine");
  }

  #[tokio::test]
  async fn http_errors_surface_as_transport_with_api_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(429).set_body_json(json!({
        "error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}
      })))
      .mount(&server)
      .await;

    let err = client_for(&server, Duration::from_secs(5)).score("p").await.unwrap_err();
    match err {
      ScoreError::Transport(msg) => {
        assert!(msg.contains("429"), "{msg}");
        assert!(msg.contains("Resource has been exhausted (RESOURCE_EXHAUSTED)"), "{msg}");
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[tokio::test]
  async fn blocked_prompt_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [],
        "promptFeedback": {"blockReason": "SAFETY"}
      })))
      .mount(&server)
      .await;

    let err = client_for(&server, Duration::from_secs(5)).score("p").await.unwrap_err();
    assert_eq!(err, ScoreError::Transport("Gemini returned no text (SAFETY)".into()));
  }

  #[tokio::test]
  async fn slow_server_hits_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)).set_body_json(json!({"candidates": []})))
      .mount(&server)
      .await;

    let err = client_for(&server, Duration::from_millis(100)).score("p").await.unwrap_err();
    assert!(matches!(err, ScoreError::Transport(ref m) if m.contains("timed out")), "{err:?}");
  }
}
