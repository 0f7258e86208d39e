//! Scoring Client: dispatches a prompt to a `Scorer` under an overall deadline.
//!
//! The deadline is enforced with `tokio::time::timeout`, which drops the inner
//! future on expiry. Dropping a reqwest future aborts the HTTP request, so a
//! timed-out call does not keep running in the background.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::error::ScoreError;

/// Anything that can turn a prompt into a reply. `Gemini` in production, fakes in tests.
#[async_trait]
pub trait Scorer: Send + Sync {
  async fn score(&self, prompt: &str) -> Result<String, ScoreError>;
}

#[derive(Clone)]
pub struct ScoringClient {
  scorer: Arc<dyn Scorer>,
  timeout: Duration,
}

impl ScoringClient {
  pub fn new(scorer: Arc<dyn Scorer>, timeout: Duration) -> Self {
    Self { scorer, timeout }
  }

  /// Never retried; the caller decides whether to try again.
  #[instrument(level = "info", target = "scoring", skip(self, prompt), fields(prompt_len = prompt.len(), timeout_ms = self.timeout.as_millis() as u64))]
  pub async fn score(&self, prompt: &str) -> Result<String, ScoreError> {
    let start = Instant::now();
    match tokio::time::timeout(self.timeout, self.scorer.score(prompt)).await {
      Ok(Ok(text)) => {
        info!(target: "scoring", elapsed = ?start.elapsed(), reply_len = text.len(), "Scoring call succeeded");
        Ok(text)
      }
      Ok(Err(e)) => {
        warn!(target: "scoring", elapsed = ?start.elapsed(), error = %e, "Scoring call failed");
        Err(e)
      }
      Err(_) => {
        warn!(target: "scoring", elapsed = ?start.elapsed(), "Scoring call timed out");
        Err(ScoreError::Timeout(self.timeout))
      }
    }
  }
}
