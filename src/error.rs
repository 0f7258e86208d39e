//! Error taxonomy for the trainer.
//!
//! - `ConfigError` is fatal and raised before the server binds.
//! - `StoreError` covers reading/writing `user_responses.json`.
//! - `ScoreError` is what a scoring call can fail with; it is rendered to the user.
//! - `SessionError` is returned by orchestrator commands and mapped to HTTP codes.
//!
//! Reply-parse degradation is deliberately not an error (see `reply`).

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("GEMINI_API_KEY is not set; the scoring client cannot start without it")]
  MissingApiKey,

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse TOML config {path}: {source}")]
  Toml {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("failed to parse JSON input {path}: {source}")]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid configuration: {0}")]
  Invalid(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("store I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("store JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoreError {
  #[error("Request timed out after {:.1} seconds.", .0.as_secs_f64())]
  Timeout(Duration),

  #[error("{0}")]
  Transport(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
  #[error("no question is selected")]
  NoQuestionSelected,

  #[error("unknown question: {0}")]
  UnknownQuestion(String),

  #[error("a grading request is already in flight")]
  Busy,

  #[error("the orchestrator has shut down")]
  Closed,

  #[error(transparent)]
  Store(#[from] StoreError),
}
