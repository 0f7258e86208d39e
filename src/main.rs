//! System Design Trainer · local practice backend
//!
//! - Axum HTTP + WebSocket API driving a single grading session
//! - Gemini scores answers against a canonical solution and a fixed rubric
//! - Answers and grades persist to `user_responses.json` (autosaved)
//! - Static front-end fallback (./static/index.html)
//!
//! Important env variables:
//!   GEMINI_API_KEY      : required
//!   GEMINI_BASE_URL     : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL        : default "gemini-1.5-flash-latest"
//!   DATA_DIR            : where the JSON inputs/outputs live (default ".")
//!   PORT                : u16 (default 3000, bound on 127.0.0.1)
//!   TRAINER_CONFIG_PATH : optional TOML (paths, timeouts, autosave, prompts)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod catalog;
mod config;
mod domain;
mod error;
mod gemini;
mod grade;
mod orchestrator;
mod prompt;
mod protocol;
mod reply;
mod routes;
mod scoring;
mod session;
mod state;
mod store;
mod telemetry;
mod util;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Configuration and input problems are fatal and must surface before we serve anything.
  let cfg = AppConfig::from_env().map_err(|e| {
    error!(target: "sysdesign_trainer", error = %e, "Startup configuration error");
    e
  })?;
  let (state, tasks) = AppState::start(&cfg).map_err(|e| {
    error!(target: "sysdesign_trainer", error = %e, "Failed to load inputs");
    e
  })?;

  let app = build_router(state.clone());

  let listener = TcpListener::bind(cfg.addr).await?;
  info!(target: "sysdesign_trainer", addr = %cfg.addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!(target: "sysdesign_trainer", "Shutdown requested");
    })
    .await?;

  // Save the active draft before exiting.
  tasks.autosave.abort();
  if let Err(e) = state.orchestrator.shutdown().await {
    error!(target: "sysdesign_trainer", error = %e, "Final save did not complete");
  }
  let _ = tasks.orchestrator.await;
  Ok(())
}
