//! Application state shared by the HTTP and WebSocket handlers.
//!
//! Handlers never touch the store directly: everything that mutates answers or
//! grades goes through the orchestrator handle. The glossary is read-only.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, instrument};

use crate::catalog::{Catalog, Glossary};
use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::gemini::Gemini;
use crate::orchestrator::{self, OrchestratorHandle};
use crate::scoring::ScoringClient;
use crate::session::Session;
use crate::store::ResponseStore;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: OrchestratorHandle,
    pub glossary: Arc<Glossary>,
}

/// Background tasks owned by `main`.
pub struct Tasks {
    pub orchestrator: JoinHandle<()>,
    pub autosave: JoinHandle<()>,
}

impl AppState {
    /// Load inputs, build the Gemini client, and start the orchestrator + autosave.
    /// Any error here is fatal and happens before the server binds.
    #[instrument(level = "info", skip_all)]
    pub fn start(cfg: &AppConfig) -> Result<(Self, Tasks), ConfigError> {
        let catalog = Arc::new(Catalog::load(&cfg.paths.solutions)?);
        let glossary = Arc::new(Glossary::load(&cfg.paths.glossary)?);
        let store = ResponseStore::load(&cfg.paths.responses, &catalog).map_err(|e| {
            ConfigError::Invalid(format!("cannot open responses store {}: {e}", cfg.paths.responses.display()))
        })?;

        let gemini = Gemini::new(&cfg.gemini, cfg.scoring.request_timeout, cfg.scoring.temperature)
            .map_err(|e| ConfigError::Invalid(format!("cannot build HTTP client: {e}")))?;
        info!(target: "sysdesign_trainer", base_url = %gemini.base_url, model = %gemini.model, "Gemini scoring enabled.");

        let client = ScoringClient::new(Arc::new(gemini), cfg.scoring.overall_timeout);
        let session = Session::new(catalog.clone(), store, cfg.prompts.clone());
        Ok(Self::with_session(session, client, glossary, cfg.autosave_interval))
    }

    /// Wire up an already-built session; shared by `start` and the router tests.
    pub fn with_session(
        session: Session,
        client: ScoringClient,
        glossary: Arc<Glossary>,
        autosave_every: std::time::Duration,
    ) -> (Self, Tasks) {
        let (handle, orchestrator) = orchestrator::spawn(session, client);
        let autosave = handle.spawn_autosave(autosave_every);
        info!(target: "sysdesign_trainer", autosave_secs = autosave_every.as_secs(), "Orchestrator and autosave running");
        (Self { orchestrator: handle, glossary }, Tasks { orchestrator, autosave })
    }
}
