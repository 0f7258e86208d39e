//! HTTP endpoint handlers. These are thin wrappers that forward to the orchestrator.
//! Each handler is instrumented and logs parameters (sizes, not contents) and basic result info.

use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::error::SessionError;
use crate::protocol::*;
use crate::state::AppState;

/// `SessionError` → status code + `{ message }` body.
pub struct ApiError(SessionError);

impl From<SessionError> for ApiError {
  fn from(e: SessionError) -> Self { Self(e) }
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self.0 {
      SessionError::NoQuestionSelected => StatusCode::BAD_REQUEST,
      SessionError::UnknownQuestion(_) => StatusCode::NOT_FOUND,
      SessionError::Busy => StatusCode::CONFLICT,
      SessionError::Closed => StatusCode::SERVICE_UNAVAILABLE,
      SessionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      warn!(target: "sysdesign_trainer", error = %self.0, %status, "Request failed");
    }
    (status, Json(ErrorOut { message: self.0.to_string() })).into_response()
  }
}

fn not_found(message: String) -> Response {
  (StatusCode::NOT_FOUND, Json(ErrorOut { message })).into_response()
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_questions(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
  let questions = state.orchestrator.questions().await?;
  Ok(Json(questions))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_state(State(state): State<AppState>) -> impl IntoResponse {
  Json(state.orchestrator.snapshot())
}

#[instrument(level = "info", skip(state, body), fields(question_len = body.question.len()))]
pub async fn http_post_select(
  State(state): State<AppState>,
  Json(body): Json<SelectIn>,
) -> Result<impl IntoResponse, ApiError> {
  state.orchestrator.select(body.question).await?;
  Ok(Json(state.orchestrator.snapshot()))
}

#[instrument(level = "info", skip(state, body), fields(section = ?body.section, text_len = body.text.len()))]
pub async fn http_put_draft(
  State(state): State<AppState>,
  Json(body): Json<DraftIn>,
) -> Result<impl IntoResponse, ApiError> {
  state.orchestrator.edit(body.section, body.text).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_grade(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
  let question = state.orchestrator.grade().await?;
  info!(target: "scoring", question_len = question.len(), "HTTP grade dispatched");
  Ok((StatusCode::ACCEPTED, Json(GradeOut { question })))
}

#[instrument(level = "info", skip(state), fields(q_len = q.q.len()))]
pub async fn http_get_glossary(
  State(state): State<AppState>,
  Query(q): Query<GlossaryQuery>,
) -> impl IntoResponse {
  Json(state.glossary.search(&q.q))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_definition(
  State(state): State<AppState>,
  Path((section, term)): Path<(String, String)>,
) -> Response {
  match state.glossary.definition(&section, &term) {
    Some(def) => Json(DefinitionOut { definition: def.to_string(), section, term }).into_response(),
    None => not_found(format!("no glossary entry for {term:?} in {section:?}")),
  }
}
