//! The grading state machine, independent of any transport or UI.
//!
//! ```text
//! Idle --start--> Scoring --finish(Ok)--> Displaying --settle--> Idle
//!                         --finish(Err)-> Failed     --settle--> Idle
//! ```
//!
//! A `Ticket` captures the question at dispatch time. The result of a scoring
//! call is always applied to the ticket's question, even if the user has since
//! selected another one.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::Prompts;
use crate::domain::{Draft, Section};
use crate::error::{ScoreError, SessionError, StoreError};
use crate::grade::{grade, percentage, Letter};
use crate::prompt::build_prompt;
use crate::reply::{parse_reply, ParsedReply};
use crate::store::ResponseStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
  pub id: Uuid,
  pub question: String,
}

/// What `start` hands to the scoring worker.
#[derive(Clone, Debug)]
pub struct ScoreRequest {
  pub ticket: Ticket,
  pub prompt: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoreCard {
  pub question: String,
  /// Raw model reply, shown verbatim.
  pub text: String,
  #[serde(flatten)]
  pub parsed: ParsedReply,
  pub letter: Letter,
  pub percent: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Phase {
  Idle,
  Scoring(Ticket),
  Displaying(ScoreCard),
  Failed { question: String, message: String },
}

impl Phase {
  pub fn name(&self) -> &'static str {
    match self {
      Phase::Idle => "idle",
      Phase::Scoring(_) => "scoring",
      Phase::Displaying(_) => "displaying",
      Phase::Failed { .. } => "failed",
    }
  }
}

/// Result area shown under the answer fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Panel {
  #[default]
  None,
  Analysis(ScoreCard),
  Error { question: String, message: String },
}

/// Rendered state pushed to clients.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct View {
  pub question: Option<String>,
  pub draft: Draft,
  pub grade: u32,
  pub letter: Letter,
  pub phase: &'static str,
  pub scoring_question: Option<String>,
  pub can_grade: bool,
  pub panel: Panel,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuestionSummary {
  pub question: String,
  pub grade: u32,
  pub letter: Letter,
}

pub struct Session {
  catalog: Arc<Catalog>,
  store: ResponseStore,
  prompts: Prompts,
  selected: Option<String>,
  draft: Draft,
  phase: Phase,
  panel: Panel,
}

impl Session {
  /// Starts with the first catalog question selected.
  pub fn new(catalog: Arc<Catalog>, store: ResponseStore, prompts: Prompts) -> Self {
    let mut s = Self {
      catalog,
      store,
      prompts,
      selected: None,
      draft: Draft::default(),
      phase: Phase::Idle,
      panel: Panel::None,
    };
    if let Some(first) = s.catalog.first().map(str::to_string) {
      s.load_draft(&first);
      s.selected = Some(first);
    }
    s
  }

  pub fn phase(&self) -> &Phase {
    &self.phase
  }

  pub fn selected(&self) -> Option<&str> {
    self.selected.as_deref()
  }

  #[cfg(test)]
  pub fn store(&self) -> &ResponseStore {
    &self.store
  }

  /// Save the draft being left, then load `question`. Allowed while scoring.
  #[instrument(level = "debug", skip(self))]
  pub fn select(&mut self, question: &str) -> Result<(), SessionError> {
    if !self.catalog.contains(question) {
      return Err(SessionError::UnknownQuestion(question.to_string()));
    }
    self.save_draft()?;
    self.load_draft(question);
    self.selected = Some(question.to_string());
    self.panel = Panel::None;
    Ok(())
  }

  pub fn edit(&mut self, section: Section, text: String) -> Result<(), SessionError> {
    if self.selected.is_none() {
      return Err(SessionError::NoQuestionSelected);
    }
    self.draft.set(section, text);
    Ok(())
  }

  /// `Idle --start--> Scoring`. Persists the draft first, then builds the prompt.
  #[instrument(level = "info", target = "scoring", skip(self))]
  pub fn start(&mut self) -> Result<ScoreRequest, SessionError> {
    if matches!(self.phase, Phase::Scoring(_)) {
      return Err(SessionError::Busy);
    }
    let question = self.selected.clone().ok_or(SessionError::NoQuestionSelected)?;
    self.settle();
    self.save_draft()?;

    let canonical = self.catalog.solution(&question).unwrap_or_default();
    let prompt = build_prompt(&self.draft, canonical, &self.prompts);
    let ticket = Ticket { id: Uuid::new_v4(), question };
    info!(target: "scoring", ticket = %ticket.id, prompt_len = prompt.len(), "Grading dispatched");
    self.phase = Phase::Scoring(ticket.clone());
    Ok(ScoreRequest { ticket, prompt })
  }

  /// `Scoring --finish--> Displaying | Failed`. Returns false (and changes nothing)
  /// when `ticket_id` is not the call in flight.
  #[instrument(level = "info", target = "scoring", skip(self, outcome), fields(ok = outcome.is_ok()))]
  pub fn finish(&mut self, ticket_id: Uuid, outcome: Result<String, ScoreError>) -> bool {
    let ticket = match &self.phase {
      Phase::Scoring(t) if t.id == ticket_id => t.clone(),
      _ => {
        warn!(target: "scoring", %ticket_id, phase = self.phase.name(), "Ignoring result for a call that is not in flight");
        return false;
      }
    };

    self.phase = match outcome {
      Ok(text) => {
        let parsed = parse_reply(&text);
        let letter = grade(parsed.total);
        self.store.set_grade(&ticket.question, parsed.total);
        if let Err(e) = self.store.flush() {
          error!(target: "store", question = %ticket.question, error = %e, "Failed to persist grade");
        }
        if parsed.unparsed_sections > 0 {
          warn!(target: "scoring", unparsed = parsed.unparsed_sections, "Some section scores could not be parsed");
        }
        info!(target: "scoring", question = %ticket.question, total = parsed.total, %letter, "Grade recorded");
        let percent = percentage(parsed.total);
        Phase::Displaying(ScoreCard { question: ticket.question, text, parsed, letter, percent })
      }
      Err(e) => Phase::Failed { question: ticket.question, message: format!("An error occurred: {e}") },
    };
    true
  }

  /// `Displaying | Failed --> Idle`, keeping the outcome in the panel.
  pub fn settle(&mut self) {
    match std::mem::replace(&mut self.phase, Phase::Idle) {
      Phase::Displaying(card) => self.panel = Panel::Analysis(card),
      Phase::Failed { question, message } => self.panel = Panel::Error { question, message },
      other => self.phase = other,
    }
  }

  /// Periodic save of the active draft. Returns whether anything was written.
  pub fn autosave(&mut self) -> Result<bool, StoreError> {
    if let Some(q) = &self.selected {
      self.store.upsert_draft(q, &self.draft);
    }
    self.store.flush_if_dirty()
  }

  pub fn view(&self) -> View {
    let grade_now = self.selected.as_deref().map(|q| self.store.grade(q)).unwrap_or(0);
    let scoring_question = match &self.phase {
      Phase::Scoring(t) => Some(t.question.clone()),
      _ => None,
    };
    View {
      question: self.selected.clone(),
      draft: self.draft.clone(),
      grade: grade_now,
      letter: grade(grade_now),
      phase: self.phase.name(),
      can_grade: self.selected.is_some() && scoring_question.is_none(),
      scoring_question,
      panel: match &self.phase {
        Phase::Displaying(card) => Panel::Analysis(card.clone()),
        Phase::Failed { question, message } => Panel::Error { question: question.clone(), message: message.clone() },
        _ => self.panel.clone(),
      },
    }
  }

  pub fn questions(&self) -> Vec<QuestionSummary> {
    self
      .catalog
      .questions()
      .map(|q| {
        let g = self.store.grade(q);
        QuestionSummary { question: q.to_string(), grade: g, letter: grade(g) }
      })
      .collect()
  }

  fn save_draft(&mut self) -> Result<(), StoreError> {
    if let Some(q) = &self.selected {
      self.store.upsert_draft(q, &self.draft);
      self.store.flush_if_dirty()?;
    }
    Ok(())
  }

  fn load_draft(&mut self, question: &str) {
    self.draft = self.store.get(question).map(|r| r.draft.clone()).unwrap_or_default();
  }
}
