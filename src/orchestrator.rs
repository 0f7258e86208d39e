//! Orchestrator task: the single owner of the `Session` (and thus the store).
//!
//! HTTP/WS handlers and the autosave ticker send commands over an mpsc channel;
//! the scoring worker posts its completion back onto the same channel, so every
//! state mutation and every flush happens on this one task. Rendered state is
//! published through a `watch` channel after each message.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::domain::Section;
use crate::error::{ScoreError, SessionError};
use crate::scoring::ScoringClient;
use crate::session::{QuestionSummary, Session, View};

const COMMAND_BUFFER: usize = 64;

enum Msg {
  Select { question: String, reply: oneshot::Sender<Result<(), SessionError>> },
  Edit { section: Section, text: String, reply: oneshot::Sender<Result<(), SessionError>> },
  Grade { reply: oneshot::Sender<Result<String, SessionError>> },
  Questions { reply: oneshot::Sender<Vec<QuestionSummary>> },
  Autosave,
  Shutdown { reply: oneshot::Sender<()> },
  Completed { ticket: Uuid, outcome: Result<String, ScoreError> },
}

/// Cheap, cloneable front door to the orchestrator task.
#[derive(Clone)]
pub struct OrchestratorHandle {
  tx: mpsc::Sender<Msg>,
  view: watch::Receiver<View>,
}

impl OrchestratorHandle {
  pub async fn select(&self, question: String) -> Result<(), SessionError> {
    self.request(|reply| Msg::Select { question, reply }).await?
  }

  pub async fn edit(&self, section: Section, text: String) -> Result<(), SessionError> {
    self.request(|reply| Msg::Edit { section, text, reply }).await?
  }

  /// Dispatch a grading call. Returns the question being graded.
  pub async fn grade(&self) -> Result<String, SessionError> {
    self.request(|reply| Msg::Grade { reply }).await?
  }

  pub async fn questions(&self) -> Result<Vec<QuestionSummary>, SessionError> {
    self.request(|reply| Msg::Questions { reply }).await
  }

  /// Save the active draft, flush, and stop the task.
  pub async fn shutdown(&self) -> Result<(), SessionError> {
    self.request(|reply| Msg::Shutdown { reply }).await
  }

  pub fn snapshot(&self) -> View {
    self.view.borrow().clone()
  }

  pub fn subscribe(&self) -> watch::Receiver<View> {
    self.view.clone()
  }

  /// Send `Msg::Autosave` every `every`; stops once the orchestrator is gone.
  pub fn spawn_autosave(&self, every: Duration) -> JoinHandle<()> {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(every);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      ticker.tick().await;
      loop {
        ticker.tick().await;
        if tx.send(Msg::Autosave).await.is_err() {
          debug!(target: "store", "Autosave ticker stopping");
          break;
        }
      }
    })
  }

  async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Msg) -> Result<T, SessionError> {
    let (reply, rx) = oneshot::channel();
    self.tx.send(make(reply)).await.map_err(|_| SessionError::Closed)?;
    rx.await.map_err(|_| SessionError::Closed)
  }
}

/// Spawn the orchestrator task around `session`.
pub fn spawn(session: Session, client: ScoringClient) -> (OrchestratorHandle, JoinHandle<()>) {
  let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
  let (view_tx, view_rx) = watch::channel(session.view());
  let worker_tx = tx.downgrade();
  let task = tokio::spawn(run(session, client, rx, worker_tx, view_tx));
  (OrchestratorHandle { tx, view: view_rx }, task)
}

#[instrument(level = "info", name = "orchestrator", skip_all)]
async fn run(
  mut session: Session,
  client: ScoringClient,
  mut rx: mpsc::Receiver<Msg>,
  worker_tx: mpsc::WeakSender<Msg>,
  view_tx: watch::Sender<View>,
) {
  info!(target: "sysdesign_trainer", "Orchestrator started");
  // The view is published before a caller is answered, so a handler that awaits
  // a reply and then reads `snapshot()` sees its own change.
  let publish = |s: &Session| {
    view_tx.send_replace(s.view());
  };

  while let Some(msg) = rx.recv().await {
    match msg {
      Msg::Select { question, reply } => {
        let res = session.select(&question);
        debug!(target: "sysdesign_trainer", selected = ?session.selected(), ok = res.is_ok(), "Select handled");
        publish(&session);
        let _ = reply.send(res);
      }
      Msg::Edit { section, text, reply } => {
        let res = session.edit(section, text);
        publish(&session);
        let _ = reply.send(res);
      }
      Msg::Grade { reply } => {
        let Some(tx) = worker_tx.upgrade() else {
          let _ = reply.send(Err(SessionError::Closed));
          break;
        };
        let res = session.start().map(|req| {
          let question = req.ticket.question.clone();
          let client = client.clone();
          tokio::spawn(async move {
            let outcome = client.score(&req.prompt).await;
            let _ = tx.send(Msg::Completed { ticket: req.ticket.id, outcome }).await;
          });
          question
        });
        publish(&session);
        let _ = reply.send(res);
      }
      Msg::Completed { ticket, outcome } => {
        if session.finish(ticket, outcome) {
          debug!(target: "scoring", phase = session.phase().name(), "Scoring call resolved");
          publish(&session);
          session.settle();
          publish(&session);
        }
      }
      Msg::Questions { reply } => {
        let _ = reply.send(session.questions());
      }
      Msg::Autosave => {
        if let Err(e) = session.autosave() {
          error!(target: "store", error = %e, "Autosave failed");
        }
      }
      Msg::Shutdown { reply } => {
        if let Err(e) = session.autosave() {
          error!(target: "store", error = %e, "Final save failed");
        }
        let _ = reply.send(());
        break;
      }
    }
  }
  info!(target: "sysdesign_trainer", "Orchestrator stopped");
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::scoring::testing::ScriptedScorer;
  use crate::session::tests::{session_in, GOOD_REPLY, Q1, Q2};
  use crate::session::Panel;

  async fn wait_for(rx: &mut watch::Receiver<View>, pred: impl Fn(&View) -> bool) -> View {
    loop {
      {
        let v = rx.borrow_and_update();
        if pred(&*v) {
          return (*v).clone();
        }
      }
      rx.changed().await.expect("orchestrator alive");
    }
  }

  #[tokio::test]
  async fn grading_round_trip_through_the_task() {
    let dir = tempfile::tempdir().unwrap();
    let (scorer, replies) = ScriptedScorer::new();
    let (handle, task) = spawn(session_in(dir.path()), ScoringClient::new(scorer, Duration::from_secs(5)));
    let mut views = handle.subscribe();

    handle.edit(Section::Requirements, "read heavy".into()).await.unwrap();
    assert_eq!(handle.grade().await.unwrap(), Q1);
    assert!(matches!(handle.grade().await, Err(SessionError::Busy)));
    assert!(!handle.snapshot().can_grade);

    replies.send(Ok(GOOD_REPLY.into())).unwrap();
    let v = wait_for(&mut views, |v| v.can_grade && v.grade == 10).await;
    assert!(matches!(v.panel, Panel::Analysis(ref c) if c.parsed.total == 10));

    handle.shutdown().await.unwrap();
    task.await.unwrap();
  }

  #[tokio::test]
  async fn switching_mid_flight_grades_the_dispatched_question() {
    let dir = tempfile::tempdir().unwrap();
    let (scorer, replies) = ScriptedScorer::new();
    let (handle, task) = spawn(session_in(dir.path()), ScoringClient::new(scorer, Duration::from_secs(5)));
    let mut views = handle.subscribe();

    handle.grade().await.unwrap();
    handle.select(Q2.into()).await.unwrap();
    replies.send(Ok(GOOD_REPLY.into())).unwrap();
    let v = wait_for(&mut views, |v| v.can_grade).await;
    assert_eq!(v.question.as_deref(), Some(Q2));
    assert_eq!(v.grade, 0);

    let qs = handle.questions().await.unwrap();
    assert_eq!((qs[0].question.as_str(), qs[0].grade), (Q1, 10));
    assert_eq!(qs[1].grade, 0);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
  }

  #[tokio::test(start_paused = true)]
  async fn timeout_is_reported_and_control_restored() {
    let dir = tempfile::tempdir().unwrap();
    let (scorer, _replies) = ScriptedScorer::new();
    let (handle, task) = spawn(session_in(dir.path()), ScoringClient::new(scorer, Duration::from_millis(6_500)));
    let mut views = handle.subscribe();

    handle.grade().await.unwrap();
    let v = wait_for(&mut views, |v| v.can_grade).await;
    assert_eq!(v.grade, 0);
    assert!(matches!(v.panel, Panel::Error { ref message, .. } if message.contains("timed out")));

    handle.shutdown().await.unwrap();
    task.await.unwrap();
  }

  #[tokio::test(start_paused = true)]
  async fn autosave_ticker_persists_edits() {
    let dir = tempfile::tempdir().unwrap();
    let (scorer, _replies) = ScriptedScorer::new();
    let (handle, task) = spawn(session_in(dir.path()), ScoringClient::new(scorer, Duration::from_secs(5)));
    let ticker = handle.spawn_autosave(Duration::from_secs(5));

    handle.edit(Section::Components, "bloom filter".into()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;
    // Round-trip a request so the queued autosave has been handled.
    handle.questions().await.unwrap();

    let on_disk: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(dir.path().join("user_responses.json")).unwrap()).unwrap();
    assert_eq!(on_disk[Q1]["components"], "bloom filter");

    handle.shutdown().await.unwrap();
    task.await.unwrap();
    ticker.abort();
  }
}
