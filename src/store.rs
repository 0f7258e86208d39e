//! Response Store: question → answer record, backed by `user_responses.json`.
//!
//! Each record holds exactly the four answer texts and `current_grade`; any
//! other keys in a stored record are dropped on the next flush.
//!
//! The store is owned by the orchestrator task, so every mutation and flush is
//! already serialized; no lock is needed here.

use std::{
  collections::BTreeMap,
  io::ErrorKind,
  path::{Path, PathBuf},
};

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::catalog::Catalog;
use crate::domain::{AnswerRecord, Draft, Section};
use crate::error::StoreError;

#[derive(Debug)]
pub struct ResponseStore {
  path: PathBuf,
  records: BTreeMap<String, AnswerRecord>,
  dirty: bool,
}

impl ResponseStore {
  /// Load the store and make sure every catalog question has a record.
  ///
  /// A missing or unparseable file is reinitialised (and rewritten) rather than
  /// treated as fatal. Records for questions no longer in the catalog are kept.
  #[instrument(level = "info", skip_all, fields(path = %path.display()))]
  pub fn load(path: &Path, catalog: &Catalog) -> Result<Self, StoreError> {
    let (mut records, mut dirty) = match std::fs::read_to_string(path) {
      Ok(s) => match serde_json::from_str::<BTreeMap<String, Value>>(&s) {
        Ok(raw) => decode_records(raw),
        Err(e) => {
          warn!(target: "store", error = %e, "Responses file is corrupt; reinitialising");
          (BTreeMap::new(), true)
        }
      },
      Err(e) if e.kind() == ErrorKind::NotFound => {
        warn!(target: "store", "Responses file not found; creating it");
        (BTreeMap::new(), true)
      }
      Err(e) => return Err(e.into()),
    };

    for q in catalog.questions() {
      if !records.contains_key(q) {
        records.insert(q.to_string(), AnswerRecord::default());
        dirty = true;
      }
    }

    let mut store = Self { path: path.to_path_buf(), records, dirty };
    store.flush_if_dirty()?;
    Ok(store)
  }

  pub fn get(&self, question: &str) -> Option<&AnswerRecord> {
    self.records.get(question)
  }

  pub fn grade(&self, question: &str) -> u32 {
    self.records.get(question).map(|r| r.current_grade).unwrap_or(0)
  }

  /// Replace the four text sections for `question`, keeping its grade.
  pub fn upsert_draft(&mut self, question: &str, draft: &Draft) {
    let rec = self.records.entry(question.to_string()).or_default();
    if rec.draft != *draft {
      rec.draft = draft.clone();
      self.dirty = true;
    }
  }

  pub fn set_grade(&mut self, question: &str, grade: u32) {
    let rec = self.records.entry(question.to_string()).or_default();
    if rec.current_grade != grade {
      rec.current_grade = grade;
      self.dirty = true;
    }
  }

  pub fn is_dirty(&self) -> bool {
    self.dirty
  }

  /// Write the whole store (pretty JSON) via temp file + rename.
  #[instrument(level = "debug", skip(self), fields(path = %self.path.display(), records = self.records.len()))]
  pub fn flush(&mut self) -> Result<(), StoreError> {
    let body = serde_json::to_string_pretty(&self.records)?;
    if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
      std::fs::create_dir_all(dir)?;
    }
    let tmp = self.path.with_extension("json.tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, &self.path)?;
    self.dirty = false;
    debug!(target: "store", "Responses flushed");
    Ok(())
  }

  pub fn flush_if_dirty(&mut self) -> Result<bool, StoreError> {
    if !self.dirty {
      return Ok(false);
    }
    self.flush()?;
    Ok(true)
  }
}

/// Decode each record field by field: a bad field is reset on its own, so the
/// answer texts survive a malformed grade and vice versa.
fn decode_records(raw: BTreeMap<String, Value>) -> (BTreeMap<String, AnswerRecord>, bool) {
  let mut dirty = false;
  let records = raw
    .into_iter()
    .map(|(q, v)| {
      let (rec, repaired) = decode_record(&q, &v);
      dirty |= repaired;
      (q, rec)
    })
    .collect();
  (records, dirty)
}

/// Returns the record and whether anything had to be defaulted.
fn decode_record(question: &str, v: &Value) -> (AnswerRecord, bool) {
  let Value::Object(fields) = v else {
    warn!(target: "store", %question, "Answer record is not an object; resetting it");
    return (AnswerRecord::default(), true);
  };

  let mut rec = AnswerRecord::default();
  let mut repaired = false;
  for section in Section::ALL {
    match fields.get(section.key()) {
      Some(Value::String(text)) => rec.draft.set(section, text.clone()),
      Some(other) => {
        warn!(target: "store", %question, field = section.key(), value = %other, "Answer text is not a string; clearing it");
        repaired = true;
      }
      None => repaired = true,
    }
  }

  match fields.get("current_grade") {
    Some(g) => match g.as_u64().and_then(|n| u32::try_from(n).ok()) {
      Some(n) => rec.current_grade = n,
      None => {
        warn!(target: "store", %question, value = %g, "Malformed current_grade; resetting it to 0");
        repaired = true;
      }
    },
    None => repaired = true,
  }
  (rec, repaired)
}
