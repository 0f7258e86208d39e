//! Read-only inputs: the canonical solutions (which define the question set) and the glossary.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::error::ConfigError;

/// Questions in file order, each with its canonical solution text.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
  entries: Vec<(String, String)>,
}

impl Catalog {
  /// Load `{ question: solution }`. Non-string solutions are kept as pretty JSON text.
  #[instrument(level = "info", skip_all, fields(path = %path.display()))]
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let map = read_json_object(path)?;
    if map.is_empty() {
      return Err(ConfigError::Invalid(format!("{} defines no questions", path.display())));
    }
    let entries = map
      .into_iter()
      .map(|(q, v)| {
        let text = match v {
          Value::String(s) => s,
          other => serde_json::to_string_pretty(&other).unwrap_or_default(),
        };
        (q, text)
      })
      .collect::<Vec<_>>();
    info!(target: "sysdesign_trainer", questions = entries.len(), "Loaded canonical solutions");
    Ok(Self { entries })
  }

  pub fn from_entries(entries: Vec<(String, String)>) -> Self {
    Self { entries }
  }

  pub fn questions(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(q, _)| q.as_str())
  }

  pub fn contains(&self, question: &str) -> bool {
    self.entries.iter().any(|(q, _)| q == question)
  }

  pub fn solution(&self, question: &str) -> Option<&str> {
    self.entries.iter().find(|(q, _)| q == question).map(|(_, s)| s.as_str())
  }

  pub fn first(&self) -> Option<&str> {
    self.entries.first().map(|(q, _)| q.as_str())
  }
}

/// `{ section: { term: definition } }`, order preserved.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Glossary {
  pub sections: Vec<GlossarySection>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct GlossarySection {
  pub name: String,
  pub terms: Vec<GlossaryTerm>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct GlossaryTerm {
  pub term: String,
  pub definition: String,
}

impl Glossary {
  /// A missing file yields an empty glossary; a malformed one is a config error.
  #[instrument(level = "info", skip_all, fields(path = %path.display()))]
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    if !path.exists() {
      warn!(target: "sysdesign_trainer", path = %path.display(), "Glossary file not found; glossary will be empty");
      return Ok(Self::default());
    }
    let map = read_json_object(path)?;
    let mut sections = Vec::with_capacity(map.len());
    for (name, terms) in map {
      let Value::Object(terms) = terms else {
        return Err(ConfigError::Invalid(format!("glossary section {name:?} must be an object of term -> definition")));
      };
      let terms = terms
        .into_iter()
        .map(|(term, def)| GlossaryTerm {
          term,
          definition: match def {
            Value::String(s) => s,
            other => other.to_string(),
          },
        })
        .collect();
      sections.push(GlossarySection { name, terms });
    }
    Ok(Self { sections })
  }

  /// Terms whose name contains `query` (case-insensitive). Sections are always kept,
  /// even when none of their terms match.
  pub fn search(&self, query: &str) -> Glossary {
    let needle = query.trim().to_lowercase();
    let sections = self
      .sections
      .iter()
      .map(|s| GlossarySection {
        name: s.name.clone(),
        terms: s
          .terms
          .iter()
          .filter(|t| needle.is_empty() || t.term.to_lowercase().contains(&needle))
          .cloned()
          .collect(),
      })
      .collect();
    Glossary { sections }
  }

  pub fn definition(&self, section: &str, term: &str) -> Option<&str> {
    self
      .sections
      .iter()
      .find(|s| s.name == section)?
      .terms
      .iter()
      .find(|t| t.term == term)
      .map(|t| t.definition.as_str())
  }
}

fn read_json_object(path: &Path) -> Result<Map<String, Value>, ConfigError> {
  let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
  serde_json::from_str::<Map<String, Value>>(&s).map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })
}
