//! Domain models: the four answer sections, the persisted answer record, and parsed scores.

use serde::{Deserialize, Serialize};

/// Maximum score a single rubric dimension can award.
pub const SECTION_MAX: u32 = 4;
/// Maximum total score (four sections at `SECTION_MAX`).
pub const TOTAL_MAX: u32 = SECTION_MAX * 4;

/// One of the four fixed answer sections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
  Requirements,
  Architecture,
  Components,
  Scalability,
}

impl Section {
  pub const ALL: [Section; 4] = [
    Section::Requirements,
    Section::Architecture,
    Section::Components,
    Section::Scalability,
  ];

  /// Field name in the persisted record and in the wire protocol.
  pub fn key(self) -> &'static str {
    match self {
      Section::Requirements => "requirements",
      Section::Architecture => "architecture",
      Section::Components => "components",
      Section::Scalability => "scalability",
    }
  }

  /// Heading used when the answer is embedded in the scoring prompt.
  pub fn heading(self) -> &'static str {
    match self {
      Section::Requirements => "Requirement Analysis & Scoping",
      Section::Architecture => "High-Level Architecture",
      Section::Components => "Component Deep-Dive",
      Section::Scalability => "Scalability & Bottleneck Analysis",
    }
  }

  /// Label the model is asked to use in its reply, e.g. `Requirements Score`.
  pub fn score_label(self) -> &'static str {
    match self {
      Section::Requirements => "Requirements Score",
      Section::Architecture => "Architecture Score",
      Section::Components => "Components Score",
      Section::Scalability => "Scalability Score",
    }
  }

  pub fn from_score_label(label: &str) -> Option<Section> {
    Section::ALL.into_iter().find(|s| s.score_label() == label)
  }
}

/// The four free-text sections of an answer. Used both as the persisted
/// payload and as the transient draft the user edits.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
  #[serde(default)] pub requirements: String,
  #[serde(default)] pub architecture: String,
  #[serde(default)] pub components: String,
  #[serde(default)] pub scalability: String,
}

impl Draft {
  pub fn get(&self, section: Section) -> &str {
    match section {
      Section::Requirements => &self.requirements,
      Section::Architecture => &self.architecture,
      Section::Components => &self.components,
      Section::Scalability => &self.scalability,
    }
  }

  pub fn set(&mut self, section: Section, text: String) {
    match section {
      Section::Requirements => self.requirements = text,
      Section::Architecture => self.architecture = text,
      Section::Components => self.components = text,
      Section::Scalability => self.scalability = text,
    }
  }
}

/// Persisted per-question record: `{requirements, architecture, components, scalability, current_grade}`.
/// Other keys in a stored record are not kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
  #[serde(flatten)]
  pub draft: Draft,
  #[serde(default)]
  pub current_grade: u32,
}

/// Per-section scores recovered from a reply. `None` means no parseable
/// score line was found for that section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SectionScores {
  pub requirements: Option<u32>,
  pub architecture: Option<u32>,
  pub components: Option<u32>,
  pub scalability: Option<u32>,
}

impl SectionScores {
  pub fn get(&self, section: Section) -> Option<u32> {
    match section {
      Section::Requirements => self.requirements,
      Section::Architecture => self.architecture,
      Section::Components => self.components,
      Section::Scalability => self.scalability,
    }
  }

  pub fn set(&mut self, section: Section, score: u32) {
    let slot = match section {
      Section::Requirements => &mut self.requirements,
      Section::Architecture => &mut self.architecture,
      Section::Components => &mut self.components,
      Section::Scalability => &mut self.scalability,
    };
    *slot = Some(score);
  }

  /// Number of sections that never received a parsed score.
  pub fn missing(&self) -> usize {
    Section::ALL.iter().filter(|s| self.get(**s).is_none()).count()
  }
}
