//! Best-effort parsing of the model's scoring reply.
//!
//! Expected lines look like `Requirements Score: 3 - justification`. Parsing never
//! fails: a line with an unknown label or a non-numeric score is skipped, so a
//! malformed reply under-scores instead of erroring. Every recognized line adds to
//! the total, even if a label repeats or the score exceeds the rubric maximum; the
//! per-section slot keeps the last value.

use serde::Serialize;

use crate::domain::{Section, SectionScores};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ParsedReply {
  pub scores: SectionScores,
  pub total: u32,
  /// Sections with no parseable score line. Informational only.
  pub unparsed_sections: usize,
}

pub fn parse_reply(text: &str) -> ParsedReply {
  let mut scores = SectionScores::default();
  let mut total = 0u32;

  for line in text.lines() {
    let Some((label, rest)) = line.split_once(':') else { continue };
    let Some(section) = Section::from_score_label(clean_label(label)) else { continue };
    let Some(score) = first_score_token(rest) else { continue };
    total = total.saturating_add(score);
    scores.set(section, score);
  }

  ParsedReply { unparsed_sections: scores.missing(), scores, total }
}

/// Strip whitespace plus markdown bullets/emphasis around a label:
/// `"- **Requirements Score"` → `"Requirements Score"`.
fn clean_label(label: &str) -> &str {
  label.trim().trim_start_matches(['-', '#', '>']).trim().trim_matches('*').trim()
}

/// First whitespace token after the colon, ignoring a bare `**` left by `**Label:**`.
/// Any non-negative integer counts; a score above `SECTION_MAX` is summed as given.
fn first_score_token(rest: &str) -> Option<u32> {
  let token = rest
    .split_whitespace()
    .map(|t| t.trim_matches('*'))
    .find(|t| !t.is_empty())?;
  token.parse::<u32>().ok()
}
