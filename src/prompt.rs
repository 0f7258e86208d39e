//! Scoring prompt construction. Pure and deterministic.

use crate::config::Prompts;
use crate::domain::{Draft, Section};
use crate::util::fill_template;

/// Stands in for a section the user left empty; the model is told to score it 0.
pub const BLANK_MARKER: &str = "[USER LEFT THIS SECTION BLANK]";

/// The user's four sections as one block, headed and blank-substituted.
pub fn render_user_solution(draft: &Draft) -> String {
  Section::ALL
    .iter()
    .map(|s| {
      let text = draft.get(*s).trim();
      let body = if text.is_empty() { BLANK_MARKER } else { text };
      format!("{}:\n{}", s.heading(), body)
    })
    .collect::<Vec<_>>()
    .join("\n\n")
}

pub fn build_prompt(draft: &Draft, canonical_solution: &str, prompts: &Prompts) -> String {
  let user_solution = render_user_solution(draft);
  fill_template(
    &prompts.evaluation_template,
    &[
      ("user_solution", user_solution.as_str()),
      ("canonical_solution", canonical_solution.trim()),
      ("rubric", prompts.rubric.as_str()),
      ("blank_marker", BLANK_MARKER),
    ],
  )
}
