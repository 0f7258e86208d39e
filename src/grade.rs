//! Total score → letter grade.

use std::fmt;

use serde::Serialize;

use crate::domain::TOTAL_MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Letter {
  #[serde(rename = "A+")] APlus,
  #[serde(rename = "A")] A,
  #[serde(rename = "B")] B,
  #[serde(rename = "C")] C,
  #[serde(rename = "C-")] CMinus,
  #[serde(rename = "D")] D,
  #[serde(rename = "F")] F,
}

impl Letter {
  pub fn as_str(self) -> &'static str {
    match self {
      Letter::APlus => "A+",
      Letter::A => "A",
      Letter::B => "B",
      Letter::C => "C",
      Letter::CMinus => "C-",
      Letter::D => "D",
      Letter::F => "F",
    }
  }
}

impl fmt::Display for Letter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Lower percentage bound of each bucket, highest first.
const THRESHOLDS: [(u32, Letter); 6] = [
  (95, Letter::APlus),
  (85, Letter::A),
  (75, Letter::B),
  (65, Letter::C),
  (55, Letter::CMinus),
  (45, Letter::D),
];

/// Map a total (out of 16) to a letter. A boundary percentage belongs to the higher bucket.
///
/// Compares `total * 100 >= pct * 16` so there is no float rounding at the edges.
pub fn grade(total: u32) -> Letter {
  let scaled = u64::from(total) * 100;
  THRESHOLDS
    .iter()
    .find(|(pct, _)| scaled >= u64::from(*pct) * u64::from(TOTAL_MAX))
    .map(|(_, letter)| *letter)
    .unwrap_or(Letter::F)
}

/// Percentage of `TOTAL_MAX`, for display.
pub fn percentage(total: u32) -> f64 {
  f64::from(total) / f64::from(TOTAL_MAX) * 100.0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn boundary_totals_map_to_expected_letters() {
    assert_eq!(grade(16), Letter::APlus);
    assert_eq!(grade(15), Letter::A); // 93.75%
    assert_eq!(grade(14), Letter::A); // 87.5%
    assert_eq!(grade(13), Letter::B); // 81.25%
    assert_eq!(grade(12), Letter::B); // 75%
    assert_eq!(grade(11), Letter::C); // 68.75%
    assert_eq!(grade(10), Letter::CMinus); // 62.5%
    assert_eq!(grade(9), Letter::CMinus); // 56.25%
    assert_eq!(grade(8), Letter::D); // 50%
    assert_eq!(grade(7), Letter::F); // 43.75%
    assert_eq!(grade(0), Letter::F);
  }

  #[test]
  fn grades_never_rise_as_total_drops() {
    let order = |l: Letter| THRESHOLDS.iter().position(|(_, t)| *t == l).unwrap_or(THRESHOLDS.len());
    for total in 1..=TOTAL_MAX {
      assert!(order(grade(total)) <= order(grade(total - 1)), "total {total}");
    }
  }

  #[test]
  fn over_max_totals_stay_at_top_bucket() {
    assert_eq!(grade(20), Letter::APlus);
  }

  #[test]
  fn letters_display_like_the_grade_label() {
    assert_eq!(Letter::CMinus.to_string(), "C-");
    assert_eq!(serde_json::to_value(Letter::APlus).unwrap(), "A+");
    assert!((percentage(10) - 62.5).abs() < f64::EPSILON);
  }
}
