//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values in a
/// single pass, so substituted values are never re-scanned for placeholders.
/// Unknown `{...}` sequences are copied through unchanged.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = String::with_capacity(tpl.len());
  let mut rest = tpl;
  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let after = &rest[open + 1..];
    let value = after
      .find('}')
      .and_then(|close| pairs.iter().find(|(k, _)| *k == &after[..close]).map(|(_, v)| (close, *v)));
    match value {
      Some((close, v)) => {
        out.push_str(v);
        rest = &after[close + 1..];
      }
      None => {
        out.push('{');
        rest = after;
      }
    }
  }
  out.push_str(rest);
  out
}

/// Log-safe truncation for large strings, on a char boundary.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) {
    cut -= 1;
  }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_known_keys_and_keeps_unknown() {
    let out = fill_template("a={a} b={b} c={c} {", &[("a", "1"), ("b", "2")]);
    assert_eq!(out, "a=1 b=2 c={c} {");
  }

  #[test]
  fn substituted_values_are_not_rescanned() {
    let out = fill_template("{user}|{rubric}", &[("user", "{rubric}"), ("rubric", "R")]);
    assert_eq!(out, "{rubric}|R");
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    let s = "ééééé";
    let t = trunc_for_log(s, 3);
    assert!(t.starts_with('é'));
    assert!(t.ends_with("(10 bytes total)"));
    assert_eq!(trunc_for_log("short", 10), "short");
  }
}
