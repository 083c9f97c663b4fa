//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings.
/// Cuts on a char boundary so multi-byte text never panics.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

/// Title from a `Title: ...` line, as generated problems are formatted.
pub fn extract_title(statement: &str) -> Option<String> {
  statement
    .lines()
    .map(str::trim)
    .find_map(|line| line.strip_prefix("Title:"))
    .map(|t| t.trim().to_string())
    .filter(|t| !t.is_empty())
}

/// True if a chat message is asking for code.
pub fn is_code_request(message: &str) -> bool {
  let lower = message.to_lowercase();
  ["code", "solution", "implement", "write"].iter().any(|k| lower.contains(k))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_every_occurrence() {
    let out = fill_template("{a} and {b} and {a}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and y and x");
  }

  #[test]
  fn trunc_respects_char_boundaries() {
    let s = "ééééé";
    let t = trunc_for_log(s, 3);
    assert!(t.starts_with('é'));
    assert!(t.ends_with("(10 bytes total)"));
    assert_eq!(trunc_for_log("short", 10), "short");
  }

  #[test]
  fn title_line_is_found() {
    let stmt = "Title: Two Sum Variants\n\nDescription:\n...";
    assert_eq!(extract_title(stmt).as_deref(), Some("Two Sum Variants"));
    assert_eq!(extract_title("no title here"), None);
  }

  #[test]
  fn code_requests_are_detected() {
    assert!(is_code_request("Can you WRITE it for me?"));
    assert!(!is_code_request("what is a heap"));
  }
}
