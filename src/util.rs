//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// Unknown braces (e.g. JSON examples in prompts) are left untouched.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Log-safe truncation for large strings, cut on a char boundary.
pub fn trunc_for_log(s: &str, max_chars: usize) -> String {
  let total = s.chars().count();
  if total <= max_chars {
    s.to_string()
  } else {
    let head: String = s.chars().take(max_chars).collect();
    format!("{}… ({} chars total)", head, total)
  }
}

/// Positional letter id: 0 → "a", 25 → "z", 26 → "aa", 27 → "ab", ...
pub fn position_letter(pos: usize) -> String {
  let mut n = pos + 1;
  let mut out = Vec::new();
  while n > 0 {
    let rem = (n - 1) % 26;
    out.push((b'a' + rem as u8) as char);
    n = (n - 1) / 26;
  }
  out.iter().rev().collect()
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
  let f = 10f64.powi(decimals);
  (value * f).round() / f
}
