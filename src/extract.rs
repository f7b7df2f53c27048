//! Pull a single JSON array or object out of model output that may be wrapped in prose.
//!
//! The primary strategy is textual: slice from the first opening bracket to the last
//! closing one. When that slice does not parse (two sibling values, or brackets inside
//! string content), the first complete value starting at the opening bracket is taken.

use serde_json::Value;

use crate::error::GenerationError;

/// Extract a JSON array from `text`.
pub fn extract_array(text: &str) -> Result<Value, GenerationError> {
  let value = extract_between(text, '[', ']')
    .ok_or_else(|| GenerationError::Parse("no JSON array found in model output".into()))??;
  if value.is_array() {
    Ok(value)
  } else {
    Err(GenerationError::Shape("extracted value is not an array".into()))
  }
}

/// Extract a JSON object from `text`. Clean JSON with no wrapper prose is accepted as-is.
pub fn extract_object(text: &str) -> Result<Value, GenerationError> {
  if let Ok(v) = serde_json::from_str::<Value>(text.trim()) {
    if v.is_object() {
      return Ok(v);
    }
  }
  let value = extract_between(text, '{', '}')
    .ok_or_else(|| GenerationError::Parse("no JSON object found in model output".into()))??;
  if value.is_object() {
    Ok(value)
  } else {
    Err(GenerationError::Shape("extracted value is not an object".into()))
  }
}

/// `None` when no usable bracket pair exists; otherwise the parse outcome.
fn extract_between(text: &str, open: char, close: char) -> Option<Result<Value, GenerationError>> {
  let first = text.find(open)?;
  let last = text.rfind(close)?;
  if last <= first {
    return None;
  }

  let candidate = &text[first..=last];
  match serde_json::from_str::<Value>(candidate) {
    Ok(v) => Some(Ok(v)),
    Err(e) => Some(first_complete_value(&text[first..]).ok_or_else(|| GenerationError::Parse(e.to_string()))),
  }
}

fn first_complete_value(text: &str) -> Option<Value> {
  serde_json::Deserializer::from_str(text)
    .into_iter::<Value>()
    .next()
    .and_then(Result::ok)
}
