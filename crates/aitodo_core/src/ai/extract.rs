//! Pulling JSON out of free-form model replies.
//!
//! Models like to wrap the payload in prose or code fences. Extraction is two
//! steps: find a balanced `{..}` or `[..]` span, then parse it. Brackets inside
//! JSON strings are ignored while balancing.

use super::EnrichmentError;
use serde_json::Value;

/// First balanced span that opens with `open` and closes with `close`.
pub fn find_balanced(text: &str, open: char, close: char) -> Option<&str> {
    balanced_span(text, 0, open, close).map(|(start, end)| &text[start..end])
}

/// First `{..}` span in `text` that parses as a JSON object.
pub fn extract_json_object(text: &str) -> Result<serde_json::Map<String, Value>, EnrichmentError> {
    match extract_json(text, '{', '}')? {
        Value::Object(map) => Ok(map),
        _ => Err(EnrichmentError::MalformedJson("expected a JSON object".to_string())),
    }
}

/// First `[..]` span in `text` that parses as a JSON array.
pub fn extract_json_array(text: &str) -> Result<Vec<Value>, EnrichmentError> {
    match extract_json(text, '[', ']')? {
        Value::Array(items) => Ok(items),
        _ => Err(EnrichmentError::MalformedJson("expected a JSON array".to_string())),
    }
}

fn extract_json(text: &str, open: char, close: char) -> Result<Value, EnrichmentError> {
    let mut from = 0;
    let mut last_error = None;

    while let Some((start, end)) = balanced_span(text, from, open, close) {
        match serde_json::from_str::<Value>(&text[start..end]) {
            Ok(value) => return Ok(value),
            Err(err) => last_error = Some(err.to_string()),
        }
        from = start + open.len_utf8();
    }

    Err(match last_error {
        Some(reason) => EnrichmentError::MalformedJson(reason),
        None => EnrichmentError::NoJson,
    })
}

/// Byte range of the first balanced span starting at or after `from`.
fn balanced_span(text: &str, mut from: usize, open: char, close: char) -> Option<(usize, usize)> {
    while let Some(offset) = text[from..].find(open) {
        let start = from + offset;
        if let Some(len) = balanced_end(&text[start..], open, close) {
            return Some((start, start + len));
        }
        from = start + open.len_utf8();
    }
    None
}

/// Byte length of the balanced span at the start of `text`, if it closes.
fn balanced_end(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
        } else if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(index + ch.len_utf8());
            }
        }
    }

    None
}
