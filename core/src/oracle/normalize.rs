use crate::error::{CoreError, CoreResult};
use serde_json::Value;

/// Extract the first well-formed JSON value from free-form oracle text.
///
/// Tries the trimmed text as-is, then starts at the first `{` or `[` and
/// shrinks the end backwards until a prefix parses. Truncated or broken JSON
/// is not repaired.
pub fn extract_json(raw: &str) -> CoreResult<Value> {
    let text = raw.trim();
    if let Ok(v) = serde_json::from_str::<Value>(text) {
        return Ok(v);
    }

    let start = match (text.find('{'), text.find('[')) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => {
            return Err(CoreError::malformed("no JSON found in oracle output", raw));
        }
    };

    // An object or array can only end on a closing bracket, so only those
    // end positions are worth a parse attempt.
    let candidate = &text[start..];
    for (idx, c) in candidate.char_indices().rev() {
        if c != '}' && c != ']' {
            continue;
        }
        let end = idx + c.len_utf8();
        if let Ok(v) = serde_json::from_str::<Value>(&candidate[..end]) {
            return Ok(v);
        }
    }
    Err(CoreError::malformed(
        "could not parse JSON from oracle output",
        raw,
    ))
}

/// `extract_json` that additionally requires a top-level array.
pub fn extract_json_array(raw: &str) -> CoreResult<Vec<Value>> {
    match extract_json(raw)? {
        Value::Array(items) => Ok(items),
        _ => Err(CoreError::malformed("oracle JSON is not a list", raw)),
    }
}
