use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerifyError {
    NoMatchingSnippet,
    QuoteNotInSnippet,
}

impl VerifyError {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyError::NoMatchingSnippet => "no_matching_snippet",
            VerifyError::QuoteNotInSnippet => "quote_not_in_snippet",
        }
    }
}

/// Resolved citation. Empty `line_numbers` means the quote could not be located.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CitationRef {
    pub line_hint: String,
    pub line_numbers: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_error: Option<VerifyError>,
}

/// Citation as claimed by the oracle, before verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ClaimedRef {
    pub source: String,
    pub page: Option<u32>,
    pub line_start: Option<usize>,
    pub line_end: Option<usize>,
    pub quote: String,
}

impl ClaimedRef {
    /// Lenient read of an oracle-produced ref; numbers may arrive as strings.
    pub fn from_value(v: &Value) -> Self {
        Self {
            source: v
                .get("source")
                .map(value_to_plain_string)
                .unwrap_or_default(),
            page: v
                .get("page")
                .and_then(value_as_u64)
                .and_then(|p| u32::try_from(p).ok()),
            line_start: v
                .get("line_start")
                .and_then(value_as_u64)
                .and_then(|n| usize::try_from(n).ok()),
            line_end: v
                .get("line_end")
                .and_then(value_as_u64)
                .and_then(|n| usize::try_from(n).ok()),
            quote: v
                .get("quote")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
        }
    }
}

pub fn claimed_refs_from_value(v: Option<&Value>) -> Vec<ClaimedRef> {
    v.and_then(Value::as_array)
        .map(|arr| arr.iter().map(ClaimedRef::from_value).collect())
        .unwrap_or_default()
}

fn value_as_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_plain_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
