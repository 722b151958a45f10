// src/parse.rs

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static LEADING_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^```(?:json)?\s*").unwrap());
static TRAILING_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*```$").unwrap());

/// Pull a JSON object out of free-form model text.
///
/// Strips surrounding whitespace and a markdown code fence, then parses the
/// span from the first `{` to the last `}`. Returns `None` when there is no
/// such span or it is not valid JSON; callers treat that as "needs repair".
pub fn parse_model_json(text: &str) -> Option<Value> {
    let cleaned = text.trim();
    let cleaned = LEADING_FENCE.replace(cleaned, "");
    let cleaned = TRAILING_FENCE.replace(&cleaned, "");

    let json_str = extract_json_object(&cleaned)?;
    serde_json::from_str(json_str).ok()
}

/// The outermost `{ ... }` span, if the braces are in order.
fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&s[start..=end])
}
