/*!
 * Extraction of structured tool output from protocol result envelopes.
 *
 * A `tools/call` result nests the actual tool output inside a `content` list
 * of typed items. Servers usually put a JSON document in the `text` field of
 * the first item, but some wrap it in prose with a fenced ```json block.
 * Recovery from the fenced form is best effort.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static FENCED_JSON_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```json\s*\n(.*?)\n\s*```").unwrap()
});

/// Unwraps tool results into plain JSON documents
pub struct ResultExtractor;

impl ResultExtractor {
    /// Extract the first JSON object or array carried by a result envelope.
    ///
    /// Never fails: an envelope without usable text yields an empty object,
    /// which callers treat as "nothing found".
    pub fn extract(envelope: &Value) -> Value {
        let Some(content) = envelope.get("content").and_then(Value::as_array) else {
            return Self::empty();
        };

        for item in content {
            let Some(text) = item.get("text").and_then(Value::as_str) else {
                continue;
            };
            if text.is_empty() {
                continue;
            }
            if let Some(parsed) = Self::parse_text(text) {
                return parsed;
            }
            debug!("Tool result text did not contain JSON: {}", truncate(text, 200));
        }

        Self::empty()
    }

    /// Parse a text payload as JSON, directly or from a fenced `json` block
    pub fn parse_text(text: &str) -> Option<Value> {
        if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
            if is_structured(&value) {
                return Some(value);
            }
        }

        let inner = FENCED_JSON_REGEX.captures(text)?.get(1)?.as_str();
        serde_json::from_str::<Value>(inner)
            .ok()
            .filter(is_structured)
    }

    /// The empty mapping returned when nothing usable was found
    pub fn empty() -> Value {
        Value::Object(Map::new())
    }
}

fn is_structured(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

/// Cut a string to at most `max_chars` characters for logging
pub(crate) fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
