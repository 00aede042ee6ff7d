/*!
 * Recovery of translated items from free-form LLM output.
 *
 * Models are asked for a bare JSON array of `{id, text}` objects but often
 * add prose or code fences around it. The first balanced `[...]` span is
 * taken as the answer; brackets inside JSON strings do not count.
 */

use std::collections::HashMap;

use serde_json::Value;

/// The first balanced `[...]` span in `text`
pub fn find_balanced_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the id -> text mapping out of a model response.
///
/// Returns `None` when no array can be found or parsed. Array elements that
/// are not objects with an integer-like `id` and a string `text` are ignored.
pub fn parse_translations(response: &str) -> Option<HashMap<usize, String>> {
    let span = find_balanced_array(response)?;
    let items: Vec<Value> = serde_json::from_str(span).ok()?;

    let mapping = items
        .iter()
        .filter_map(|item| {
            let id = parse_id(item.get("id")?)?;
            let text = item.get("text")?.as_str()?;
            Some((id, text.to_string()))
        })
        .collect();
    Some(mapping)
}

fn parse_id(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|id| usize::try_from(id).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
