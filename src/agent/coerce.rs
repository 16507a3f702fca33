use serde_json::Value;

/// Best-effort recovery of a JSON document from agent output. Two passes
/// only: strip a markdown code fence, then slice the outermost braces.
/// Anything still unparseable is the caller's error to surface.
pub fn coerce_json(raw: &str) -> Result<Value, String> {
    let text = strip_code_fence(raw.trim());
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }
    if let Some(sliced) = outermost_object(text) {
        if let Ok(value) = serde_json::from_str::<Value>(sliced) {
            return Ok(value);
        }
    }
    Err(format!(
        "response is not valid json (first 80 chars: {:?})",
        text.chars().take(80).collect::<String>()
    ))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag on the opening fence line.
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    match rest.rfind("```") {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    }
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}
