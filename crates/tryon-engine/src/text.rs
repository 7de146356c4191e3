use serde_json::Value;

pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

/// Flattens an error chain into one line, dropping repeated causes.
pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts.last().map(|existing| existing == trimmed).unwrap_or(false) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub fn strip_code_fence(text: &str) -> String {
    let raw = text.trim();
    if !(raw.starts_with("```") && raw.ends_with("```")) {
        return raw.to_string();
    }
    let lines: Vec<&str> = raw.lines().collect();
    if lines.len() < 2 {
        return raw.trim_matches('`').trim().to_string();
    }
    let mut body = lines[1..lines.len() - 1].join("\n").trim().to_string();
    if body.to_ascii_lowercase().starts_with("json") {
        body = body[4..].trim().to_string();
    }
    body
}

/// Model prose reduced to a single bounded line for error messages.
pub fn refusal_preview(text: &str, max_chars: usize) -> String {
    let without_fences = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<&str>>()
        .join(" ")
        .replace('`', "");
    let collapsed = without_fences
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ");
    truncate_text(&collapsed, max_chars)
}

/// Parses a JSON value out of model text, tolerating code fences and prose
/// around the payload.
pub fn extract_json_from_text(text: &str, open: char, close: char) -> Option<Value> {
    let raw = strip_code_fence(text);
    if raw.trim().is_empty() {
        return None;
    }
    let mut candidates = vec![raw.clone()];
    if let (Some(start), Some(end)) = (raw.find(open), raw.rfind(close)) {
        if end > start {
            candidates.push(raw[start..=end].to_string());
        }
    }
    candidates
        .into_iter()
        .find_map(|candidate| serde_json::from_str::<Value>(&candidate).ok())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        error_chain_text, extract_json_from_text, refusal_preview, strip_code_fence,
        truncate_text,
    };

    #[test]
    fn truncate_appends_ellipsis_only_when_cut() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdef", 3), "abc…");
    }

    #[test]
    fn error_chain_text_joins_causes() {
        let err = anyhow::anyhow!("connection reset").context("Gemini request failed");
        assert_eq!(
            error_chain_text(&err, 200),
            "Gemini request failed | caused by: connection reset"
        );
    }

    #[test]
    fn strip_code_fence_removes_json_label() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("plain"), "plain");
    }

    #[test]
    fn refusal_preview_drops_fences_and_bounds_length() {
        let text = "```\nI can't edit this photo\n```\nbecause   it shows a `minor`.";
        assert_eq!(
            refusal_preview(text, 200),
            "I can't edit this photo because it shows a minor."
        );
        assert_eq!(refusal_preview(&"x".repeat(300), 200).chars().count(), 201);
    }

    #[test]
    fn extract_json_finds_payload_inside_prose() {
        assert_eq!(
            extract_json_from_text("Sure! {\"valid\": true} hope that helps", '{', '}'),
            Some(json!({"valid": true}))
        );
        assert_eq!(
            extract_json_from_text("```json\n[1, 2]\n```", '[', ']'),
            Some(json!([1, 2]))
        );
        assert_eq!(extract_json_from_text("no json here", '{', '}'), None);
    }
}
