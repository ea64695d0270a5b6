//! Pull JSON out of LLM output that may be wrapped in prose or markdown.

/// Extract a JSON object (`{...}`) from model output.
pub fn extract_json_object(text: &str) -> String {
    extract_delimited(text, '{', '}')
}

/// Extract a JSON array (`[...]`) from model output.
pub fn extract_json_array(text: &str) -> String {
    extract_delimited(text, '[', ']')
}

fn extract_delimited(text: &str, open: char, close: char) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with(open) {
        return trimmed.to_string();
    }

    // Fenced code block, with or without a language tag.
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with(open) {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
