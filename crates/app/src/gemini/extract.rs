//! Pull a JSON object out of free-form model output.
//!
//! Models asked for "JSON only" still wrap it in prose or a Markdown fence.
//! Order of preference: a fenced block, then the first balanced `{...}` span,
//! then the text as-is.

/// Best-effort JSON object text within `text`.
#[must_use]
pub fn extract_json_object(text: &str) -> &str {
    if let Some(fenced) = fenced_block(text) {
        return fenced;
    }
    if let Some(span) = balanced_object(text) {
        return span;
    }
    text.trim()
}

/// Object text inside the first fence whose body holds a `{`.
///
/// A leading language tag such as `json` is skipped whether the object
/// starts on the next line or on the same one.
fn fenced_block(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some((_, after)) = rest.split_once("```") {
        let (inner, remaining) = after.split_once("```")?;
        let body = skip_language_tag(inner);
        if body.contains('{') {
            return Some(balanced_object(body).unwrap_or_else(|| body.trim()));
        }
        rest = remaining;
    }
    None
}

fn skip_language_tag(body: &str) -> &str {
    let tag_len = body
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    let after = body.get(tag_len..).unwrap_or(body);
    let tag_ends = after.is_empty() || after.starts_with(char::is_whitespace) || after.starts_with('{');
    if tag_len > 0 && tag_ends { after } else { body }
}

/// First `{` through its matching `}`, ignoring braces inside strings.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let tail = text.get(start..)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in tail.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return tail.get(..=offset);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json_block() {
        let text = "Iste yorumun:\n```json\n{\"motto\":\"X\",\"love\":80}\n```\nIyi gunler!";
        assert_eq!(extract_json_object(text), "{\"motto\":\"X\",\"love\":80}");
    }

    #[test]
    fn test_bare_fence() {
        let text = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json_object(text), "{\"a\": 1}");
    }

    #[test]
    fn test_inline_fence() {
        assert_eq!(extract_json_object("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_tagged_fence_with_inline_object() {
        assert_eq!(
            extract_json_object("```json {\"motto\":\"X\",\"love\":80}```"),
            "{\"motto\":\"X\",\"love\":80}"
        );
        assert_eq!(extract_json_object("```JSON{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_fence_without_object_is_skipped() {
        let text = "Not:\n```\nyildizlar\n```\n{\"motto\":\"X\"}";
        assert_eq!(extract_json_object(text), "{\"motto\":\"X\"}");

        let text = "```\nyildizlar\n```\nsonra:\n```json\n{\"a\":1}\n```";
        assert_eq!(extract_json_object(text), "{\"a\":1}");
    }

    #[test]
    fn test_raw_object_inside_prose() {
        let text = "Tabii! {\"motto\": \"Yildizlar {parlak}\", \"n\": {\"x\": 1}} Baska bir sey?";
        assert_eq!(
            extract_json_object(text),
            "{\"motto\": \"Yildizlar {parlak}\", \"n\": {\"x\": 1}}"
        );
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let text = r#"x {"a": "say \"}\" now", "b": 2} y"#;
        assert_eq!(extract_json_object(text), r#"{"a": "say \"}\" now", "b": 2}"#);
    }

    #[test]
    fn test_unbalanced_falls_back_to_text() {
        assert_eq!(extract_json_object("  {\"a\": 1  "), "{\"a\": 1");
        assert_eq!(extract_json_object(" no json here "), "no json here");
    }

    #[test]
    fn test_multibyte_text_around_object() {
        let text = "Günün yorumu ✨ {\"motto\":\"Şans seninle\"} 🌙";
        assert_eq!(extract_json_object(text), "{\"motto\":\"Şans seninle\"}");
    }
}
