//! Length heuristic for payloads that carry no recognizable event type.
//!
//! Some upstreams send a bare `{ "text": ... }` or `{ "content": ... }` object
//! both for fragments and for the complete message. Short values are taken
//! as fragments; long ones are assumed to repeat text already streamed.
//! Remove once every supported upstream is matched by event type.

use serde_json::Value;

/// Bare text at or above this many characters is ignored.
pub const SHORT_MESSAGE_LIMIT: usize = 500;

/// Returns a bare `text`/`content` string when it is shorter than the limit.
pub fn short_text_fragment(value: &Value) -> Option<&str> {
    ["text", "content"]
        .into_iter()
        .filter_map(|key| value.get(key).and_then(Value::as_str))
        .find(|text| is_short(text))
}

fn is_short(text: &str) -> bool {
    text.chars().count() < SHORT_MESSAGE_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn limit_is_exclusive() {
        let at_limit = "x".repeat(SHORT_MESSAGE_LIMIT);
        let below = "x".repeat(SHORT_MESSAGE_LIMIT - 1);
        assert_eq!(short_text_fragment(&json!({ "text": at_limit })), None);
        assert_eq!(
            short_text_fragment(&json!({ "text": below.clone() })),
            Some(below.as_str())
        );
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "ü".repeat(300);
        assert!(short_text_fragment(&json!({ "content": text })).is_some());
    }

    #[test]
    fn non_string_content_is_ignored() {
        assert_eq!(short_text_fragment(&json!({"content": [{"text": "a"}]})), None);
    }
}
