//! Per-session duplicate event suppression.

use std::collections::HashSet;

use serde_json::Value;

/// Result of testing an event against the session's seen-set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Novel,
    Duplicate,
}

/// Computes the identity used for deduplication.
///
/// Order of preference:
/// 1. an explicit `event_id`;
/// 2. `type` + `sequence_number` (each Responses API event carries a unique sequence number);
/// 3. the canonical serialization of the whole payload (object keys are sorted).
///
/// A bare `id` is not used: chat-completions chunks repeat the completion id on
/// every chunk, so it names the response rather than the event.
///
/// Returns `None` when no identity can be computed; such events are always novel.
pub fn event_identity(value: &Value) -> Option<String> {
    if let Some(id) = value.get("event_id").and_then(Value::as_str)
        && !id.is_empty()
    {
        return Some(format!("id:{id}"));
    }
    if let (Some(kind), Some(seq)) = (
        value.get("type").and_then(Value::as_str),
        value.get("sequence_number").and_then(Value::as_u64),
    ) {
        return Some(format!("seq:{kind}:{seq}"));
    }
    serde_json::to_string(value)
        .ok()
        .map(|canonical| format!("payload:{canonical}"))
}

/// Tracks seen event identities within one stream session.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
    duplicates: u64,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tests `id` and records it when novel. `None` fails open.
    pub fn check(&mut self, id: Option<&str>) -> Verdict {
        let Some(id) = id else {
            return Verdict::Novel;
        };
        if self.seen.insert(id.to_string()) {
            Verdict::Novel
        } else {
            self.duplicates = self.duplicates.saturating_add(1);
            Verdict::Duplicate
        }
    }

    /// Number of duplicates dropped so far.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_payloads_are_novel_then_duplicate() {
        let mut dedup = Deduplicator::new();
        let payload = json!({"id": "evt_1", "delta": {"content": "x"}});
        let id = event_identity(&payload);
        assert_eq!(dedup.check(id.as_deref()), Verdict::Novel);
        assert_eq!(dedup.check(id.as_deref()), Verdict::Duplicate);
        assert_eq!(dedup.duplicates(), 1);
    }

    #[test]
    fn explicit_event_id_wins_over_payload() {
        let a = json!({"event_id": "e1", "delta": "a"});
        let b = json!({"event_id": "e1", "delta": "b"});
        assert_eq!(event_identity(&a), event_identity(&b));
    }

    #[test]
    fn sequence_numbers_distinguish_equal_text() {
        let a = json!({"type": "response.output_text.delta", "delta": "lo", "sequence_number": 3});
        let b = json!({"type": "response.output_text.delta", "delta": "lo", "sequence_number": 4});
        let mut dedup = Deduplicator::new();
        assert_eq!(dedup.check(event_identity(&a).as_deref()), Verdict::Novel);
        assert_eq!(dedup.check(event_identity(&b).as_deref()), Verdict::Novel);
    }

    #[test]
    fn shared_completion_id_does_not_collapse_chunks() {
        let a = json!({"id": "chatcmpl-1", "choices": [{"delta": {"content": "Hel"}}]});
        let b = json!({"id": "chatcmpl-1", "choices": [{"delta": {"content": "lo"}}]});
        assert_ne!(event_identity(&a), event_identity(&b));
    }

    #[test]
    fn key_order_does_not_change_identity() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":2}"#).expect("json");
        let b: Value = serde_json::from_str(r#"{"b":2,"a":1}"#).expect("json");
        assert_eq!(event_identity(&a), event_identity(&b));
    }

    #[test]
    fn missing_identity_fails_open() {
        let mut dedup = Deduplicator::new();
        assert_eq!(dedup.check(None), Verdict::Novel);
        assert_eq!(dedup.check(None), Verdict::Novel);
        assert_eq!(dedup.seen_len(), 0);
    }
}
