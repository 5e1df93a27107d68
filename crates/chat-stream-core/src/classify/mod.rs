//! Maps decoded JSON events onto [`EventKind`].
//!
//! Explicit Responses API event types are matched first; any other
//! `response.*` type is Unknown. Untyped payloads are matched by shape, and
//! only the bare-text fallback goes through the length heuristic in [`compat`].

pub mod compat;

use serde_json::Value;

use crate::event::EventKind;
use crate::tool::ToolCall;

const TEXT_DELTA: &str = "response.output_text.delta";
const ITEM_ADDED: &str = "response.output_item.added";
const ITEM_DONE: &str = "response.output_item.done";
const ARGS_DELTA: &str = "response.function_call_arguments.delta";
const ARGS_DONE: &str = "response.function_call_arguments.done";

const DONE_MARKERS: &[&str] = &[
    "response.output_text.done",
    "response.content_part.done",
    "response.completed",
    "response.incomplete",
];

const WEB_SEARCH_CALL: &str = "web_search_call";
const FUNCTION_CALL: &str = "function_call";

/// Classifies one decoded event. Pure; never fails.
pub fn classify(value: &Value) -> EventKind {
    let event_type = str_field(value, "type").unwrap_or_default();
    match event_type {
        TEXT_DELTA => {
            return match str_field(value, "delta") {
                Some(text) => EventKind::TextDelta {
                    text: text.to_string(),
                },
                None => EventKind::Unknown,
            };
        }
        ITEM_ADDED => return value.get("item").map_or(EventKind::Unknown, classify_added_item),
        ITEM_DONE => return value.get("item").map_or(EventKind::TextDone, classify_done_item),
        ARGS_DELTA | ARGS_DONE => {
            return EventKind::ToolCallDelta {
                call_id: str_field(value, "item_id").unwrap_or_default().to_string(),
            };
        }
        "response.web_search_call.in_progress" | "response.web_search_call.searching" => {
            return EventKind::WebSearchStart { query: None };
        }
        "response.web_search_call.completed" => return EventKind::WebSearchCompleted,
        "response.failed" | "response.error" | "error" => {
            return EventKind::Failed {
                message: failure_message(value),
            };
        }
        t if DONE_MARKERS.contains(&t) => return EventKind::TextDone,
        // Any other typed Responses event, reasoning included,
        // never belongs in the answer body, whatever fields it carries.
        t if t.starts_with("response.") => return EventKind::Unknown,
        _ => {}
    }

    if let Some(text) = str_field(value, "delta") {
        return EventKind::TextDelta {
            text: text.to_string(),
        };
    }

    if let Some(kind) = classify_web_search_shape(value) {
        return kind;
    }

    text_fragment(value)
        .map(|text| EventKind::TextDelta {
            text: text.to_string(),
        })
        .unwrap_or(EventKind::Unknown)
}

fn classify_added_item(item: &Value) -> EventKind {
    match str_field(item, "type") {
        Some(WEB_SEARCH_CALL) => EventKind::WebSearchStart {
            query: search_query(item),
        },
        Some(FUNCTION_CALL) => EventKind::ToolCallStart {
            call_id: call_id(item),
            name: str_field(item, "name").unwrap_or_default().to_string(),
        },
        _ => EventKind::Unknown,
    }
}

fn classify_done_item(item: &Value) -> EventKind {
    match str_field(item, "type") {
        Some(WEB_SEARCH_CALL) => match search_query(item) {
            Some(query) => EventKind::QueryCompleted { query },
            None => EventKind::WebSearchCompleted,
        },
        Some(FUNCTION_CALL) => match str_field(item, "status") {
            Some(status @ ("failed" | "incomplete")) => EventKind::ToolCallError {
                call_id: call_id(item),
                message: item
                    .get("error")
                    .and_then(|e| str_field(e, "message"))
                    .map(ToOwned::to_owned)
                    .unwrap_or_else(|| format!("tool call {status}")),
            },
            _ => EventKind::ToolCallComplete(ToolCall {
                call_id: call_id(item),
                name: str_field(item, "name").unwrap_or_default().to_string(),
                arguments: str_field(item, "arguments").unwrap_or_default().to_string(),
            }),
        },
        _ => EventKind::TextDone,
    }
}

/// `{ output: [{ type: "web_search_call", ... }] }` or a bare web search item.
fn classify_web_search_shape(value: &Value) -> Option<EventKind> {
    if str_field(value, "type") == Some(WEB_SEARCH_CALL) {
        return Some(web_search_item_kind(value));
    }
    let output = value.get("output").and_then(Value::as_array)?;
    let item = output
        .iter()
        .find(|item| str_field(item, "type") == Some(WEB_SEARCH_CALL))?;
    Some(web_search_item_kind(item))
}

fn web_search_item_kind(item: &Value) -> EventKind {
    match str_field(item, "status") {
        Some("completed") => EventKind::WebSearchCompleted,
        _ => EventKind::WebSearchStart {
            query: search_query(item),
        },
    }
}

fn text_fragment(value: &Value) -> Option<&str> {
    if let Some(text) = value.get("delta").and_then(|d| str_field(d, "content")) {
        return Some(text);
    }
    if let Some(text) = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| str_field(delta, "content"))
    {
        return Some(text);
    }
    compat::short_text_fragment(value)
}

fn search_query(item: &Value) -> Option<String> {
    item.get("action")
        .and_then(|action| str_field(action, "query"))
        .or_else(|| str_field(item, "query"))
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(ToOwned::to_owned)
}

fn call_id(item: &Value) -> String {
    str_field(item, "call_id")
        .or_else(|| str_field(item, "id"))
        .unwrap_or_default()
        .to_string()
}

fn failure_message(value: &Value) -> String {
    value
        .get("error")
        .and_then(|e| str_field(e, "message"))
        .or_else(|| {
            value
                .get("response")
                .and_then(|r| r.get("error"))
                .and_then(|e| str_field(e, "message"))
        })
        .or_else(|| str_field(value, "message"))
        .unwrap_or("response failed")
        .to_string()
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}
