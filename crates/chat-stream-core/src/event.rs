use crate::tool::ToolCall;

/// What a decoded wire event means for the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Incremental answer text.
    TextDelta { text: String },
    /// Terminal "done" marker repeating already-streamed text. Ignored.
    TextDone,
    /// A web search call started.
    WebSearchStart { query: Option<String> },
    /// A web search call finished. No visual change on its own.
    WebSearchCompleted,
    /// The finished web search item carried its query; results are being analyzed.
    QueryCompleted { query: String },
    /// A function call item was opened.
    ToolCallStart { call_id: String, name: String },
    /// Argument fragment of a function call. Ignored.
    ToolCallDelta { call_id: String },
    /// A function call item finished with its full arguments.
    ToolCallComplete(ToolCall),
    /// A function call item finished unsuccessfully.
    ToolCallError { call_id: String, message: String },
    /// The provider reported a failure for the whole response.
    Failed { message: String },
    /// Anything else. Ignored.
    Unknown,
}

impl EventKind {
    /// Stable label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text_delta",
            Self::TextDone => "text_done",
            Self::WebSearchStart { .. } => "web_search_start",
            Self::WebSearchCompleted => "web_search_completed",
            Self::QueryCompleted { .. } => "query_completed",
            Self::ToolCallStart { .. } => "tool_call_start",
            Self::ToolCallDelta { .. } => "tool_call_delta",
            Self::ToolCallComplete(_) => "tool_call_complete",
            Self::ToolCallError { .. } => "tool_call_error",
            Self::Failed { .. } => "failed",
            Self::Unknown => "unknown",
        }
    }

    /// Kinds that carry no work for the session.
    pub fn is_ignored(&self) -> bool {
        matches!(
            self,
            Self::TextDone | Self::ToolCallDelta { .. } | Self::Unknown
        )
    }
}

/// One decoded unit from the wire. Consumed exactly once.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamEvent {
    pub kind: EventKind,
    pub raw: serde_json::Value,
    /// Deduplication identity (see [`crate::dedup::event_identity`]).
    pub id: Option<String>,
}

impl StreamEvent {
    /// Classifies a decoded payload and computes its identity.
    pub fn from_value(raw: serde_json::Value) -> Self {
        let kind = crate::classify::classify(&raw);
        let id = crate::dedup::event_identity(&raw);
        Self { kind, raw, id }
    }
}
