//! Side-channel log of what the model did while answering.

/// State of a tool call shown in the thinking panel.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum ToolState {
    Running,
    Complete,
    Error(String),
}

/// A retrieved knowledge-base passage used as context for the request.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ContextSource {
    pub title: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl ContextSource {
    pub fn new(title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            score: None,
        }
    }

    /// Retrieval relevance score.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

/// One line of the "thinking process" panel.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThinkingLogEntry {
    ContextSource(ContextSource),
    SearchQuery { query: String },
    ToolStatus {
        call_id: String,
        name: String,
        state: ToolState,
    },
}

/// Change applied to the log, so the view can mirror it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogChange {
    Appended(usize),
    Replaced(usize),
}

/// Append-only log; tool status entries are the only ones replaced in place.
#[derive(Clone, Debug, Default)]
pub struct ThinkingLog {
    entries: Vec<ThinkingLogEntry>,
}

impl ThinkingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns its index.
    pub fn push(&mut self, entry: ThinkingLogEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Records a search query unless it is the same as the most recent one.
    pub fn record_query(&mut self, query: &str) -> Option<usize> {
        let already_last = self.entries.iter().rev().find_map(|e| match e {
            ThinkingLogEntry::SearchQuery { query } => Some(query.as_str()),
            _ => None,
        }) == Some(query);
        if already_last {
            return None;
        }
        Some(self.push(ThinkingLogEntry::SearchQuery {
            query: query.to_string(),
        }))
    }

    /// Sets the state of the entry for `call_id`, appending one if none exists yet.
    pub fn record_tool_state(&mut self, call_id: &str, name: &str, state: ToolState) -> LogChange {
        let existing = self.entries.iter().position(|e| {
            matches!(e, ThinkingLogEntry::ToolStatus { call_id: id, .. } if id == call_id)
        });
        match existing {
            Some(idx) => {
                if let ThinkingLogEntry::ToolStatus {
                    name: existing_name,
                    state: existing_state,
                    ..
                } = &mut self.entries[idx]
                {
                    if existing_name.is_empty() {
                        *existing_name = name.to_string();
                    }
                    *existing_state = state;
                }
                LogChange::Replaced(idx)
            }
            None => LogChange::Appended(self.push(ThinkingLogEntry::ToolStatus {
                call_id: call_id.to_string(),
                name: name.to_string(),
                state,
            })),
        }
    }

    pub fn get(&self, idx: usize) -> Option<&ThinkingLogEntry> {
        self.entries.get(idx)
    }

    pub fn entries(&self) -> &[ThinkingLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the log, e.g. to store it with the assistant message.
    pub fn into_entries(self) -> Vec<ThinkingLogEntry> {
        self.entries
    }
}
