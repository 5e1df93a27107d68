//! The surface a streaming message renders into.
//!
//! A view is borrowed mutably by exactly one [`crate::session::StreamSession`]
//! for the lifetime of a stream, so two sessions can never drive the same
//! container at once.

use std::fmt;

use crate::errors::StreamError;
use crate::markdown::RenderedMessage;
use crate::status::StatusMessage;
use crate::thinking::ThinkingLogEntry;
use crate::tool::ToolResult;

/// Handle of a status node created by the view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StatusNodeId(pub u64);

impl fmt::Display for StatusNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status-{}", self.0)
    }
}

/// User actions attached to a finalized message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageAction {
    Copy,
    Regenerate,
    ReactionUp,
    ReactionDown,
}

impl MessageAction {
    pub const ALL: [MessageAction; 4] = [
        MessageAction::Copy,
        MessageAction::Regenerate,
        MessageAction::ReactionUp,
        MessageAction::ReactionDown,
    ];
}

/// User-visible error bubble content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorNotice {
    pub reason: String,
    /// Log category of the failure (see [`StreamError::kind`]).
    pub kind: &'static str,
    pub retryable: bool,
    pub hint: String,
}

impl ErrorNotice {
    pub fn from_error(err: &StreamError) -> Self {
        let retryable = !matches!(err, StreamError::Config(_));
        Self {
            reason: err.user_message(),
            kind: err.kind(),
            retryable,
            hint: "Check the API key, base URL and model in your configuration.".to_string(),
        }
    }
}

/// Host surface for one assistant message.
pub trait MessageView {
    fn create_status(&mut self, status: &StatusMessage) -> StatusNodeId;
    fn update_status(&mut self, id: StatusNodeId, status: &StatusMessage);
    fn remove_status(&mut self, id: StatusNodeId, fade: bool);

    /// Replaces the message body, then re-appends `foreign` in order after it.
    fn replace_content(&mut self, message: &RenderedMessage, foreign: &[ToolResult]);
    /// Appends a newly produced tool result after the existing ones.
    fn append_foreign(&mut self, result: &ToolResult);

    fn append_thinking(&mut self, entry: &ThinkingLogEntry);
    fn replace_thinking(&mut self, index: usize, entry: &ThinkingLogEntry);

    fn highlight_code(&mut self) {}
    fn attach_actions(&mut self, _actions: &[MessageAction]) {}

    fn show_error(&mut self, notice: &ErrorNotice);
}

/// In-memory view that records what it was asked to show.
#[derive(Debug, Default)]
pub struct RecordingView {
    next_status: u64,
    statuses: Vec<(StatusNodeId, StatusMessage)>,
    status_created: usize,
    status_removed: usize,
    max_concurrent_status: usize,
    content: Option<RenderedMessage>,
    foreign: Vec<ToolResult>,
    render_calls: u64,
    thinking: Vec<ThinkingLogEntry>,
    highlighted: bool,
    actions: Vec<MessageAction>,
    errors: Vec<ErrorNotice>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text of the status node when exactly one is shown.
    pub fn status_text(&self) -> Option<String> {
        match self.statuses.as_slice() {
            [(_, message)] => Some(message.text()),
            _ => None,
        }
    }

    pub fn status_count(&self) -> usize {
        self.statuses.len()
    }

    pub fn status_created(&self) -> usize {
        self.status_created
    }

    pub fn status_removed(&self) -> usize {
        self.status_removed
    }

    pub fn max_concurrent_status(&self) -> usize {
        self.max_concurrent_status
    }

    pub fn content(&self) -> Option<&RenderedMessage> {
        self.content.as_ref()
    }

    pub fn source_text(&self) -> &str {
        self.content.as_ref().map_or("", |m| m.source.as_str())
    }

    pub fn foreign(&self) -> &[ToolResult] {
        &self.foreign
    }

    /// Number of `replace_content` and `append_foreign` calls.
    pub fn render_calls(&self) -> u64 {
        self.render_calls
    }

    pub fn thinking(&self) -> &[ThinkingLogEntry] {
        &self.thinking
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn actions(&self) -> &[MessageAction] {
        &self.actions
    }

    pub fn errors(&self) -> &[ErrorNotice] {
        &self.errors
    }
}

impl MessageView for RecordingView {
    fn create_status(&mut self, status: &StatusMessage) -> StatusNodeId {
        self.next_status += 1;
        let id = StatusNodeId(self.next_status);
        self.statuses.push((id, status.clone()));
        self.status_created += 1;
        self.max_concurrent_status = self.max_concurrent_status.max(self.statuses.len());
        id
    }

    fn update_status(&mut self, id: StatusNodeId, status: &StatusMessage) {
        if let Some((_, message)) = self.statuses.iter_mut().find(|(sid, _)| *sid == id) {
            *message = status.clone();
        }
    }

    fn remove_status(&mut self, id: StatusNodeId, _fade: bool) {
        let before = self.statuses.len();
        self.statuses.retain(|(sid, _)| *sid != id);
        if self.statuses.len() < before {
            self.status_removed += 1;
        }
    }

    fn replace_content(&mut self, message: &RenderedMessage, foreign: &[ToolResult]) {
        self.render_calls += 1;
        self.content = Some(message.clone());
        self.foreign = foreign.to_vec();
    }

    fn append_foreign(&mut self, result: &ToolResult) {
        self.render_calls += 1;
        self.foreign.push(result.clone());
    }

    fn append_thinking(&mut self, entry: &ThinkingLogEntry) {
        self.thinking.push(entry.clone());
    }

    fn replace_thinking(&mut self, index: usize, entry: &ThinkingLogEntry) {
        if let Some(slot) = self.thinking.get_mut(index) {
            *slot = entry.clone();
        }
    }

    fn highlight_code(&mut self) {
        self.highlighted = true;
    }

    fn attach_actions(&mut self, actions: &[MessageAction]) {
        self.actions = actions.to_vec();
    }

    fn show_error(&mut self, notice: &ErrorNotice) {
        self.errors.push(notice.clone());
    }
}
