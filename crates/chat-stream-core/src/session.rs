//! Per-request stream state.
//!
//! A [`StreamSession`] turns event-stream lines into view updates. Bytes and
//! timers are the driver's concern.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::StreamConfig;
use crate::dedup::{Deduplicator, Verdict};
use crate::errors::{LineError, StreamError, ToolError};
use crate::event::{EventKind, StreamEvent};
use crate::markdown::MarkdownRenderer;
use crate::renderer::IncrementalRenderer;
use crate::status::{StatusController, StatusMessage};
use crate::thinking::{ContextSource, LogChange, ThinkingLog, ThinkingLogEntry, ToolState};
use crate::tool::{ToolCall, ToolResult};
use crate::view::{ErrorNotice, MessageView};

const DONE_SENTINEL: &str = "[DONE]";

/// What happened to one input line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineOutcome {
    /// Not a `data:` line, blank payload, or the session was aborted.
    Skipped,
    /// `data: [DONE]`.
    Done,
    /// Payload was not valid JSON; the line is dropped.
    Malformed(LineError),
    /// Same event seen before in this session.
    Duplicate,
    /// Classified but carries no work.
    Ignored(&'static str),
    /// Classified and applied to status, text or thinking log.
    Applied(&'static str),
    /// A completed tool call waiting for execution.
    ToolCall(ToolCall),
    /// The provider reported a failure for the whole response.
    Failed(String),
}

/// Counters kept for logging and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub lines: u64,
    pub events: u64,
    pub parse_errors: u64,
    pub duplicates: u64,
    pub deltas: u64,
    pub ignored: u64,
    pub tool_calls: u64,
}

/// Canonical content of a completed assistant message.
#[derive(Clone, Debug, PartialEq)]
pub struct FinalMessage {
    pub text: String,
    pub tool_results: Vec<ToolResult>,
    pub thinking: Vec<ThinkingLogEntry>,
    pub stats: SessionStats,
}

/// State of one outgoing request's stream. Never shared between sends.
pub struct StreamSession<'v, V: MessageView + ?Sized> {
    id: uuid::Uuid,
    view: &'v mut V,
    config: StreamConfig,
    dedup: Deduplicator,
    renderer: IncrementalRenderer,
    status: StatusController,
    thinking: ThinkingLog,
    stats: SessionStats,
    aborted: bool,
    finished: bool,
}

impl<'v, V: MessageView + ?Sized> StreamSession<'v, V> {
    /// Starts a session rendering into `view`. Nothing is shown until [`Self::begin`].
    pub fn new(view: &'v mut V, markdown: Arc<dyn MarkdownRenderer>, config: StreamConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            view,
            config,
            dedup: Deduplicator::new(),
            renderer: IncrementalRenderer::new(markdown),
            status: StatusController::new(),
            thinking: ThinkingLog::new(),
            stats: SessionStats::default(),
            aborted: false,
            finished: false,
        }
    }

    /// Random id, attached to every log line of this session.
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Accumulated text so far.
    pub fn text(&self) -> &str {
        self.renderer.text()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Status currently shown, if any.
    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.current()
    }

    /// Thinking entries recorded so far, in order.
    pub fn thinking(&self) -> &[ThinkingLogEntry] {
        self.thinking.entries()
    }

    /// True once [`Self::abort`] ran; later input is ignored.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Shows the thinking status and lists the context sources used for the request.
    pub fn begin(&mut self, sources: &[ContextSource]) {
        if self.config.show_thinking_status {
            self.status.show_thinking(self.view);
        }
        for source in sources {
            let entry = ThinkingLogEntry::ContextSource(source.clone());
            self.thinking.push(entry.clone());
            self.view.append_thinking(&entry);
        }
    }

    /// Feeds one complete line of the event stream.
    pub fn handle_line(&mut self, line: &str) -> LineOutcome {
        if self.aborted || self.finished {
            return LineOutcome::Skipped;
        }
        let Some(payload) = data_payload(line) else {
            return LineOutcome::Skipped;
        };
        self.stats.lines += 1;
        let payload = payload.trim();
        if payload.is_empty() {
            return LineOutcome::Skipped;
        }
        if payload == DONE_SENTINEL {
            return LineOutcome::Done;
        }
        match serde_json::from_str::<serde_json::Value>(payload) {
            Ok(value) => self.handle_value(value),
            Err(e) => {
                self.stats.parse_errors += 1;
                let err = LineError::new(e.to_string(), payload);
                warn!(session_id = %self.id, error = %err, excerpt = %err.excerpt, "skipping malformed stream line");
                LineOutcome::Malformed(err)
            }
        }
    }

    /// Feeds one decoded JSON event.
    pub fn handle_value(&mut self, value: serde_json::Value) -> LineOutcome {
        if self.aborted || self.finished {
            return LineOutcome::Skipped;
        }
        let event = StreamEvent::from_value(value);
        if self.dedup.check(event.id.as_deref()) == Verdict::Duplicate {
            self.stats.duplicates = self.dedup.duplicates();
            trace!(session_id = %self.id, id = ?event.id, "duplicate event dropped");
            return LineOutcome::Duplicate;
        }
        self.stats.events += 1;
        self.apply(event.kind)
    }

    fn apply(&mut self, kind: EventKind) -> LineOutcome {
        let label = kind.label();
        if kind.is_ignored() {
            self.stats.ignored += 1;
            return LineOutcome::Ignored(label);
        }
        match kind {
            EventKind::TextDelta { text } => {
                self.stats.deltas += 1;
                self.renderer.push_delta(self.view, &text);
            }
            EventKind::WebSearchStart { query } => {
                debug!(session_id = %self.id, query = ?query, "web search started");
                if let Some(query) = query.as_deref() {
                    self.log_query(query);
                }
                self.status.on_web_search_start(self.view, query);
            }
            EventKind::WebSearchCompleted => self.status.on_web_search_completed(),
            EventKind::QueryCompleted { query } => {
                self.log_query(&query);
                self.status.on_query_completed(self.view, &query);
            }
            EventKind::ToolCallStart { call_id, name } => {
                self.set_tool_state(&call_id, &name, ToolState::Running);
            }
            EventKind::ToolCallComplete(call) => {
                self.stats.tool_calls += 1;
                self.set_tool_state(&call.call_id, &call.name, ToolState::Running);
                return LineOutcome::ToolCall(call);
            }
            EventKind::ToolCallError { call_id, message } => {
                self.set_tool_state(&call_id, "", ToolState::Error(message));
            }
            EventKind::Failed { message } => return LineOutcome::Failed(message),
            EventKind::TextDone | EventKind::ToolCallDelta { .. } | EventKind::Unknown => {}
        }
        LineOutcome::Applied(label)
    }

    /// Applies the outcome of executing a tool call. No-op after abort.
    pub fn apply_tool_outcome(&mut self, call: &ToolCall, outcome: Result<ToolResult, ToolError>) {
        if self.aborted || self.finished {
            return;
        }
        match outcome {
            Ok(result) => {
                debug!(session_id = %self.id, call_id = %call.call_id, kind = result.label(), "tool result attached");
                self.renderer.attach(self.view, result);
                self.set_tool_state(&call.call_id, &call.name, ToolState::Complete);
            }
            Err(err) => {
                warn!(session_id = %self.id, call_id = %call.call_id, error = %err, "tool call failed");
                self.set_tool_state(&call.call_id, &call.name, ToolState::Error(err.to_string()));
            }
        }
    }

    /// Removes the status and finalizes the rendered message.
    pub fn finish(&mut self) -> FinalMessage {
        self.finished = true;
        self.status.clear(self.view, self.config.fade_status);
        self.renderer.finalize(self.view);
        FinalMessage {
            text: self.renderer.text().to_string(),
            tool_results: self.renderer.foreign().to_vec(),
            thinking: self.thinking.entries().to_vec(),
            stats: self.stats,
        }
    }

    /// Cleans up after a failed stream and shows the error bubble.
    pub fn fail(&mut self, err: &StreamError) {
        self.finished = true;
        self.status.clear(self.view, self.config.fade_status);
        if err.is_user_visible() {
            self.view.show_error(&ErrorNotice::from_error(err));
        }
    }

    /// Stops all further rendering and removes the status.
    pub fn abort(&mut self) {
        if self.aborted {
            return;
        }
        self.aborted = true;
        self.status.clear(self.view, false);
    }

    fn log_query(&mut self, query: &str) {
        if let Some(idx) = self.thinking.record_query(query)
            && let Some(entry) = self.thinking.get(idx)
        {
            self.view.append_thinking(entry);
        }
    }

    fn set_tool_state(&mut self, call_id: &str, name: &str, state: ToolState) {
        let change = self.thinking.record_tool_state(call_id, name, state);
        match change {
            LogChange::Appended(idx) => {
                if let Some(entry) = self.thinking.get(idx) {
                    self.view.append_thinking(entry);
                }
            }
            LogChange::Replaced(idx) => {
                if let Some(entry) = self.thinking.get(idx) {
                    self.view.replace_thinking(idx, entry);
                }
            }
        }
    }
}

/// Payload of an SSE `data:` line, with the single optional leading space removed.
fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:")
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::PulldownMarkdown;
    use crate::view::RecordingView;

    fn session(view: &mut RecordingView) -> StreamSession<'_, RecordingView> {
        StreamSession::new(view, Arc::new(PulldownMarkdown), StreamConfig::default())
    }

    #[test]
    fn hello_scenario() {
        let mut view = RecordingView::new();
        let mut s = session(&mut view);
        s.begin(&[]);
        let lines = [
            r#"data: {"type":"response.output_text.delta","delta":"Hel"}"#,
            r#"data: {"type":"response.output_text.delta","delta":"lo"}"#,
            "data: [DONE]",
        ];
        let outcomes: Vec<_> = lines.iter().map(|l| s.handle_line(l)).collect();
        assert_eq!(outcomes[2], LineOutcome::Done);
        let message = s.finish();
        assert_eq!(message.text, "Hello");
        assert_eq!(view.source_text(), "Hello");
        assert_eq!(view.status_count(), 0);
    }

    #[test]
    fn reasoning_events_stay_out_of_the_answer() {
        let mut view = RecordingView::new();
        let mut s = session(&mut view);
        s.begin(&[]);
        for line in [
            r#"data: {"type":"response.reasoning_summary_text.delta","delta":"Plan: "}"#,
            r#"data: {"type":"response.reasoning_summary_text.done","text":"Plan: check"}"#,
            r#"data: {"type":"response.reasoning_text.done","text":"raw cot"}"#,
            r#"data: {"type":"response.output_text.delta","delta":"Answer"}"#,
        ] {
            s.handle_line(line);
        }
        let message = s.finish();
        assert_eq!(message.text, "Answer");
        assert_eq!(message.stats.deltas, 1);
        assert_eq!(message.stats.ignored, 3);
        assert_eq!(view.source_text(), "Answer");
    }

    #[test]
    fn duplicate_lines_contribute_once() {
        let mut view = RecordingView::new();
        let mut s = session(&mut view);
        let line = r#"data: {"id":"evt_7","type":"response.output_text.delta","delta":"abc"}"#;
        assert_eq!(s.handle_line(line), LineOutcome::Applied("text_delta"));
        assert_eq!(s.handle_line(line), LineOutcome::Duplicate);
        assert_eq!(s.text(), "abc");
        assert_eq!(s.stats().duplicates, 1);
    }

    #[test]
    fn malformed_line_is_skipped_and_stream_continues() {
        let mut view = RecordingView::new();
        let mut s = session(&mut view);
        assert!(matches!(s.handle_line("data: {not json"), LineOutcome::Malformed(_)));
        s.handle_line(r#"data: {"delta":"ok"}"#);
        assert_eq!(s.text(), "ok");
        assert_eq!(s.stats().parse_errors, 1);
    }

    #[test]
    fn non_data_lines_are_skipped() {
        let mut view = RecordingView::new();
        let mut s = session(&mut view);
        for line in ["", ": keep-alive", "event: response.output_text.delta", "id: 5", "data:"] {
            assert_eq!(s.handle_line(line), LineOutcome::Skipped, "{line:?}");
        }
    }

    #[test]
    fn web_search_then_text_scenario() {
        let mut view = RecordingView::new();
        let mut s = session(&mut view);
        s.begin(&[]);
        s.handle_line(r#"data: {"output":[{"type":"web_search_call","query":"weather today"}]}"#);
        assert!(s.status().is_some_and(|m| m.text().contains("weather today")));
        s.handle_line(
            r#"data: {"type":"response.output_item.done","item":{"type":"web_search_call","action":{"query":"weather today"}}}"#,
        );
        assert!(s.status().is_some_and(|m| m.text().contains("Analyzing")));
        s.handle_line(r#"data: {"type":"response.output_text.delta","delta":"Sunny."}"#);
        assert!(s.status().is_some());
        s.finish();
        assert_eq!(view.status_count(), 0);
        assert_eq!(view.max_concurrent_status(), 1);
        assert_eq!(
            view.thinking(),
            &[ThinkingLogEntry::SearchQuery {
                query: "weather today".into()
            }]
        );
    }

    #[test]
    fn tool_call_flow_updates_thinking_and_attaches_result() {
        let mut view = RecordingView::new();
        let mut s = session(&mut view);
        s.handle_line(
            r#"data: {"type":"response.output_item.added","item":{"type":"function_call","call_id":"call_1","name":"chart"}}"#,
        );
        let outcome = s.handle_line(
            r#"data: {"type":"response.output_item.done","item":{"type":"function_call","call_id":"call_1","name":"chart","arguments":"{}"}}"#,
        );
        let call = match outcome {
            LineOutcome::ToolCall(call) => call,
            other => panic!("expected tool call, got {other:?}"),
        };
        s.apply_tool_outcome(&call, Ok(ToolResult::image("call_1", "/chart.png")));
        s.handle_line(r#"data: {"type":"response.output_text.delta","delta":"See chart."}"#);
        let message = s.finish();
        assert_eq!(message.tool_results.len(), 1);
        assert_eq!(view.foreign().len(), 1);
        assert_eq!(
            view.thinking(),
            &[ThinkingLogEntry::ToolStatus {
                call_id: "call_1".into(),
                name: "chart".into(),
                state: ToolState::Complete,
            }]
        );
    }

    #[test]
    fn abort_removes_status_and_blocks_rendering() {
        let mut view = RecordingView::new();
        let mut s = session(&mut view);
        s.begin(&[]);
        s.handle_line(r#"data: {"delta":"partial"}"#);
        s.abort();
        assert_eq!(s.handle_line(r#"data: {"delta":" more"}"#), LineOutcome::Skipped);
        s.apply_tool_outcome(
            &ToolCall {
                call_id: "c".into(),
                name: "n".into(),
                arguments: String::new(),
            },
            Ok(ToolResult::analysis("c", "late")),
        );
        assert_eq!(view.render_calls(), 1);
        assert_eq!(view.status_count(), 0);
    }

    #[test]
    fn fail_shows_error_but_abort_error_does_not() {
        let mut view = RecordingView::new();
        let mut s = session(&mut view);
        s.begin(&[]);
        s.fail(&StreamError::network("reset by peer"));
        let mut other = RecordingView::new();
        let mut quiet = session(&mut other);
        quiet.fail(&StreamError::Aborted);
        assert_eq!(view.errors().len(), 1);
        assert_eq!(view.status_count(), 0);
        assert!(other.errors().is_empty());
    }

    #[test]
    fn context_sources_are_logged_first() {
        let mut view = RecordingView::new();
        let mut s = session(&mut view);
        s.begin(&[ContextSource::new("Handbook", "Vacation policy").with_score(0.82)]);
        assert_eq!(s.thinking().len(), 1);
        assert!(matches!(view.thinking()[0], ThinkingLogEntry::ContextSource(_)));
    }
}
