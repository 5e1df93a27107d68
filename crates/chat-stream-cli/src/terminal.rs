use std::io::Write;

use chat_stream_core::thinking::{ThinkingLogEntry, ToolState};
use chat_stream_core::{
    ErrorNotice, MessageAction, MessageView, RenderedMessage, StatusMessage, StatusNodeId,
    ToolResult, ToolResultKind,
};

/// Streams answer text to a writer and side-channel lines to another.
///
/// Rendering is append-only: each content replacement prints only the part
/// of the Markdown source not printed yet.
pub struct TerminalView<O: Write, E: Write> {
    out: O,
    err: E,
    printed: usize,
    printed_foreign: usize,
    next_status: u64,
}

impl TerminalView<std::io::Stdout, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write, E: Write> TerminalView<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            printed: 0,
            printed_foreign: 0,
            next_status: 0,
        }
    }

    pub fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }

    fn note(&mut self, line: &str) {
        if let Err(e) = writeln!(self.err, "{line}") {
            tracing::debug!(error = %e, "terminal write failed");
        }
    }

    fn print_foreign(&mut self, result: &ToolResult) {
        let line = match &result.kind {
            ToolResultKind::File { name, url, .. } => format!("[file] {name} <{url}>"),
            ToolResultKind::Image { url, alt } => match alt {
                Some(alt) => format!("[image] {alt} <{url}>"),
                None => format!("[image] <{url}>"),
            },
            ToolResultKind::Analysis { summary } => format!("[analysis] {summary}"),
        };
        self.note(&line);
        self.printed_foreign += 1;
    }
}

impl<O: Write, E: Write> MessageView for TerminalView<O, E> {
    fn create_status(&mut self, status: &StatusMessage) -> StatusNodeId {
        self.next_status += 1;
        self.note(&format!("… {}", status.text()));
        StatusNodeId(self.next_status)
    }

    fn update_status(&mut self, _id: StatusNodeId, status: &StatusMessage) {
        self.note(&format!("… {}", status.text()));
    }

    fn remove_status(&mut self, _id: StatusNodeId, _fade: bool) {}

    fn replace_content(&mut self, message: &RenderedMessage, foreign: &[ToolResult]) {
        let fresh = message.source.get(self.printed..).unwrap_or_default();
        if !fresh.is_empty() {
            let written = write!(self.out, "{fresh}").and_then(|_| self.out.flush());
            if let Err(e) = written {
                tracing::debug!(error = %e, "terminal write failed");
            }
            self.printed = message.source.len();
        }
        for result in foreign.iter().skip(self.printed_foreign) {
            self.print_foreign(result);
        }
    }

    fn append_foreign(&mut self, result: &ToolResult) {
        self.print_foreign(result);
    }

    fn append_thinking(&mut self, entry: &ThinkingLogEntry) {
        self.note(&thinking_line(entry));
    }

    fn replace_thinking(&mut self, _index: usize, entry: &ThinkingLogEntry) {
        self.note(&thinking_line(entry));
    }

    fn attach_actions(&mut self, _actions: &[MessageAction]) {
        if let Err(e) = writeln!(self.out).and_then(|_| self.out.flush()) {
            tracing::debug!(error = %e, "terminal write failed");
        }
    }

    fn show_error(&mut self, notice: &ErrorNotice) {
        if self.printed > 0 {
            let _ = writeln!(self.out);
        }
        self.note(&format!("error: {}", notice.reason));
        if notice.retryable {
            self.note(&format!("  {} (type /regen to retry)", notice.hint));
        } else {
            self.note(&format!("  {}", notice.hint));
        }
    }
}

fn thinking_line(entry: &ThinkingLogEntry) -> String {
    match entry {
        ThinkingLogEntry::ContextSource(source) => format!("  source: {}", source.title),
        ThinkingLogEntry::SearchQuery { query } => format!("  searched: {query}"),
        ThinkingLogEntry::ToolStatus { name, state, .. } => match state {
            ToolState::Running => format!("  tool {name}: running"),
            ToolState::Complete => format!("  tool {name}: done"),
            ToolState::Error(message) => format!("  tool {name}: failed ({message})"),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chat_stream_core::{PulldownMarkdown, StreamConfig, StreamSession};

    use super::*;

    #[test]
    fn only_new_text_is_printed() {
        let mut view = TerminalView::new(Vec::new(), Vec::new());
        {
            let mut session =
                StreamSession::new(&mut view, Arc::new(PulldownMarkdown), StreamConfig::default());
            session.begin(&[]);
            session.handle_line(r#"data: {"delta":"Hel"}"#);
            session.handle_line(r#"data: {"delta":"lo "}"#);
            session.handle_line(r#"data: {"delta":"wörld"}"#);
            session.finish();
        }
        let (out, err) = view.into_writers();
        assert_eq!(String::from_utf8(out).expect("utf8"), "Hello wörld\n");
        assert!(String::from_utf8(err).expect("utf8").contains("Thinking..."));
    }

    #[test]
    fn errors_go_to_the_side_channel() {
        let mut view = TerminalView::new(Vec::new(), Vec::new());
        view.show_error(&ErrorNotice::from_error(&chat_stream_core::StreamError::network(
            "reset",
        )));
        let (out, err) = view.into_writers();
        assert!(out.is_empty());
        let err = String::from_utf8(err).expect("utf8");
        assert!(err.starts_with("error: "));
        assert!(err.contains("/regen"));
    }
}
