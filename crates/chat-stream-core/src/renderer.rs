use std::sync::Arc;

use tracing::warn;

use crate::markdown::{MarkdownRenderer, RenderedBody, RenderedMessage};
use crate::tool::ToolResult;
use crate::view::{MessageAction, MessageView};

/// Accumulates streamed text and re-renders the whole message on every delta.
///
/// Tool results are kept as an ordered list of foreign nodes and handed back
/// to the view after each replacement, so a re-render never drops them.
pub struct IncrementalRenderer {
    markdown: Arc<dyn MarkdownRenderer>,
    text: String,
    foreign: Vec<ToolResult>,
    renders: u64,
    fallbacks: u64,
}

impl IncrementalRenderer {
    pub fn new(markdown: Arc<dyn MarkdownRenderer>) -> Self {
        Self {
            markdown,
            text: String::new(),
            foreign: Vec::new(),
            renders: 0,
            fallbacks: 0,
        }
    }

    /// Accumulated text; only ever grows.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn foreign(&self) -> &[ToolResult] {
        &self.foreign
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }

    /// Renders that fell back to plain text.
    pub fn fallbacks(&self) -> u64 {
        self.fallbacks
    }

    /// Appends a fragment and re-renders. Empty fragments are skipped.
    pub fn push_delta<V: MessageView + ?Sized>(&mut self, view: &mut V, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        self.text.push_str(fragment);
        self.render_into(view);
    }

    /// Adds a tool result after the existing ones and shows it immediately.
    pub fn attach<V: MessageView + ?Sized>(&mut self, view: &mut V, result: ToolResult) {
        view.append_foreign(&result);
        self.foreign.push(result);
    }

    /// Final render followed by code highlighting and message actions.
    pub fn finalize<V: MessageView + ?Sized>(&mut self, view: &mut V) {
        self.render_into(view);
        view.highlight_code();
        view.attach_actions(&MessageAction::ALL);
    }

    pub fn into_parts(self) -> (String, Vec<ToolResult>) {
        (self.text, self.foreign)
    }

    fn render_into<V: MessageView + ?Sized>(&mut self, view: &mut V) {
        let body = match self.markdown.render(&self.text) {
            Ok(html) => RenderedBody::Html(html),
            Err(err) => {
                self.fallbacks += 1;
                warn!(error = %err, len = self.text.len(), "markdown render failed; showing plain text");
                RenderedBody::PlainText(self.text.clone())
            }
        };
        let message = RenderedMessage {
            source: self.text.clone(),
            body,
        };
        view.replace_content(&message, &self.foreign);
        self.renders += 1;
    }
}
