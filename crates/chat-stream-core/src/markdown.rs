//! Markdown-to-HTML pipeline used for every re-render of a streaming message.

use crate::errors::RenderError;

/// Converts Markdown to HTML. Implementations may fail; callers fall back to plain text.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> Result<String, RenderError>;
}

/// Default renderer on pulldown-cmark.
#[derive(Clone, Copy, Debug, Default)]
pub struct PulldownMarkdown;

impl MarkdownRenderer for PulldownMarkdown {
    fn render(&self, markdown: &str) -> Result<String, RenderError> {
        use pulldown_cmark::{Options, Parser, html};
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        let mut out = String::with_capacity(markdown.len() + markdown.len() / 2);
        html::push_html(&mut out, Parser::new_ext(markdown, options));
        Ok(out)
    }
}

/// Escapes text for inclusion in HTML element content or attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Body handed to the view on every render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderedBody {
    Html(String),
    /// Pipeline failed; raw text is shown unformatted.
    PlainText(String),
}

impl RenderedBody {
    /// HTML form of the body; plain text is escaped.
    pub fn to_html(&self) -> String {
        match self {
            Self::Html(html) => html.clone(),
            Self::PlainText(text) => escape_html(text),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::PlainText(_))
    }
}

/// A full render of the accumulated message text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Accumulated source text this body was rendered from.
    pub source: String,
    pub body: RenderedBody,
}
