//! Error types.
//!
//! [`StreamError`] ends a session. The others are local and logged.

use std::fmt;

/// Which of the two independent stream timers fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutKind {
    /// Total request duration exceeded.
    Absolute,
    /// No bytes arrived within the inactivity window.
    Inactivity,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute => f.write_str("absolute"),
            Self::Inactivity => f.write_str("inactivity"),
        }
    }
}

/// Terminal failure of a stream session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Upstream answered with a non-2xx status.
    #[error("http error (status {status}): {body}")]
    Http { status: u16, body: String },
    /// Transport or stream I/O failed.
    #[error("network error: {0}")]
    Network(String),
    /// One of the stream timers fired.
    #[error("stream timed out ({0} timeout)")]
    Timeout(TimeoutKind),
    /// The provider reported a failure inside the event stream.
    #[error("provider error: {0}")]
    Provider(String),
    /// Explicit cancellation by the caller.
    #[error("stream aborted")]
    Aborted,
    /// Invalid client or stream configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Internal sequencing or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl StreamError {
    /// Connection or read failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Failure reported inside the stream by the server.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    /// Aborts terminate cleanly and never surface an error bubble.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::Aborted)
    }

    /// Short category used in logs and error notices.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::Network(_) => "network",
            Self::Timeout(TimeoutKind::Absolute) => "timeout_absolute",
            Self::Timeout(TimeoutKind::Inactivity) => "timeout_inactivity",
            Self::Provider(_) => "provider",
            Self::Aborted => "aborted",
            Self::Config(_) => "config",
            Self::Protocol(_) => "protocol",
        }
    }

    /// Human-readable reason shown in the conversation view.
    ///
    /// Timeouts read the same as network failures; the distinction only
    /// shows up in logs via [`StreamError::kind`].
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { status, .. } => format!("The AI service returned HTTP {status}."),
            Self::Network(_) | Self::Timeout(_) => {
                "Could not reach the AI service. The connection failed or timed out.".to_string()
            }
            Self::Provider(message) => format!("The AI service reported an error: {message}"),
            Self::Aborted => "The response was cancelled.".to_string(),
            Self::Config(message) => format!("The client is misconfigured: {message}"),
            Self::Protocol(message) => format!("Unexpected response from the AI service: {message}"),
        }
    }
}

/// A single `data:` line could not be decoded. Never fatal for the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid event payload: {message}")]
pub struct LineError {
    pub message: String,
    pub excerpt: String,
}

impl LineError {
    const EXCERPT_LIMIT: usize = 200;

    pub(crate) fn new(message: impl Into<String>, payload: &str) -> Self {
        let excerpt = match payload.char_indices().nth(Self::EXCERPT_LIMIT) {
            Some((idx, _)) => format!("{}...", &payload[..idx]),
            None => payload.to_string(),
        };
        Self {
            message: message.into(),
            excerpt,
        }
    }
}

/// The Markdown pipeline failed; recovered locally with a plain-text fallback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("render error: {0}")]
pub struct RenderError(pub String);

/// A tool handler could not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// No handler knows this tool name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// The call arguments were not acceptable.
    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
    /// The tool ran and failed.
    #[error("tool {tool} failed: {message}")]
    Failed { tool: String, message: String },
}
