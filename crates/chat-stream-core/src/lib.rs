//! Streaming response pipeline for chat clients.
//!
//! A [`StreamDriver`] reads a server-sent-events body, a [`StreamSession`]
//! deduplicates and classifies each event, keeps a single status line up to
//! date and re-renders the accumulated Markdown into a [`MessageView`].
//!
//! ```
//! use std::sync::Arc;
//!
//! use chat_stream_core::prelude::*;
//!
//! let mut view = RecordingView::new();
//! let mut session = StreamSession::new(&mut view, Arc::new(PulldownMarkdown), StreamConfig::default());
//! session.begin(&[]);
//! session.handle_line(r#"data: {"type":"response.output_text.delta","delta":"Hel"}"#);
//! session.handle_line(r#"data: {"type":"response.output_text.delta","delta":"lo"}"#);
//! session.handle_line("data: [DONE]");
//! let message = session.finish();
//! assert_eq!(message.text, "Hello");
//! ```

/// Event classification, including the length-heuristic compatibility shim.
pub mod classify;
/// Stream timers and display options.
pub mod config;
/// Newline splitting of chunked bodies.
pub mod decoder;
/// Per-session duplicate suppression.
pub mod dedup;
/// Read loop, abort handling and terminal callbacks.
pub mod driver;
/// Error taxonomy.
pub mod errors;
/// Decoded wire events.
pub mod event;
/// Markdown-to-HTML pipeline.
pub mod markdown;
/// Logging bootstrap.
pub mod observability;
/// Common imports.
pub mod prelude;
/// Incremental re-rendering with preserved tool results.
pub mod renderer;
/// Per-request stream state.
pub mod session;
/// Single status line state machine.
pub mod status;
/// Thinking-process panel entries.
pub mod thinking;
/// Tool calls, results and handlers.
pub mod tool;
/// Host surface abstraction.
pub mod view;

pub use config::StreamConfig;
pub use driver::{
    AbortHandle, AbortSignal, ByteStream, DriveOutcome, DriverState, NoopObserver, StreamDriver,
    StreamObserver, abort_pair,
};
pub use errors::{LineError, RenderError, StreamError, TimeoutKind, ToolError};
pub use event::{EventKind, StreamEvent};
pub use markdown::{MarkdownRenderer, PulldownMarkdown, RenderedBody, RenderedMessage};
pub use session::{FinalMessage, LineOutcome, SessionStats, StreamSession};
pub use status::{StatusMessage, StatusPhase};
pub use thinking::{ContextSource, ThinkingLogEntry, ToolState};
pub use tool::{ToolCall, ToolDefinition, ToolHandler, ToolResult, ToolResultKind};
pub use view::{ErrorNotice, MessageAction, MessageView, RecordingView, StatusNodeId};
