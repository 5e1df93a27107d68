//! Common imports for driving a stream into a view.
pub use crate::{
    AbortHandle, AbortSignal, ContextSource, DriveOutcome, FinalMessage, MessageView,
    PulldownMarkdown, RecordingView, StreamConfig, StreamDriver, StreamError, StreamSession,
    ToolHandler, ToolResult, abort_pair,
};
