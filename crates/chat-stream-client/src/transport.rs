use chat_stream_core::{ByteStream, ContextSource, StreamError, ToolDefinition};

use crate::store::ChatMessage;

/// Everything a transport needs to open one response stream.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponsesRequest {
    /// Stream session id, used for log correlation.
    pub session_id: uuid::Uuid,
    pub model: String,
    pub system_prompt: Option<String>,
    /// Conversation so far, ending with the user turn to answer.
    pub history: Vec<ChatMessage>,
    /// Retrieved context to ground the answer in.
    pub context: Vec<ContextSource>,
    pub web_search: bool,
    pub tools: Vec<ToolDefinition>,
}

/// Opens a streaming response body for a request.
///
/// Implementations return `StreamError::Http` for non-2xx statuses and
/// `StreamError::Network` for connection failures.
#[async_trait::async_trait]
pub trait ResponsesTransport: Send + Sync {
    fn name(&self) -> &str;

    async fn open(&self, request: &ResponsesRequest) -> Result<ByteStream, StreamError>;
}
