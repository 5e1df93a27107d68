use chat_stream_core::StreamError;

/// Top-level error type for the chat client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid input to a send or regenerate call.
    #[error("validation error: {0}")]
    Validation(String),
    /// The response stream failed after it was started.
    #[error(transparent)]
    Stream(StreamError),
}

impl From<StreamError> for ClientError {
    fn from(value: StreamError) -> Self {
        match value {
            StreamError::Config(message) => ClientError::Config(message),
            other => ClientError::Stream(other),
        }
    }
}

impl ClientError {
    /// Underlying stream failure, if this error came from one.
    pub fn stream_error(&self) -> Option<&StreamError> {
        match self {
            Self::Stream(err) => Some(err),
            _ => None,
        }
    }
}
