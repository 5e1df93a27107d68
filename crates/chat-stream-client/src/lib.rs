//! Chat client built on `chat-stream-core`.
//!
//! [`ChatClient`] owns the provider transport, conversation history, Markdown
//! renderer and tool handler, and streams each reply into a caller-supplied
//! [`chat_stream_core::MessageView`].
//!
//! ```no_run
//! use chat_stream_client::prelude::*;
//!
//! # async fn demo() -> Result<(), ClientError> {
//! let client = ChatClient::from_config(ClientConfig::from_env()?)?;
//! let mut view = RecordingView::new();
//! let outcome = client
//!     .send(SendRequest::new("default", "Hello!"), &mut view, AbortSignal::never())
//!     .await?;
//! if let SendOutcome::Completed(reply) = outcome {
//!     println!("{}", reply.content);
//! }
//! # Ok(())
//! # }
//! ```

mod chat;
mod config;
mod errors;
/// OpenAI Responses API transport.
pub mod openai;
/// Common imports.
pub mod prelude;
mod store;
mod transport;

pub use chat::{ChatClient, ChatClientBuilder, SendOutcome, SendRequest};
pub use config::ClientConfig;
pub use errors::ClientError;
pub use openai::{OpenAiResponses, ReasoningEffort};
pub use store::{ChatMessage, ConversationStore, InMemoryConversationStore, Role};
pub use transport::{ResponsesRequest, ResponsesTransport};
