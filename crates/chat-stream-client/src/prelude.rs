pub use crate::{
    ChatClient, ChatClientBuilder, ChatMessage, ClientConfig, ClientError, ConversationStore,
    InMemoryConversationStore, Role, SendOutcome, SendRequest,
};
pub use chat_stream_core::prelude::*;
