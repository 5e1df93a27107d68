use std::collections::BTreeMap;

use chat_stream_core::{FinalMessage, ThinkingLogEntry, ToolResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Author of a stored conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One persisted conversation turn.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub id: uuid::Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thinking: Vec<ThinkingLogEntry>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            role: Role::User,
            content: content.into(),
            tool_results: Vec::new(),
            thinking: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Builds the assistant turn from a finalized stream.
    pub fn assistant(message: &FinalMessage) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            role: Role::Assistant,
            content: message.text.clone(),
            tool_results: message.tool_results.clone(),
            thinking: message.thinking.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Conversation history keyed by conversation id.
pub trait ConversationStore: Send + Sync {
    fn append(&self, conversation_id: &str, message: ChatMessage);
    /// Messages in insertion order. Unknown ids yield an empty history.
    fn history(&self, conversation_id: &str) -> Vec<ChatMessage>;
    fn pop_last(&self, conversation_id: &str) -> Option<ChatMessage>;
    fn clear(&self, conversation_id: &str);
    fn conversation_ids(&self) -> Vec<String>;
}

#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    conversations: DashMap<String, Vec<ChatMessage>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes every conversation as a JSON object keyed by id.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let snapshot: BTreeMap<String, Vec<ChatMessage>> = self
            .conversations
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        serde_json::to_string_pretty(&snapshot)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let snapshot: BTreeMap<String, Vec<ChatMessage>> = serde_json::from_str(raw)?;
        Ok(Self {
            conversations: snapshot.into_iter().collect(),
        })
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn append(&self, conversation_id: &str, message: ChatMessage) {
        self.conversations
            .entry(conversation_id.to_string())
            .or_default()
            .push(message);
    }

    fn history(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.conversations
            .get(conversation_id)
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    fn pop_last(&self, conversation_id: &str) -> Option<ChatMessage> {
        self.conversations
            .get_mut(conversation_id)
            .and_then(|mut messages| messages.pop())
    }

    fn clear(&self, conversation_id: &str) {
        self.conversations.remove(conversation_id);
    }

    fn conversation_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .conversations
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }
}
