//! The single "system status" line shown while a response streams.
//!
//! Transitions: absent -> thinking -> searching -> processing -> absent.
//! At most one status node exists per session; later phases update it in place.

use tracing::debug;

use crate::view::{MessageView, StatusNodeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPhase {
    Thinking,
    Searching,
    Processing,
}

/// Content of the status node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    pub phase: StatusPhase,
    pub query: Option<String>,
}

impl StatusMessage {
    pub fn thinking() -> Self {
        Self {
            phase: StatusPhase::Thinking,
            query: None,
        }
    }

    pub fn searching(query: Option<String>) -> Self {
        Self {
            phase: StatusPhase::Searching,
            query,
        }
    }

    pub fn processing(query: impl Into<String>) -> Self {
        Self {
            phase: StatusPhase::Processing,
            query: Some(query.into()),
        }
    }

    pub fn text(&self) -> String {
        match (self.phase, self.query.as_deref()) {
            (StatusPhase::Thinking, _) => "Thinking...".to_string(),
            (StatusPhase::Searching, Some(q)) => format!("Searching the web: {q}"),
            (StatusPhase::Searching, None) => "Searching the web...".to_string(),
            (StatusPhase::Processing, Some(q)) => format!("Analyzing results: {q}"),
            (StatusPhase::Processing, None) => "Analyzing results...".to_string(),
        }
    }
}

/// Owns the status node of one session and applies phase transitions.
#[derive(Debug, Default)]
pub struct StatusController {
    node: Option<(StatusNodeId, StatusMessage)>,
}

impl StatusController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&StatusMessage> {
        self.node.as_ref().map(|(_, message)| message)
    }

    pub fn is_present(&self) -> bool {
        self.node.is_some()
    }

    /// Shows the initial "thinking" status if nothing is shown yet.
    pub fn show_thinking<V: MessageView + ?Sized>(&mut self, view: &mut V) {
        if self.node.is_none() {
            self.upsert(view, StatusMessage::thinking());
        }
    }

    /// Creates or updates the status to "searching". A known query is kept
    /// when a later start event arrives without one.
    pub fn on_web_search_start<V: MessageView + ?Sized>(
        &mut self,
        view: &mut V,
        query: Option<String>,
    ) {
        let query = query.or_else(|| match self.current() {
            Some(StatusMessage {
                phase: StatusPhase::Searching,
                query,
            }) => query.clone(),
            _ => None,
        });
        self.upsert(view, StatusMessage::searching(query));
    }

    /// Search completion alone changes nothing; the query-completed event follows.
    pub fn on_web_search_completed(&mut self) {}

    /// Moves an existing status to "analyzing results". Dropped when no status is shown.
    pub fn on_query_completed<V: MessageView + ?Sized>(&mut self, view: &mut V, query: &str) {
        if self.node.is_none() {
            debug!(query, "query completed without a status message; dropped");
            return;
        }
        self.upsert(view, StatusMessage::processing(query));
    }

    /// Removes the status node, if any.
    pub fn clear<V: MessageView + ?Sized>(&mut self, view: &mut V, fade: bool) {
        if let Some((id, _)) = self.node.take() {
            view.remove_status(id, fade);
        }
    }

    fn upsert<V: MessageView + ?Sized>(&mut self, view: &mut V, message: StatusMessage) {
        match &mut self.node {
            Some((id, current)) => {
                if *current != message {
                    view.update_status(*id, &message);
                    *current = message;
                }
            }
            None => {
                let id = view.create_status(&message);
                self.node = Some((id, message));
            }
        }
    }
}
