//! Tool calls announced by the stream and the result cards they produce.

use crate::errors::ToolError;

/// A completed function-call item from the stream.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    /// Raw JSON argument string as sent by the model.
    pub arguments: String,
}

impl ToolCall {
    /// Parses the argument string, treating an empty string as `{}`.
    pub fn arguments_json(&self) -> Result<serde_json::Value, ToolError> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_str(&self.arguments).map_err(|e| ToolError::InvalidArguments {
            tool: self.name.clone(),
            message: e.to_string(),
        })
    }
}

/// Payload of a tool result card.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultKind {
    /// Downloadable file.
    File {
        name: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime: Option<String>,
    },
    /// Generated or fetched image.
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },
    /// Free-form analysis summary.
    Analysis { summary: String },
}

/// A non-text node rendered into the message next to the Markdown body.
///
/// Once attached it must survive every later re-render of the message.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    #[serde(flatten)]
    pub kind: ToolResultKind,
}

impl ToolResult {
    pub fn file(call_id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            kind: ToolResultKind::File {
                name: name.into(),
                url: url.into(),
                mime: None,
            },
        }
    }

    pub fn image(call_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            kind: ToolResultKind::Image {
                url: url.into(),
                alt: None,
            },
        }
    }

    pub fn analysis(call_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            kind: ToolResultKind::Analysis {
                summary: summary.into(),
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            ToolResultKind::File { .. } => "file",
            ToolResultKind::Image { .. } => "image",
            ToolResultKind::Analysis { .. } => "analysis",
        }
    }
}

/// Function tool advertised to the model.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// Executes completed tool calls and turns them into result cards.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    /// Function tools to advertise on outgoing requests.
    fn definitions(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError>;
}
