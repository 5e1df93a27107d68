use chat_stream_core::{ByteStream, StreamError};
use futures::StreamExt as _;
use reqwest::header::ACCEPT;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::store::Role;
use crate::transport::{ResponsesRequest, ResponsesTransport};

const OPENAI_TRANSPORT: &str = "openai";
const ERROR_BODY_LIMIT: usize = 2_000;

/// Transport for OpenAI's Responses API (streaming).
pub struct OpenAiResponses {
    client: reqwest::Client,
    config: ClientConfig,
}

impl OpenAiResponses {
    /// Creates a transport from explicit client configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        // No overall request timeout here: the stream driver owns the
        // absolute and inactivity deadlines.
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build OpenAI client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a transport using `OPENAI_API_KEY` and the `CHAT_STREAM_*` variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl ResponsesTransport for OpenAiResponses {
    fn name(&self) -> &str {
        OPENAI_TRANSPORT
    }

    async fn open(&self, request: &ResponsesRequest) -> Result<ByteStream, StreamError> {
        let body = build_request_body(request, &self.config);
        debug!(
            session_id = %request.session_id,
            model = %request.model,
            turns = request.history.len(),
            tools = request.tools.len(),
            web_search = request.web_search,
            "opening OpenAI responses stream"
        );

        let response = self
            .client
            .post(self.config.responses_url())
            .bearer_auth(&self.config.api_key)
            .header(ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| StreamError::network(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StreamError::Http {
                status: status.as_u16(),
                body: truncate_chars(&body, ERROR_BODY_LIMIT),
            });
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| StreamError::network(format!("OpenAI streaming read failed: {e}")))
        });
        Ok(Box::pin(stream))
    }
}

pub(crate) fn build_request_body(
    request: &ResponsesRequest,
    config: &ClientConfig,
) -> serde_json::Value {
    let mut input = Vec::new();
    if let Some(system_prompt) = request
        .system_prompt
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        input.push(serde_json::json!({
            "role": "system",
            "content": system_prompt,
        }));
    }
    if let Some(context) = render_context(request) {
        input.push(serde_json::json!({
            "role": "system",
            "content": context,
        }));
    }
    for message in &request.history {
        // Failed or empty assistant turns carry nothing the model can use.
        if message.role == Role::Assistant && message.content.trim().is_empty() {
            continue;
        }
        input.push(serde_json::json!({
            "role": message.role.as_str(),
            "content": message.content,
        }));
    }

    let mut body = serde_json::json!({
        "model": request.model,
        "input": input,
        "stream": true,
        "store": config.store,
    });

    let mut tools = Vec::new();
    if request.web_search {
        tools.push(serde_json::json!({ "type": "web_search_preview" }));
    }
    for tool in &request.tools {
        tools.push(serde_json::json!({
            "type": "function",
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }));
    }
    if !tools.is_empty() {
        body["tools"] = serde_json::Value::Array(tools);
    }

    if let Some(effort) = config.reasoning_effort {
        body["reasoning"] = serde_json::json!({ "effort": effort });
    }

    body
}

fn render_context(request: &ResponsesRequest) -> Option<String> {
    if request.context.is_empty() {
        return None;
    }
    let mut out = String::from("Use the following sources when they are relevant to the answer:\n");
    for (idx, source) in request.context.iter().enumerate() {
        out.push_str(&format!("\n[{}] {}\n{}\n", idx + 1, source.title, source.snippet));
    }
    Some(out)
}

fn truncate_chars(value: &str, limit: usize) -> String {
    match value.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}
