use std::sync::Arc;

use chat_stream_core::{
    AbortSignal, ContextSource, DriveOutcome, MarkdownRenderer, MessageView, NoopObserver,
    PulldownMarkdown, StreamConfig, StreamDriver, StreamObserver, StreamSession, ToolHandler,
};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::openai::OpenAiResponses;
use crate::store::{ChatMessage, ConversationStore, InMemoryConversationStore, Role};
use crate::transport::{ResponsesRequest, ResponsesTransport};

/// One user turn to send.
#[derive(Clone, Debug, PartialEq)]
pub struct SendRequest {
    pub conversation_id: String,
    pub text: String,
    pub context: Vec<ContextSource>,
}

impl SendRequest {
    pub fn new(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            text: text.into(),
            context: Vec::new(),
        }
    }

    /// Attaches retrieved sources shown in the thinking log and sent to the model.
    pub fn with_context(mut self, context: Vec<ContextSource>) -> Self {
        self.context = context;
        self
    }
}

/// Result of a send that did not fail.
#[derive(Clone, Debug, PartialEq)]
pub enum SendOutcome {
    /// The stored assistant turn.
    Completed(ChatMessage),
    Aborted,
}

/// Builder for [`ChatClient`].
pub struct ChatClientBuilder {
    transport: Option<Arc<dyn ResponsesTransport>>,
    store: Option<Arc<dyn ConversationStore>>,
    markdown: Option<Arc<dyn MarkdownRenderer>>,
    tools: Option<Arc<dyn ToolHandler>>,
    model: Option<String>,
    system_prompt: Option<String>,
    web_search: bool,
    stream: StreamConfig,
}

impl ChatClientBuilder {
    fn new() -> Self {
        Self {
            transport: None,
            store: None,
            markdown: None,
            tools: None,
            model: None,
            system_prompt: None,
            web_search: false,
            stream: StreamConfig::default(),
        }
    }

    pub fn transport(mut self, transport: Arc<dyn ResponsesTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Defaults to an [`InMemoryConversationStore`].
    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to [`PulldownMarkdown`].
    pub fn markdown(mut self, markdown: Arc<dyn MarkdownRenderer>) -> Self {
        self.markdown = Some(markdown);
        self
    }

    pub fn tools(mut self, tools: Arc<dyn ToolHandler>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }

    pub fn stream_config(mut self, config: StreamConfig) -> Self {
        self.stream = config;
        self
    }

    pub fn build(self) -> Result<ChatClient, ClientError> {
        let transport = self
            .transport
            .ok_or_else(|| ClientError::Config("no transport configured".into()))?;
        let model = self
            .model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ClientError::Config("model must be set".into()))?;
        self.stream.validate()?;
        Ok(ChatClient {
            transport,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryConversationStore::new())),
            markdown: self.markdown.unwrap_or_else(|| Arc::new(PulldownMarkdown)),
            tools: self.tools,
            model,
            system_prompt: self.system_prompt,
            web_search: self.web_search,
            stream: self.stream,
        })
    }
}

/// Application context for chat: transport, history, rendering and tools.
///
/// Cloning is cheap; clones share the transport and store.
#[derive(Clone)]
pub struct ChatClient {
    transport: Arc<dyn ResponsesTransport>,
    store: Arc<dyn ConversationStore>,
    markdown: Arc<dyn MarkdownRenderer>,
    tools: Option<Arc<dyn ToolHandler>>,
    model: String,
    system_prompt: Option<String>,
    web_search: bool,
    stream: StreamConfig,
}

impl ChatClient {
    pub fn builder() -> ChatClientBuilder {
        ChatClientBuilder::new()
    }

    /// Builds a client on the OpenAI transport with settings from `config`.
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        Self::openai_builder(config)?.build()
    }

    /// Builder preset with the OpenAI transport, for adding a store or tools.
    pub fn openai_builder(config: ClientConfig) -> Result<ChatClientBuilder, ClientError> {
        let mut builder = Self::builder()
            .model(config.model.clone())
            .web_search(config.web_search)
            .stream_config(config.stream.clone());
        if let Some(prompt) = config.system_prompt.clone() {
            builder = builder.system_prompt(prompt);
        }
        Ok(builder.transport(Arc::new(OpenAiResponses::new(config)?)))
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// Stores the user turn, streams the reply into `view`, and stores the
    /// assistant turn once the stream completes.
    ///
    /// Failures leave only the user turn stored and show an error notice in
    /// the view. Abort leaves the partial text on screen and stores nothing.
    pub async fn send<V>(
        &self,
        request: SendRequest,
        view: &mut V,
        abort: AbortSignal,
    ) -> Result<SendOutcome, ClientError>
    where
        V: MessageView + ?Sized,
    {
        self.send_with_observer(request, view, abort, &mut NoopObserver)
            .await
    }

    pub async fn send_with_observer<V>(
        &self,
        request: SendRequest,
        view: &mut V,
        abort: AbortSignal,
        observer: &mut dyn StreamObserver,
    ) -> Result<SendOutcome, ClientError>
    where
        V: MessageView + ?Sized,
    {
        let conversation_id = request.conversation_id.trim();
        if conversation_id.is_empty() {
            return Err(ClientError::Validation(
                "conversation id must not be empty".into(),
            ));
        }
        let text = request.text.trim();
        if text.is_empty() {
            return Err(ClientError::Validation("message must not be empty".into()));
        }

        self.store.append(conversation_id, ChatMessage::user(text));
        let history = self.store.history(conversation_id);
        match self
            .stream_reply(history, &request.context, view, abort, observer)
            .await?
        {
            DriveOutcome::Completed(message) => {
                let stored = ChatMessage::assistant(&message);
                self.store.append(conversation_id, stored.clone());
                Ok(SendOutcome::Completed(stored))
            }
            DriveOutcome::Aborted => Ok(SendOutcome::Aborted),
        }
    }

    /// Streams a fresh answer to the last user turn of a conversation.
    ///
    /// A trailing assistant turn is left out of the request and replaced only
    /// when the new answer completes.
    pub async fn regenerate<V>(
        &self,
        conversation_id: &str,
        context: &[ContextSource],
        view: &mut V,
        abort: AbortSignal,
    ) -> Result<SendOutcome, ClientError>
    where
        V: MessageView + ?Sized,
    {
        let mut history = self.store.history(conversation_id);
        let replaces_answer = history
            .last()
            .is_some_and(|message| message.role == Role::Assistant);
        if replaces_answer {
            history.pop();
        }
        if !history
            .last()
            .is_some_and(|message| message.role == Role::User)
        {
            return Err(ClientError::Validation(format!(
                "conversation {conversation_id} has no user turn to answer"
            )));
        }
        debug!(conversation_id, replaces_answer, "regenerating reply");

        match self
            .stream_reply(history, context, view, abort, &mut NoopObserver)
            .await?
        {
            DriveOutcome::Completed(message) => {
                if replaces_answer {
                    self.store.pop_last(conversation_id);
                }
                let stored = ChatMessage::assistant(&message);
                self.store.append(conversation_id, stored.clone());
                Ok(SendOutcome::Completed(stored))
            }
            DriveOutcome::Aborted => Ok(SendOutcome::Aborted),
        }
    }

    async fn stream_reply<V>(
        &self,
        history: Vec<ChatMessage>,
        context: &[ContextSource],
        view: &mut V,
        abort: AbortSignal,
        observer: &mut dyn StreamObserver,
    ) -> Result<DriveOutcome, ClientError>
    where
        V: MessageView + ?Sized,
    {
        let mut session = StreamSession::new(view, Arc::clone(&self.markdown), self.stream.clone());
        let request = ResponsesRequest {
            session_id: session.id(),
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            history,
            context: context.to_vec(),
            web_search: self.web_search,
            tools: self
                .tools
                .as_ref()
                .map(|tools| tools.definitions())
                .unwrap_or_default(),
        };
        info!(
            session_id = %session.id(),
            transport = self.transport.name(),
            model = %self.model,
            "sending chat request"
        );
        session.begin(context);

        let mut driver = StreamDriver::new(self.stream.clone());
        if let Some(tools) = &self.tools {
            driver = driver.with_tools(Arc::clone(tools));
        }
        let transport = Arc::clone(&self.transport);
        let connect = async move { transport.open(&request).await };
        Ok(driver.run(connect, &mut session, abort, observer).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use bytes::Bytes;
    use chat_stream_core::{
        ByteStream, RecordingView, StreamError, ThinkingLogEntry, ToolCall, ToolDefinition,
        ToolError, ToolResult, abort_pair,
    };
    use futures::StreamExt as _;
    use futures::stream;

    use super::*;

    enum Reply {
        Body(Vec<&'static str>),
        Http(u16),
        Stall(&'static str),
    }

    /// Serves scripted replies in order and records every request.
    struct ScriptedTransport {
        replies: Mutex<Vec<Reply>>,
        requests: Mutex<Vec<ResponsesRequest>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ResponsesRequest> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    #[async_trait::async_trait]
    impl ResponsesTransport for ScriptedTransport {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn open(&self, request: &ResponsesRequest) -> Result<ByteStream, StreamError> {
            self.requests
                .lock()
                .expect("requests lock")
                .push(request.clone());
            let reply = self.replies.lock().expect("replies lock").remove(0);
            match reply {
                Reply::Body(lines) => Ok(Box::pin(stream::iter(
                    lines
                        .into_iter()
                        .map(|line| Ok(Bytes::from(format!("{line}\n"))))
                        .collect::<Vec<_>>(),
                ))),
                Reply::Http(status) => Err(StreamError::Http {
                    status,
                    body: "upstream said no".into(),
                }),
                Reply::Stall(first) => Ok(Box::pin(
                    stream::iter(vec![Ok(Bytes::from(format!("{first}\n")))])
                        .chain(stream::pending()),
                )),
            }
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> ChatClient {
        ChatClient::builder()
            .transport(transport)
            .model("gpt-5-nano")
            .build()
            .expect("client")
    }

    const HELLO: &[&str] = &[
        r#"data: {"type":"response.output_text.delta","delta":"Hel"}"#,
        r#"data: {"type":"response.output_text.delta","delta":"lo"}"#,
        "data: [DONE]",
    ];

    #[tokio::test]
    async fn send_stores_both_turns_on_success() {
        let transport = ScriptedTransport::new(vec![Reply::Body(HELLO.to_vec())]);
        let chat = client(transport.clone());
        let mut view = RecordingView::new();

        let outcome = chat
            .send(SendRequest::new("c1", "  hi there "), &mut view, AbortSignal::never())
            .await
            .expect("send");

        let SendOutcome::Completed(reply) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(reply.content, "Hello");
        assert_eq!(view.source_text(), "Hello");
        assert_eq!(view.status_count(), 0);

        let history = chat.store().history("c1");
        assert_eq!(history.len(), 2);
        assert_eq!((history[0].role, history[0].content.as_str()), (Role::User, "hi there"));
        assert_eq!(history[1].role, Role::Assistant);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].history.len(), 1);
        assert_eq!(requests[0].model, "gpt-5-nano");
    }

    #[tokio::test]
    async fn duplicate_lines_are_counted_once() {
        let line = r#"data: {"type":"response.output_text.delta","delta":"ab","event_id":"e1"}"#;
        let transport = ScriptedTransport::new(vec![Reply::Body(vec![line, line, "data: [DONE]"])]);
        let chat = client(transport);
        let mut view = RecordingView::new();
        let outcome = chat
            .send(SendRequest::new("c1", "hi"), &mut view, AbortSignal::never())
            .await
            .expect("send");
        assert!(matches!(outcome, SendOutcome::Completed(m) if m.content == "ab"));
    }

    #[tokio::test]
    async fn web_search_status_is_shown_then_cleared() {
        let transport = ScriptedTransport::new(vec![Reply::Body(vec![
            r#"data: {"type":"response.output_item.added","item":{"type":"web_search_call","id":"ws1","action":{"query":"weather today"}}}"#,
            r#"data: {"type":"response.output_item.done","item":{"type":"web_search_call","id":"ws1","status":"completed","action":{"query":"weather today"}}}"#,
            r#"data: {"type":"response.output_text.delta","delta":"Sunny."}"#,
            "data: [DONE]",
        ])]);
        let chat = client(transport);
        let mut view = RecordingView::new();
        let outcome = chat
            .send(SendRequest::new("c1", "weather?"), &mut view, AbortSignal::never())
            .await
            .expect("send");

        let SendOutcome::Completed(reply) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(reply.content, "Sunny.");
        assert_eq!(view.status_count(), 0);
        assert_eq!(view.max_concurrent_status(), 1);
        assert!(reply.thinking.contains(&ThinkingLogEntry::SearchQuery {
            query: "weather today".into()
        }));
    }

    #[tokio::test]
    async fn failed_stream_keeps_only_the_user_turn() {
        let transport = ScriptedTransport::new(vec![Reply::Http(500)]);
        let chat = client(transport);
        let mut view = RecordingView::new();
        let err = chat
            .send(SendRequest::new("c1", "hi"), &mut view, AbortSignal::never())
            .await
            .expect_err("should fail");

        assert!(matches!(
            err.stream_error(),
            Some(StreamError::Http { status: 500, .. })
        ));
        assert_eq!(view.errors().len(), 1);
        assert!(view.errors()[0].retryable);
        let history = chat.store().history("c1");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_stores_nothing_and_shows_no_error() {
        let transport = ScriptedTransport::new(vec![Reply::Stall(
            r#"data: {"type":"response.output_text.delta","delta":"partial"}"#,
        )]);
        let chat = client(transport);
        let mut view = RecordingView::new();
        let (handle, signal) = abort_pair();
        let aborter = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            handle.abort();
        });

        let outcome = chat
            .send(SendRequest::new("c1", "hi"), &mut view, signal)
            .await
            .expect("abort is not an error");
        aborter.await.expect("abort task");

        assert_eq!(outcome, SendOutcome::Aborted);
        assert_eq!(view.source_text(), "partial");
        assert!(view.errors().is_empty());
        assert_eq!(view.status_count(), 0);
        assert_eq!(chat.store().history("c1").len(), 1);
    }

    #[tokio::test]
    async fn regenerate_replaces_the_last_answer() {
        let transport = ScriptedTransport::new(vec![
            Reply::Body(HELLO.to_vec()),
            Reply::Body(vec![r#"data: {"delta":"Hi again"}"#]),
        ]);
        let chat = client(transport.clone());
        let mut view = RecordingView::new();
        chat.send(SendRequest::new("c1", "hi"), &mut view, AbortSignal::never())
            .await
            .expect("send");

        let mut second_view = RecordingView::new();
        let outcome = chat
            .regenerate("c1", &[], &mut second_view, AbortSignal::never())
            .await
            .expect("regenerate");

        assert!(matches!(outcome, SendOutcome::Completed(m) if m.content == "Hi again"));
        let history = chat.store().history("c1");
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "Hi again"]);
        let requests = transport.requests();
        assert_eq!(requests[1].history.len(), 1, "old answer is not resent");
    }

    #[tokio::test]
    async fn regenerate_failure_keeps_the_previous_answer() {
        let transport = ScriptedTransport::new(vec![Reply::Body(HELLO.to_vec()), Reply::Http(503)]);
        let chat = client(transport);
        let mut view = RecordingView::new();
        chat.send(SendRequest::new("c1", "hi"), &mut view, AbortSignal::never())
            .await
            .expect("send");

        let mut retry_view = RecordingView::new();
        assert!(
            chat.regenerate("c1", &[], &mut retry_view, AbortSignal::never())
                .await
                .is_err()
        );
        let history = chat.store().history("c1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "Hello");
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected_before_sending() {
        let transport = ScriptedTransport::new(Vec::new());
        let chat = client(transport.clone());
        let mut view = RecordingView::new();
        assert!(matches!(
            chat.send(SendRequest::new("c1", "   "), &mut view, AbortSignal::never())
                .await,
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            chat.regenerate("empty", &[], &mut view, AbortSignal::never())
                .await,
            Err(ClientError::Validation(_))
        ));
        assert!(transport.requests().is_empty());
        assert_eq!(view.render_calls(), 0);
    }

    #[test]
    fn builder_requires_transport_and_model() {
        assert!(matches!(
            ChatClient::builder().model("m").build(),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ChatClient::builder()
                .transport(ScriptedTransport::new(Vec::new()))
                .model("  ")
                .build(),
            Err(ClientError::Config(_))
        ));
    }

    struct FileTool;

    #[async_trait::async_trait]
    impl ToolHandler for FileTool {
        fn definitions(&self) -> Vec<ToolDefinition> {
            vec![ToolDefinition {
                name: "export_csv".into(),
                description: "Export rows as CSV".into(),
                parameters: serde_json::json!({"type": "object"}),
            }]
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::file(call.call_id.clone(), "rows.csv", "/files/rows.csv"))
        }
    }

    #[tokio::test]
    async fn tool_definitions_are_advertised_and_results_stored() {
        let transport = ScriptedTransport::new(vec![Reply::Body(vec![
            r#"data: {"type":"response.output_item.done","item":{"type":"function_call","call_id":"c9","name":"export_csv","arguments":"{}"}}"#,
            r#"data: {"type":"response.output_text.delta","delta":"Exported."}"#,
        ])]);
        let chat = ChatClient::builder()
            .transport(transport.clone())
            .model("gpt-5-nano")
            .tools(Arc::new(FileTool))
            .web_search(true)
            .build()
            .expect("client");
        let mut view = RecordingView::new();
        let outcome = chat
            .send(
                SendRequest::new("c1", "export")
                    .with_context(vec![ContextSource::new("Sheet", "42 rows")]),
                &mut view,
                AbortSignal::never(),
            )
            .await
            .expect("send");

        let SendOutcome::Completed(reply) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(
            reply.tool_results,
            vec![ToolResult::file("c9", "rows.csv", "/files/rows.csv")]
        );
        let request = &transport.requests()[0];
        assert!(request.web_search);
        assert_eq!(request.tools[0].name, "export_csv");
        assert_eq!(request.context.len(), 1);
    }
}
