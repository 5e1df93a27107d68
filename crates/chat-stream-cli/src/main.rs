//! Terminal chat front-end.

mod terminal;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chat_stream_client::{
    ChatClient, ClientConfig, ClientError, ConversationStore, InMemoryConversationStore,
    ReasoningEffort, SendOutcome, SendRequest,
};
use chat_stream_core::observability::init_observability_with_default;
use chat_stream_core::{AbortSignal, abort_pair};
use clap::Parser;
use tokio::io::AsyncBufReadExt as _;

use crate::terminal::TerminalView;

/// Stream answers from an OpenAI-compatible Responses API.
#[derive(Parser, Debug)]
#[command(name = "chat-stream")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Prompt to send. Starts an interactive session when omitted.
    prompt: Option<String>,

    /// Model name (overrides CHAT_STREAM_MODEL).
    #[arg(short, long)]
    model: Option<String>,

    /// Endpoint base URL (overrides CHAT_STREAM_BASE_URL).
    #[arg(long)]
    base_url: Option<String>,

    /// System prompt (overrides CHAT_STREAM_SYSTEM_PROMPT).
    #[arg(long)]
    system: Option<String>,

    /// Let the model search the web.
    #[arg(long)]
    web_search: bool,

    /// Reasoning effort hint: low, medium or high.
    #[arg(long)]
    reasoning_effort: Option<ReasoningEffort>,

    /// Conversation to append to.
    #[arg(short, long, default_value = "default")]
    conversation: String,

    /// Give up on a reply after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Give up when the server sends nothing for this many seconds.
    #[arg(long)]
    idle_timeout_secs: Option<u64>,

    /// JSON file the conversation history is loaded from and saved to.
    #[arg(long)]
    history: Option<PathBuf>,
}

impl Args {
    fn apply(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(system) = &self.system {
            config.system_prompt = Some(system.clone());
        }
        if self.web_search {
            config.web_search = true;
        }
        if let Some(effort) = self.reasoning_effort {
            config.reasoning_effort = Some(effort);
        }
        if let Some(secs) = self.timeout_secs {
            config.stream.absolute_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.idle_timeout_secs {
            config.stream.inactivity_timeout = Duration::from_secs(secs);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();
    init_observability_with_default("warn");

    let config = args.apply(ClientConfig::from_env().context("loading client configuration")?);
    config.validate().context("invalid client configuration")?;

    let store = Arc::new(load_store(args.history.as_deref())?);
    let client = ChatClient::openai_builder(config)?
        .store(store.clone())
        .build()?;
    tracing::info!(model = client.model(), conversation = %args.conversation, "chat client ready");

    match &args.prompt {
        Some(prompt) => {
            let outcome = send_turn(&client, &args.conversation, prompt).await;
            save_store(args.history.as_deref(), &store)?;
            outcome?;
        }
        None => repl(&client, &args, &store).await?,
    }
    Ok(())
}

async fn repl(
    client: &ChatClient,
    args: &Args,
    store: &InMemoryConversationStore,
) -> Result<()> {
    eprintln!("chat-stream ({}). /regen retries, /clear resets, /quit exits.", client.model());
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let result = match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                store.clear(&args.conversation);
                eprintln!("conversation cleared");
                Ok(())
            }
            "/regen" => regenerate_turn(client, &args.conversation).await,
            prompt => send_turn(client, &args.conversation, prompt).await,
        };
        // Stream failures were already shown by the view.
        if let Err(err) = result
            && err.stream_error().is_none()
        {
            eprintln!("error: {err}");
        }
        save_store(args.history.as_deref(), store)?;
    }
    Ok(())
}

async fn send_turn(client: &ChatClient, conversation: &str, prompt: &str) -> Result<(), ClientError> {
    let mut view = TerminalView::stdio();
    let (abort, watcher) = abort_on_ctrl_c();
    let outcome = client
        .send(SendRequest::new(conversation, prompt), &mut view, abort)
        .await;
    watcher.abort();
    report(outcome)
}

async fn regenerate_turn(client: &ChatClient, conversation: &str) -> Result<(), ClientError> {
    let mut view = TerminalView::stdio();
    let (abort, watcher) = abort_on_ctrl_c();
    let outcome = client.regenerate(conversation, &[], &mut view, abort).await;
    watcher.abort();
    report(outcome)
}

fn report(outcome: Result<SendOutcome, ClientError>) -> Result<(), ClientError> {
    match outcome? {
        SendOutcome::Completed(reply) => {
            tracing::debug!(message_id = %reply.id, chars = reply.content.chars().count(), "reply stored");
        }
        SendOutcome::Aborted => eprintln!("\n(stopped)"),
    }
    Ok(())
}

/// Aborts the in-flight stream on the next Ctrl-C.
fn abort_on_ctrl_c() -> (AbortSignal, tokio::task::JoinHandle<()>) {
    let (handle, signal) = abort_pair();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.abort();
        }
    });
    (signal, watcher)
}

fn load_store(path: Option<&Path>) -> Result<InMemoryConversationStore> {
    match path {
        Some(path) if path.exists() => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading history {}", path.display()))?;
            InMemoryConversationStore::from_json(&raw)
                .with_context(|| format!("parsing history {}", path.display()))
        }
        _ => Ok(InMemoryConversationStore::new()),
    }
}

fn save_store(path: Option<&Path>, store: &InMemoryConversationStore) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let raw = store.to_json().context("serializing history")?;
    std::fs::write(path, raw).with_context(|| format!("writing history {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_environment_config() {
        let args = Args::parse_from([
            "chat-stream",
            "--model",
            "gpt-4.1",
            "--web-search",
            "--reasoning-effort",
            "high",
            "--idle-timeout-secs",
            "7",
            "hello",
        ]);
        let config = args.apply(ClientConfig::new("k"));
        assert_eq!(args.prompt.as_deref(), Some("hello"));
        assert_eq!(config.model, "gpt-4.1");
        assert!(config.web_search);
        assert_eq!(config.reasoning_effort, Some(ReasoningEffort::High));
        assert_eq!(config.stream.inactivity_timeout, Duration::from_secs(7));
        assert_eq!(args.conversation, "default");
    }

    #[test]
    fn history_file_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("history.json");
        let store = InMemoryConversationStore::new();
        store.append("default", chat_stream_client::ChatMessage::user("hi"));
        save_store(Some(&path), &store).expect("save");

        let loaded = load_store(Some(&path)).expect("load");
        assert_eq!(loaded.history("default"), store.history("default"));
    }

    #[test]
    fn missing_history_file_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = load_store(Some(&dir.path().join("absent.json"))).expect("store");
        assert!(store.conversation_ids().is_empty());
    }
}
