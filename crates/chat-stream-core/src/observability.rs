//! Logging bootstrap.
//!
//! Settings are resolved from `CHAT_STREAM_*` variables into [`LogSettings`]
//! first, then installed once per process.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "chat-stream.logs.jsonl";

/// Where log records go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogOutput {
    Disabled,
    /// Compact lines on stderr, keeping stdout free for answers.
    Stderr,
    /// JSON lines appended to a file.
    JsonFile(PathBuf),
}

/// Resolved logging settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub output: LogOutput,
    /// `EnvFilter` directive, e.g. `info` or `chat_stream_core=debug`.
    pub filter: String,
}

impl LogSettings {
    /// Reads the process environment.
    ///
    /// - `CHAT_STREAM_OBSERVABILITY`: `off`/`false`/`0` disables logging (default on).
    /// - `CHAT_STREAM_LOG_LEVEL`: filter directive, falling back to `RUST_LOG`,
    ///   then `default_filter`.
    /// - `CHAT_STREAM_JSON_LOG_PATH`: JSONL file; stderr when unset.
    pub fn from_env(default_filter: &str) -> Self {
        Self::from_lookup(default_filter, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(default_filter: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("CHAT_STREAM_OBSERVABILITY")
            .and_then(|raw| parse_switch(&raw))
            .unwrap_or(true);
        let filter = ["CHAT_STREAM_LOG_LEVEL", "RUST_LOG"]
            .into_iter()
            .filter_map(&lookup)
            .map(|raw| raw.trim().to_string())
            .find(|raw| EnvFilter::try_new(raw).is_ok())
            .unwrap_or_else(|| default_filter.to_string());
        let output = match (enabled, lookup("CHAT_STREAM_JSON_LOG_PATH")) {
            (false, _) => LogOutput::Disabled,
            (true, Some(path)) if !path.trim().is_empty() => LogOutput::JsonFile(PathBuf::from(path.trim())),
            (true, _) => LogOutput::Stderr,
        };
        Self { output, filter }
    }

    /// Installs a global subscriber. Returns `false` if one was already set.
    pub fn install(&self) -> bool {
        let filter = EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new("info"));
        match &self.output {
            LogOutput::Disabled => false,
            LogOutput::Stderr => tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .is_ok(),
            LogOutput::JsonFile(path) => {
                let (dir, file_name) = split_log_path(path);
                if let Err(e) = std::fs::create_dir_all(&dir) {
                    eprintln!("cannot create log directory {}: {e}", dir.display());
                }
                tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_current_span(true)
                            .with_span_list(true)
                            .with_writer(tracing_appender::rolling::never(dir, file_name)),
                    )
                    .try_init()
                    .is_ok()
            }
        }
    }
}

/// Initializes logging once per process with an `info` default filter.
pub fn init_observability() {
    init_observability_with_default("info");
}

/// Same as [`init_observability`] with another filter for when neither
/// `CHAT_STREAM_LOG_LEVEL` nor `RUST_LOG` is usable.
pub fn init_observability_with_default(default_filter: &str) {
    INIT.get_or_init(|| {
        LogSettings::from_env(default_filter).install();
    });
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (dir, file_name)
}
