//! Client settings, from code or the environment.

use std::time::Duration;

use chat_stream_core::StreamConfig;

use crate::errors::ClientError;
use crate::openai::ReasoningEffort;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-5-nano";

/// Configuration for the Responses API client and its streams.
///
/// ```
/// use std::time::Duration;
/// use chat_stream_client::{ClientConfig, ReasoningEffort};
///
/// let config = ClientConfig::new("sk-test")
///     .base_url("http://localhost:8080/")
///     .model("gpt-4.1-mini")
///     .reasoning_effort(ReasoningEffort::Low)
///     .connect_timeout(Duration::from_secs(3));
/// assert!(config.validate().is_ok());
/// assert!(!config.store);
/// assert!(ClientConfig::new("sk-test").model(" ").validate().is_err());
/// ```
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL of the OpenAI-compatible endpoint.
    ///
    /// Useful for proxies or local test servers.
    pub base_url: String,
    /// Model name sent with every request.
    pub model: String,
    /// Optional system prompt prepended to every request.
    pub system_prompt: Option<String>,
    /// Advertise the hosted web search tool.
    pub web_search: bool,
    /// Whether the provider should store responses server-side.
    pub store: bool,
    /// Optional reasoning effort hint.
    pub reasoning_effort: Option<ReasoningEffort>,
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Absolute and inactivity timers for each stream.
    pub stream: StreamConfig,
}

impl ClientConfig {
    /// Creates a config with defaults and the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            web_search: false,
            store: false,
            reasoning_effort: None,
            connect_timeout: Duration::from_secs(10),
            stream: StreamConfig::default(),
        }
    }

    /// Builds a config from the process environment.
    ///
    /// - `OPENAI_API_KEY` (required)
    /// - `CHAT_STREAM_BASE_URL`, `CHAT_STREAM_MODEL`, `CHAT_STREAM_SYSTEM_PROMPT`
    /// - `CHAT_STREAM_WEB_SEARCH` (`true`/`false`)
    /// - `CHAT_STREAM_TIMEOUT_SECS`, `CHAT_STREAM_IDLE_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("OPENAI_API_KEY")
            .ok_or_else(|| ClientError::Config("missing OPENAI_API_KEY".into()))?;
        let mut config = Self::new(api_key);
        if let Some(base_url) = get("CHAT_STREAM_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(model) = get("CHAT_STREAM_MODEL") {
            config.model = model;
        }
        config.system_prompt = get("CHAT_STREAM_SYSTEM_PROMPT");
        if let Some(raw) = get("CHAT_STREAM_WEB_SEARCH") {
            config.web_search = parse_bool(&raw).ok_or_else(|| {
                ClientError::Config(format!("CHAT_STREAM_WEB_SEARCH is not a boolean: {raw}"))
            })?;
        }
        if let Some(raw) = get("CHAT_STREAM_TIMEOUT_SECS") {
            config.stream.absolute_timeout = parse_secs("CHAT_STREAM_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = get("CHAT_STREAM_IDLE_TIMEOUT_SECS") {
            config.stream.inactivity_timeout = parse_secs("CHAT_STREAM_IDLE_TIMEOUT_SECS", &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the endpoint base URL, without the `/v1/responses` suffix.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the model name.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the system prompt sent ahead of the history.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Enables the hosted web search tool.
    pub fn web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }

    /// Asks the provider to keep responses server-side. Off by default.
    pub fn store(mut self, store: bool) -> Self {
        self.store = store;
        self
    }

    /// Sets the reasoning effort hint.
    pub fn reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }

    /// Sets the HTTP connect timeout. Stream deadlines live in [`StreamConfig`].
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Replaces the per-stream timers and display options.
    pub fn stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    /// Rejects empty credentials or model names, non-http(s) URLs and zero timers.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.api_key.trim().is_empty() {
            return Err(ClientError::Config("api_key must not be empty".into()));
        }
        if self.model.trim().is_empty() {
            return Err(ClientError::Config("model must not be empty".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "base_url must be an http(s) URL: {}",
                self.base_url
            )));
        }
        self.stream.validate()?;
        Ok(())
    }

    pub(crate) fn responses_url(&self) -> String {
        format!("{}/v1/responses", self.base_url.trim_end_matches('/'))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration, ClientError> {
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ClientError::Config(format!("{key} must be whole seconds: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let err = ClientConfig::from_lookup(lookup(&[])).expect_err("should fail");
        assert!(matches!(err, ClientError::Config(msg) if msg.contains("OPENAI_API_KEY")));
    }

    #[test]
    fn env_overrides_are_applied() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("CHAT_STREAM_BASE_URL", "http://localhost:8080/"),
            ("CHAT_STREAM_MODEL", "gpt-4.1-mini"),
            ("CHAT_STREAM_WEB_SEARCH", "yes"),
            ("CHAT_STREAM_IDLE_TIMEOUT_SECS", "12"),
        ]))
        .expect("config");
        assert_eq!(config.model, "gpt-4.1-mini");
        assert!(config.web_search);
        assert_eq!(config.stream.inactivity_timeout, Duration::from_secs(12));
        assert_eq!(config.responses_url(), "http://localhost:8080/v1/responses");
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(
            ClientConfig::from_lookup(lookup(&[
                ("OPENAI_API_KEY", "k"),
                ("CHAT_STREAM_WEB_SEARCH", "sometimes"),
            ]))
            .is_err()
        );
        assert!(
            ClientConfig::from_lookup(lookup(&[
                ("OPENAI_API_KEY", "k"),
                ("CHAT_STREAM_TIMEOUT_SECS", "0"),
            ]))
            .is_err()
        );
        assert!(ClientConfig::new("k").base_url("ftp://x").validate().is_err());
    }
}
