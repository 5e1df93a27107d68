//! Stream timers and status display options.

use std::time::Duration;

/// Timers and display options for one stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// Upper bound on the whole request, connect included.
    pub absolute_timeout: Duration,
    /// Maximum silence between two chunks. Reset on every chunk.
    pub inactivity_timeout: Duration,
    /// Show a "thinking" status as soon as the stream starts.
    pub show_thinking_status: bool,
    /// Fade the status node out instead of removing it abruptly.
    pub fade_status: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            absolute_timeout: Duration::from_secs(120),
            inactivity_timeout: Duration::from_secs(30),
            show_thinking_status: true,
            fade_status: true,
        }
    }
}

impl StreamConfig {
    /// Sets the total time allowed for one response.
    pub fn absolute_timeout(mut self, timeout: Duration) -> Self {
        self.absolute_timeout = timeout;
        self
    }

    /// Sets the allowed silence between chunks.
    pub fn inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// Disables or enables the initial "Thinking..." status.
    pub fn show_thinking_status(mut self, show: bool) -> Self {
        self.show_thinking_status = show;
        self
    }

    /// Whether the status node fades out when removed.
    pub fn fade_status(mut self, fade: bool) -> Self {
        self.fade_status = fade;
        self
    }

    /// Rejects zero-length timers.
    pub fn validate(&self) -> Result<(), crate::errors::StreamError> {
        if self.absolute_timeout.is_zero() {
            return Err(crate::errors::StreamError::Config(
                "absolute_timeout must be greater than 0".into(),
            ));
        }
        if self.inactivity_timeout.is_zero() {
            return Err(crate::errors::StreamError::Config(
                "inactivity_timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = StreamConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.inactivity_timeout < config.absolute_timeout);
    }

    #[test]
    fn zero_timers_are_rejected() {
        let config = StreamConfig::default().inactivity_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
