//! Runtime settings
//!
//! Built-in defaults, optionally overridden by a YAML or JSON settings file
//! passed with `-C`. Every section and field may be omitted.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-Level Settings
// ============================================================================

/// Complete settings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Broker client settings
    pub client: ClientSettings,
    /// Mirror engine settings
    pub mirror: MirrorSettings,
    /// Consume subcommand settings
    pub consume: ConsumeSettings,
    /// Produce subcommand settings
    pub produce: ProduceSettings,
}

impl Settings {
    /// Load settings from a file; `.json` files are parsed as JSON,
    /// everything else as YAML
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Open {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let settings: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents)?
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Load from an optional path, falling back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Reject values the engine cannot work with
    ///
    /// Timeouts must be non-zero; long-poll max waits may be zero.
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("client.request_timeout_ms", self.client.request_timeout_ms),
            ("client.connect_timeout_ms", self.client.connect_timeout_ms),
            ("mirror.poll_timeout_ms", self.mirror.poll_timeout_ms),
            ("consume.poll_timeout_ms", self.consume.poll_timeout_ms),
            ("produce.poll_timeout_ms", self.produce.poll_timeout_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, ms)| *ms == 0) {
            return Err(Error::config(format!("{name} must be at least 1")));
        }
        if self.mirror.max_batch_messages == 0 {
            return Err(Error::config("mirror.max_batch_messages must be at least 1"));
        }
        if self.mirror.max_batch_bytes == 0 {
            return Err(Error::config("mirror.max_batch_bytes must be at least 1"));
        }
        if self.mirror.fetch_size_hint == 0 {
            return Err(Error::config("mirror.fetch_size_hint must be at least 1"));
        }
        if self.mirror.max_consume_requests_per_second == Some(0) {
            return Err(Error::config(
                "mirror.max_consume_requests_per_second must be at least 1",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Client
// ============================================================================

/// Broker client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Overall timeout for one HTTP exchange
    pub request_timeout_ms: u64,
    /// TCP connect timeout
    pub connect_timeout_ms: u64,
    /// User agent sent to the broker gateway
    pub user_agent: String,
    /// Backoff before reissuing a request after a network fault (retry mode)
    pub retry_backoff_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
            user_agent: format!("lbctl/{}", env!("CARGO_PKG_VERSION")),
            retry_backoff_ms: 400,
        }
    }
}

impl ClientSettings {
    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Connect timeout as a duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Retry backoff as a duration
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// ============================================================================
// Mirror
// ============================================================================

/// Mirror engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorSettings {
    /// How long the source may hold a consume request open
    pub consume_max_wait_ms: u64,
    /// Per-partition fetch size hint sent with every consume
    pub fetch_size_hint: u32,
    /// Timeout of each handle's poll per loop tick
    pub poll_timeout_ms: u64,
    /// Message cap per forwarded batch
    pub max_batch_messages: usize,
    /// Estimated byte cap per forwarded batch
    pub max_batch_bytes: usize,
    /// Fixed per-message overhead added to the size estimate
    pub message_overhead: usize,
    /// Optional cap on consume requests per second
    pub max_consume_requests_per_second: Option<u32>,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            consume_max_wait_ms: 4_000,
            fetch_size_hint: 4 * 1024 * 1024,
            poll_timeout_ms: 100,
            max_batch_messages: 256,
            max_batch_bytes: 4 * 1024 * 1024,
            message_overhead: 32,
            max_consume_requests_per_second: None,
        }
    }
}

impl MirrorSettings {
    /// Consume max wait as a duration
    pub fn consume_max_wait(&self) -> Duration {
        Duration::from_millis(self.consume_max_wait_ms)
    }

    /// Poll timeout as a duration
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

// ============================================================================
// Consume / Produce
// ============================================================================

/// Consume subcommand settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumeSettings {
    /// Lower bound for the fetch size hint
    pub min_fetch_size: u32,
    /// How long the broker may hold a consume request open
    pub max_wait_ms: u64,
    /// Poll timeout
    pub poll_timeout_ms: u64,
}

impl Default for ConsumeSettings {
    fn default() -> Self {
        Self {
            min_fetch_size: 128 * 1024 * 1024,
            max_wait_ms: 8_000,
            poll_timeout_ms: 1_000,
        }
    }
}

/// Produce subcommand settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProduceSettings {
    /// Poll timeout while waiting for acks
    pub poll_timeout_ms: u64,
    /// Number of unacknowledged messages after which the producer waits for acks
    pub ack_window: usize,
}

impl Default for ProduceSettings {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 800,
            ack_window: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use test_case::test_case;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.mirror.max_batch_messages, 256);
        assert_eq!(settings.mirror.max_batch_bytes, 4 * 1024 * 1024);
        assert_eq!(settings.mirror.message_overhead, 32);
        assert_eq!(settings.mirror.consume_max_wait(), Duration::from_secs(4));
        assert_eq!(settings.client.retry_backoff(), Duration::from_millis(400));
        assert_eq!(settings.consume.min_fetch_size, 128 * 1024 * 1024);
        assert!(settings.mirror.max_consume_requests_per_second.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "mirror:\n  max_batch_messages: 64\n  max_consume_requests_per_second: 5\nclient:\n  retry_backoff_ms: 250"
        )
        .unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.mirror.max_batch_messages, 64);
        assert_eq!(settings.mirror.max_consume_requests_per_second, Some(5));
        assert_eq!(settings.client.retry_backoff_ms, 250);
        // untouched fields keep defaults
        assert_eq!(settings.mirror.fetch_size_hint, 4 * 1024 * 1024);
        assert_eq!(settings.consume, ConsumeSettings::default());
    }

    #[test]
    fn test_load_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"produce": {{"ack_window": 5}}}}"#).unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.produce.ack_window, 5);
        assert_eq!(settings.produce.poll_timeout_ms, 800);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "mirror:\n  max_batch_messages: 0").unwrap();
        assert!(Settings::load(file.path()).is_err());
    }

    #[test_case("client:\n  request_timeout_ms: 0", "client.request_timeout_ms" ; "request timeout")]
    #[test_case("client:\n  connect_timeout_ms: 0", "client.connect_timeout_ms" ; "connect timeout")]
    #[test_case("mirror:\n  poll_timeout_ms: 0", "mirror.poll_timeout_ms" ; "mirror poll")]
    #[test_case("consume:\n  poll_timeout_ms: 0", "consume.poll_timeout_ms" ; "consume poll")]
    #[test_case("produce:\n  poll_timeout_ms: 0", "produce.poll_timeout_ms" ; "produce poll")]
    fn test_zero_timeout_rejected(yaml: &str, field: &str) {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "{yaml}").unwrap();
        let err = Settings::load(file.path()).unwrap_err();
        assert_eq!(err.to_string(), format!("Configuration error: {field} must be at least 1"));
    }

    #[test]
    fn test_zero_max_wait_allowed() {
        let mut settings = Settings::default();
        settings.mirror.consume_max_wait_ms = 0;
        settings.consume.max_wait_ms = 0;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        let err = Settings::load("/nonexistent/lbctl.yaml").unwrap_err();
        assert!(err.to_string().starts_with("Failed to open(/nonexistent/lbctl.yaml)"));
    }

    #[test]
    fn test_load_or_default() {
        assert_eq!(Settings::load_or_default(None).unwrap(), Settings::default());
    }
}
