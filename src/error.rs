//! Error types for lbctl
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use crate::fault::{Fault, FaultKind};
use thiserror::Error;

/// The main error type for lbctl
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration / Usage Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid broker endpoint '{endpoint}'")]
    InvalidEndpoint { endpoint: String },

    #[error("Invalid topic name '{topic}'")]
    InvalidTopic { topic: String },

    #[error("Failed to parse {input}")]
    InvalidTimestamp { input: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Broker Errors
    // ============================================================================
    /// A fault reported by (or on the way to) a broker. Displays the
    /// operator-facing diagnostic line.
    #[error("{0}")]
    Fault(Fault),

    #[error("Unable to schedule {request} request to {target}")]
    Schedule { request: String, target: String },

    #[error("Broker protocol error: {message}")]
    Protocol { message: String },

    // ============================================================================
    // Topology Errors
    // ============================================================================
    #[error("No partitions discovered - nothing to mirror")]
    NoPartitions,

    #[error(
        "Partitions mismatch, {source_partitions} partitions discovered in source, {destination_partitions} in destination"
    )]
    PartitionMismatch {
        source_partitions: usize,
        destination_partitions: usize,
    },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open({path}): {message}")]
    Open { path: String, message: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid endpoint error
    pub fn invalid_endpoint(endpoint: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
        }
    }

    /// Create a scheduling error
    pub fn schedule(request: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Schedule {
            request: request.into(),
            target: target.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// The fault kind, if this error carries a broker fault
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Error::Fault(fault) => Some(fault.kind),
            _ => None,
        }
    }

    /// Check if this error is retryable
    ///
    /// Only network-level failures qualify; everything the broker reports
    /// explicitly is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Fault(fault) => fault.kind == FaultKind::Network,
            Error::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        Error::Fault(fault)
    }
}

/// Result type alias for lbctl
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
