// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # lbctl
//!
//! Operator tooling for a distributed append-only log broker: produce,
//! consume, discover partitions, benchmark and mirror topics.
//!
//! ## Features
//!
//! - **Poll-driven client**: requests are issued without blocking and their
//!   results collected by polling, over HTTP or against an in-process broker
//! - **Mirror engine**: resumable replication of every partition of a topic,
//!   restarting from the destination's watermarks with no checkpoint store
//! - **Fault policy**: one place deciding which broker faults are fatal
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lbctl::client::HttpBrokerClient;
//! use lbctl::config::Settings;
//! use lbctl::mirror::MirrorEngine;
//!
//! #[tokio::main]
//! async fn main() -> lbctl::Result<()> {
//!     let settings = Settings::default();
//!     let source = HttpBrokerClient::new("broker-a:11011", &settings.client)?;
//!     let destination = HttpBrokerClient::new("broker-b:11011", &settings.client)?;
//!
//!     // Runs until a fatal fault or the process is killed
//!     MirrorEngine::new("events", source, destination, settings.mirror)?
//!         .run()
//!         .await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         MirrorEngine                         │
//! │  discover → CursorTable → Scheduler → Batcher → AckTracker   │
//! └──────────────────────────────────────────────────────────────┘
//!                 │                               │
//!        ┌────────┴────────┐             ┌────────┴────────┐
//!        │ source client   │             │ dest client     │
//!        │ (BrokerClient)  │             │ (BrokerClient)  │
//!        └─────────────────┘             └─────────────────┘
//!                 │      FaultMonitor on every poll      │
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Broker fault classification and policy
pub mod fault;

/// Settings file and defaults
pub mod config;

/// Poll-driven broker clients
pub mod client;

/// Topic mirroring
pub mod mirror;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result, ResultExt};
pub use types::*;

// Re-export commonly used types
pub use client::{BrokerClient, HttpBrokerClient, MemoryBroker};
pub use fault::{Fault, FaultKind, FaultMonitor};
pub use mirror::MirrorEngine;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
