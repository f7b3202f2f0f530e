//! CLI module
//!
//! Command-line interface for operating a log broker.
//!
//! # Commands
//!
//! - `consume` - Follow a partition and print its messages
//! - `produce` - Publish messages to a partition
//! - `discover-partitions` - List a topic's partitions and watermarks
//! - `mirror` - Replicate a topic to another broker
//! - `benchmark` - Measure produce latency

mod benchmark;
mod commands;
mod consume;
mod discover;
mod produce;
mod runner;
mod time_range;

pub use benchmark::{benchmark, duration_repr, run_benchmark, size_repr, BenchmarkReport};
pub use commands::{
    BenchmarkArgs, BenchmarkKind, Cli, Commands, ConsumeArgs, Field, MirrorArgs, ProduceArgs,
};
pub use consume::{Consumer, StartFrom};
pub use discover::{discover_partitions, render};
pub use produce::{collect_messages, ProduceSummary, Producer};
pub use runner::Runner;
pub use time_range::{parse_timestamp, TimeRange};
