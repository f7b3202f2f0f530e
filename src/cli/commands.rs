//! CLI commands and argument parsing

use super::consume::StartFrom;
use super::time_range::TimeRange;
use crate::types::PartitionId;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Operator CLI for an append-only log broker
#[derive(Parser, Debug)]
#[command(name = "lbctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Broker endpoint: host, host:port or http(s) URL
    #[arg(short, long, global = true)]
    pub broker: Option<String>,

    /// Topic to produce to or consume from
    #[arg(short, long, global = true)]
    pub topic: Option<String>,

    /// Partition (0-65535)
    #[arg(short, long, global = true, default_value_t = 0)]
    pub partition: PartitionId,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Retry after network faults instead of aborting
    #[arg(short, long, global = true)]
    pub retry: bool,

    /// Settings file (YAML or JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Consume messages from the selected partition
    #[command(visible_alias = "get")]
    Consume(ConsumeArgs),

    /// Produce messages to the selected partition
    #[command(visible_aliases = ["set", "publish"])]
    Produce(ProduceArgs),

    /// List the partitions of the topic with their watermarks
    #[command(name = "discover-partitions", visible_alias = "discover_partitions")]
    DiscoverPartitions,

    /// Mirror every partition of the topic to another broker
    ///
    /// Partitions must already exist on the destination.
    Mirror(MirrorArgs),

    /// Measure produce latency
    #[command(visible_alias = "bm")]
    Benchmark {
        #[command(subcommand)]
        kind: BenchmarkKind,
    },
}

/// Message properties the consume command can display
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Field {
    /// Sequence number
    #[value(name = "seqnum")]
    SeqNum,
    /// Key
    Key,
    /// Content
    Content,
    /// Timestamp in milliseconds
    Ts,
}

/// Arguments of `consume`
#[derive(Args, Debug, Clone)]
pub struct ConsumeArgs {
    /// Comma-separated properties to display
    #[arg(short = 'F', long, value_delimiter = ',', default_value = "content")]
    pub fields: Vec<Field>,

    /// Print only the number of messages per response
    #[arg(short = 'S', long)]
    pub stats: bool,

    /// Only show messages in `from[,to]` (YYYYMMDDHH:MM:SS, local time)
    #[arg(short = 'T', long = "time-range")]
    pub time_range: Option<TimeRange>,

    /// "beginning", "end" or a sequence number
    pub from: StartFrom,
}

/// Arguments of `produce`
#[derive(Args, Debug, Clone)]
pub struct ProduceArgs {
    /// Messages per produce request
    #[arg(short = 's', long = "bundle", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub bundle: u32,

    /// Read one message per line from a file ("-" for stdin)
    #[arg(short = 'f', long, conflicts_with = "whole_file")]
    pub file: Option<PathBuf>,

    /// Publish the whole file as a single message
    #[arg(short = 'F', long = "whole-file")]
    pub whole_file: Option<PathBuf>,

    /// Sequence number of the first message
    #[arg(short = 'S', long = "base-seq")]
    pub base_seq: Option<u64>,

    /// Messages to publish when no file is given
    pub messages: Vec<String>,
}

/// Arguments of `mirror`
#[derive(Args, Debug, Clone)]
pub struct MirrorArgs {
    /// Destination broker endpoint
    pub destination: String,

    /// Cap on consume requests per second
    #[arg(long)]
    pub max_rps: Option<u32>,
}

/// Benchmark types
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchmarkKind {
    /// Produce while tailing the partition; time until the data comes back
    P2c(BenchmarkArgs),
    /// Produce; time until the broker acknowledges
    P2t(BenchmarkArgs),
}

/// Arguments shared by the benchmarks
#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkArgs {
    /// Messages to publish
    #[arg(short = 'c', long, default_value_t = 1)]
    pub count: usize,

    /// Content length of each message in bytes
    #[arg(short = 's', long, default_value_t = 128)]
    pub size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["lbctl", "-b", "src:1234", "mirror", "dst:1234", "-t", "events"]);
        assert_eq!(cli.broker.as_deref(), Some("src:1234"));
        assert_eq!(cli.topic.as_deref(), Some("events"));
        let Commands::Mirror(args) = cli.command else {
            panic!("expected mirror");
        };
        assert_eq!(args.destination, "dst:1234");
        assert_eq!(args.max_rps, None);
    }

    #[test]
    fn test_aliases() {
        let cli = Cli::parse_from(["lbctl", "-t", "x", "get", "end"]);
        assert!(matches!(cli.command, Commands::Consume(_)));
        let cli = Cli::parse_from(["lbctl", "-t", "x", "publish", "hello"]);
        assert!(matches!(cli.command, Commands::Produce(_)));
        let cli = Cli::parse_from(["lbctl", "-t", "x", "discover_partitions"]);
        assert!(matches!(cli.command, Commands::DiscoverPartitions));
        let cli = Cli::parse_from(["lbctl", "-t", "x", "bm", "p2t", "-c", "5"]);
        assert!(matches!(
            cli.command,
            Commands::Benchmark {
                kind: BenchmarkKind::P2t(BenchmarkArgs { count: 5, size: 128 })
            }
        ));
    }

    #[test]
    fn test_consume_fields() {
        let cli = Cli::parse_from(["lbctl", "consume", "-F", "seqnum,ts,content", "-S", "42"]);
        let Commands::Consume(args) = cli.command else {
            panic!("expected consume");
        };
        assert_eq!(args.fields, vec![Field::SeqNum, Field::Ts, Field::Content]);
        assert!(args.stats);
        assert_eq!(args.from, StartFrom::Seq(42));

        assert!(Cli::try_parse_from(["lbctl", "consume", "-F", "bogus", "0"]).is_err());
    }

    #[test]
    fn test_partition_range() {
        assert!(Cli::try_parse_from(["lbctl", "-p", "65535", "consume", "0"]).is_ok());
        assert!(Cli::try_parse_from(["lbctl", "-p", "65536", "consume", "0"]).is_err());
        assert!(Cli::try_parse_from(["lbctl", "-p", "-1", "consume", "0"]).is_err());
    }

    #[test]
    fn test_produce_bundle_must_be_positive() {
        assert!(Cli::try_parse_from(["lbctl", "produce", "-s", "0", "a"]).is_err());
        assert!(Cli::try_parse_from(["lbctl", "produce", "-f", "a", "-F", "b"]).is_err());
    }
}
