//! CLI runner - executes commands

use crate::cli::benchmark::benchmark;
use crate::cli::commands::{Cli, Commands, ConsumeArgs, MirrorArgs, ProduceArgs};
use crate::cli::consume::Consumer;
use crate::cli::discover::discover_partitions;
use crate::cli::produce::{collect_messages, Producer};
use crate::client::HttpBrokerClient;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::fault::FaultMonitor;
use crate::mirror::MirrorEngine;
use crate::types::{validate_topic, TopicPartition};
use std::time::Duration;
use tracing::{debug, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
    settings: Settings,
}

impl Runner {
    /// Create a runner, loading the settings file if one was given
    pub fn new(cli: Cli) -> Result<Self> {
        let settings = Settings::load_or_default(cli.config.as_deref())?;
        Ok(Self { cli, settings })
    }

    /// Effective settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Consume(args) => self.consume(args).await,
            Commands::Produce(args) => self.produce(args).await,
            Commands::DiscoverPartitions => self.discover().await,
            Commands::Mirror(args) => self.mirror(args).await,
            Commands::Benchmark { kind } => {
                let mut client = self.client()?;
                let tp = self.topic_partition()?;
                benchmark(&mut client, &tp, *kind, &self.monitor(), &mut std::io::stdout()).await?;
                Ok(())
            }
        }
    }

    /// Selected topic
    fn topic(&self) -> Result<&str> {
        let topic = self
            .cli
            .topic
            .as_deref()
            .ok_or_else(|| Error::config("Topic not specified (use -t flag)"))?;
        validate_topic(topic)?;
        Ok(topic)
    }

    /// Selected topic and partition
    fn topic_partition(&self) -> Result<TopicPartition> {
        Ok(TopicPartition::new(self.topic()?, self.cli.partition))
    }

    /// Client for the `-b` broker
    fn client(&self) -> Result<HttpBrokerClient> {
        let endpoint = self
            .cli
            .broker
            .as_deref()
            .ok_or_else(|| Error::config("Broker endpoint not specified (use -b flag)"))?;
        HttpBrokerClient::new(endpoint, &self.settings.client)
    }

    /// Fault policy for the operator subcommands
    fn monitor(&self) -> FaultMonitor {
        FaultMonitor::for_retry_mode(self.cli.retry, self.settings.client.retry_backoff())
    }

    async fn consume(&self, args: &ConsumeArgs) -> Result<()> {
        let tp = self.topic_partition()?;
        let mut client = self.client()?;
        debug!(topic_partition = %tp, from = ?args.from, "consuming");

        let mut consumer = Consumer::new(tp, args, self.settings.consume.clone(), self.monitor());
        consumer.run(&mut client, &mut std::io::stdout()).await
    }

    async fn produce(&self, args: &ProduceArgs) -> Result<()> {
        let tp = self.topic_partition()?;
        let messages = collect_messages(args)?;
        let mut client = self.client()?;

        let summary = Producer::new(tp, self.settings.produce.clone(), self.monitor())
            .with_bundle_size(args.bundle as usize)
            .with_base_seq(args.base_seq)
            .run(&mut client, messages)
            .await?;
        debug!(
            messages = summary.messages,
            requests = summary.requests,
            "produce complete"
        );
        Ok(())
    }

    async fn discover(&self) -> Result<()> {
        let topic = self.topic()?;
        let mut client = self.client()?;
        let poll_timeout = Duration::from_millis(self.settings.consume.poll_timeout_ms);

        discover_partitions(&mut client, topic, poll_timeout, &self.monitor(), &mut std::io::stdout())
            .await?;
        Ok(())
    }

    async fn mirror(&self, args: &MirrorArgs) -> Result<()> {
        let topic = self.topic()?;
        let source = self.client()?;
        let destination = HttpBrokerClient::new(&args.destination, &self.settings.client)?;

        let mut settings = self.settings.mirror.clone();
        if args.max_rps.is_some() {
            settings.max_consume_requests_per_second = args.max_rps;
        }
        if let Some(rps) = settings.max_consume_requests_per_second {
            info!("Consume requests limited to {rps}/s");
        }

        MirrorEngine::new(topic, source, destination, settings)?
            .run()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn runner(args: &[&str]) -> Result<Runner> {
        Runner::new(Cli::parse_from(args))
    }

    #[test]
    fn test_missing_topic() {
        let runner = runner(&["lbctl", "-b", "localhost", "discover-partitions"]).unwrap();
        let err = runner.topic().unwrap_err();
        assert!(err.to_string().contains("Topic not specified"));
    }

    #[test]
    fn test_topic_too_long() {
        let long = "t".repeat(256);
        let runner = runner(&["lbctl", "-t", long.as_str(), "discover-partitions"]).unwrap();
        assert!(matches!(runner.topic(), Err(Error::InvalidTopic { .. })));
    }

    #[test]
    fn test_missing_broker() {
        let runner = runner(&["lbctl", "-t", "events", "discover-partitions"]).unwrap();
        assert!(runner.client().unwrap_err().to_string().contains("Broker endpoint not specified"));
    }

    #[test]
    fn test_invalid_broker() {
        let runner = runner(&["lbctl", "-b", "ftp://x", "-t", "events", "discover-partitions"]).unwrap();
        assert!(matches!(runner.client(), Err(Error::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_settings_file_and_retry_mode() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "client:\n  retry_backoff_ms: 50").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let runner = runner(&["lbctl", "-r", "-C", path.as_str(), "discover-partitions"]).unwrap();
        assert_eq!(runner.settings().client.retry_backoff_ms, 50);
        assert_eq!(
            runner.monitor().policy(),
            crate::fault::FaultPolicy::RetryNetwork {
                backoff: Duration::from_millis(50)
            }
        );
    }

    #[test]
    fn test_bad_settings_file() {
        assert!(runner(&["lbctl", "-C", "/nonexistent.yaml", "discover-partitions"]).is_err());
    }
}
