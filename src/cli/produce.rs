//! `produce`: publish messages in bundles and wait for acknowledgments

use super::commands::ProduceArgs;
use crate::client::{BrokerClient, ProduceBatch};
use crate::config::ProduceSettings;
use crate::error::{Error, Result, ResultExt};
use crate::fault::{FaultMonitor, Verdict};
use crate::types::{Message, RequestId, TopicPartition};
use bytes::Bytes;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Gather the messages to publish from the arguments, a file or stdin
pub fn collect_messages(args: &ProduceArgs) -> Result<Vec<Message>> {
    if let Some(path) = &args.whole_file {
        let mut content = Vec::new();
        open_input(path)?
            .read_to_end(&mut content)
            .context("Failed to read data")?;
        info!("Publishing message of size {}", content.len());
        return Ok(vec![Message::new(content)]);
    }

    if let Some(path) = &args.file {
        let reader = BufReader::new(open_input(path)?);
        let mut messages = Vec::new();
        for line in reader.split(b'\n') {
            messages.push(Message::new(line.context("Failed to read data")?));
        }
        return Ok(messages);
    }

    if args.messages.is_empty() {
        return Err(Error::config(
            "No messages specified, and no input file was specified with -f",
        ));
    }
    Ok(args
        .messages
        .iter()
        .map(|m| Message::new(Bytes::from(m.clone())))
        .collect())
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(std::io::stdin()));
    }
    let file = File::open(path).map_err(|e| Error::Open {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(Box::new(file))
}

/// Totals of a finished produce run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProduceSummary {
    /// Messages acknowledged
    pub messages: usize,
    /// Produce requests issued, resends included
    pub requests: usize,
}

/// Publishes bundles to one partition, keeping unacknowledged ones for resend
#[derive(Debug)]
pub struct Producer {
    topic_partition: TopicPartition,
    bundle_size: usize,
    base_seq: Option<u64>,
    settings: ProduceSettings,
    monitor: FaultMonitor,
    unacked: HashMap<RequestId, ProduceBatch>,
    since_wait: usize,
    summary: ProduceSummary,
}

impl Producer {
    /// Create a producer for `topic_partition`
    pub fn new(topic_partition: TopicPartition, settings: ProduceSettings, monitor: FaultMonitor) -> Self {
        Self {
            topic_partition,
            bundle_size: 1,
            base_seq: None,
            settings,
            monitor,
            unacked: HashMap::new(),
            since_wait: 0,
            summary: ProduceSummary::default(),
        }
    }

    /// Messages per produce request
    #[must_use]
    pub fn with_bundle_size(mut self, bundle_size: usize) -> Self {
        self.bundle_size = bundle_size.max(1);
        self
    }

    /// Pin the sequence number of the first bundle
    #[must_use]
    pub fn with_base_seq(mut self, base_seq: Option<u64>) -> Self {
        self.base_seq = base_seq;
        self
    }

    /// Publish every message and wait until all are acknowledged
    pub async fn run<C>(&mut self, client: &mut C, messages: Vec<Message>) -> Result<ProduceSummary>
    where
        C: BrokerClient + ?Sized,
    {
        let mut messages = messages.into_iter().peekable();
        while messages.peek().is_some() {
            let bundle: Vec<Message> = messages.by_ref().take(self.bundle_size).collect();
            self.publish(client, bundle).await?;
        }
        self.wait_for_acks(client).await?;
        Ok(self.summary)
    }

    async fn publish<C>(&mut self, client: &mut C, bundle: Vec<Message>) -> Result<()>
    where
        C: BrokerClient + ?Sized,
    {
        debug!("Publishing {} messages", bundle.len());
        let mut batch = ProduceBatch::new(
            self.topic_partition.topic.as_str(),
            self.topic_partition.partition,
            bundle,
        );
        if let Some(base) = self.base_seq.take() {
            batch = batch.with_base_seq_num(base);
        }

        self.since_wait += batch.messages.len();
        self.send(client, batch)?;

        if self.since_wait >= self.settings.ack_window {
            self.wait_for_acks(client).await?;
            self.since_wait = 0;
        }
        Ok(())
    }

    fn send<C>(&mut self, client: &mut C, batch: ProduceBatch) -> Result<()>
    where
        C: BrokerClient + ?Sized,
    {
        let request_id = client
            .produce(vec![batch.clone()])
            .context("Failed to schedule messages to broker")?;
        self.unacked.insert(request_id, batch);
        self.summary.requests += 1;
        Ok(())
    }

    /// Poll until nothing is outstanding, resending after retryable faults
    async fn wait_for_acks<C>(&mut self, client: &mut C) -> Result<()>
    where
        C: BrokerClient + ?Sized,
    {
        let poll_timeout = Duration::from_millis(self.settings.poll_timeout_ms);
        while client.should_poll() {
            let done = client.poll(poll_timeout).await?;
            for ack in &done.produce_acks {
                if let Some(batch) = self.unacked.remove(&ack.request_id) {
                    self.summary.messages += batch.messages.len();
                }
            }

            if let Verdict::Retry { backoff, request_ids } = self.monitor.inspect(&done.faults)? {
                tokio::time::sleep(backoff).await;
                for request_id in request_ids {
                    if let Some(batch) = self.unacked.remove(&request_id) {
                        debug!(request_id, "resending bundle");
                        self.send(client, batch)?;
                    }
                }
            }
        }

        if self.unacked.is_empty() {
            Ok(())
        } else {
            Err(Error::protocol(format!(
                "{} produce request(s) completed without acknowledgment",
                self.unacked.len()
            )))
        }
    }
}
