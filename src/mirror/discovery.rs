//! Partition discovery and the topology gate

use crate::client::BrokerClient;
use crate::error::{Error, Result};
use crate::fault::{FaultMonitor, Verdict};
use crate::types::{RequestId, Watermarks};
use std::time::Duration;
use tracing::{debug, info};

/// Partition layout of the mirrored topic on both brokers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Source watermarks, indexed by partition
    pub source: Vec<Watermarks>,
    /// Destination watermarks, indexed by partition
    pub destination: Vec<Watermarks>,
}

impl Topology {
    /// Check the layout can be mirrored
    ///
    /// The destination must have partitions and both sides the same number.
    pub fn validate(&self) -> Result<()> {
        if self.destination.is_empty() {
            return Err(Error::NoPartitions);
        }
        if self.source.len() != self.destination.len() {
            return Err(Error::PartitionMismatch {
                source_partitions: self.source.len(),
                destination_partitions: self.destination.len(),
            });
        }
        Ok(())
    }

    /// Number of partitions
    pub fn partition_count(&self) -> usize {
        self.destination.len()
    }
}

/// One outstanding discovery request
struct Pending {
    request_id: RequestId,
    result: Option<Vec<Watermarks>>,
}

impl Pending {
    fn issue<C: BrokerClient + ?Sized>(client: &mut C, topic: &str) -> Result<Self> {
        Ok(Self {
            request_id: client.discover_partitions(topic)?,
            result: None,
        })
    }

    /// Poll once; reissues after the backoff when the monitor allows a retry
    async fn step<C: BrokerClient + ?Sized>(
        &mut self,
        client: &mut C,
        topic: &str,
        poll_timeout: Duration,
        monitor: &FaultMonitor,
    ) -> Result<()> {
        let done = client.poll(poll_timeout).await?;
        if let Verdict::Retry { backoff, .. } = monitor.inspect(&done.faults)? {
            tokio::time::sleep(backoff).await;
            self.request_id = client.discover_partitions(topic)?;
            return Ok(());
        }

        if let Some(found) = done
            .discovered
            .into_iter()
            .find(|d| d.request_id == self.request_id)
        {
            debug!(endpoint = client.endpoint(), partitions = found.watermarks.len(), "discovered");
            self.result = Some(found.watermarks);
        } else if !client.should_poll() {
            return Err(Error::protocol(format!(
                "discovery request to {} completed without a result",
                client.endpoint()
            )));
        }
        Ok(())
    }
}

/// Discover the partitions of `topic` on one broker
pub async fn discover_watermarks<C>(
    client: &mut C,
    topic: &str,
    poll_timeout: Duration,
    monitor: &FaultMonitor,
) -> Result<Vec<Watermarks>>
where
    C: BrokerClient + ?Sized,
{
    let mut pending = Pending::issue(client, topic)?;
    loop {
        pending.step(client, topic, poll_timeout, monitor).await?;
        if let Some(watermarks) = pending.result.take() {
            return Ok(watermarks);
        }
    }
}

/// Discover `topic` on both brokers and check the layouts match
///
/// Both requests are issued before either is polled. Any fault the monitor
/// deems fatal aborts discovery.
pub async fn discover<S, D>(
    topic: &str,
    source: &mut S,
    destination: &mut D,
    poll_timeout: Duration,
    monitor: &FaultMonitor,
) -> Result<Topology>
where
    S: BrokerClient + ?Sized,
    D: BrokerClient + ?Sized,
{
    let mut src = Pending::issue(source, topic)?;
    let mut dst = Pending::issue(destination, topic)?;

    while src.result.is_none() || dst.result.is_none() {
        if src.result.is_none() {
            src.step(source, topic, poll_timeout, monitor).await?;
        }
        if dst.result.is_none() {
            dst.step(destination, topic, poll_timeout, monitor).await?;
        }
    }

    let topology = Topology {
        source: src.result.unwrap_or_default(),
        destination: dst.result.unwrap_or_default(),
    };
    topology.validate()?;
    info!(
        topic,
        partitions = topology.partition_count(),
        "{} partitions discovered",
        topology.partition_count()
    );
    Ok(topology)
}
