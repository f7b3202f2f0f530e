//! Mirror engine module
//!
//! Continuous, resumable replication of every partition of a topic from a
//! source broker to a destination broker.
//!
//! # Overview
//!
//! The mirror module provides:
//! - `discover` - partition discovery on both brokers and the topology gate
//! - `CursorTable` - per-partition positions and the ready queue
//! - `ReplicationScheduler` - decides when to issue the next consume
//! - `ForwardingBatcher` - splits consumed messages into produce batches
//! - `AckTracker` - re-arms cursors after empty results and acknowledgments
//! - `MirrorEngine` - the loop tying them together
//!
//! Progress is never persisted: every start seeds cursors from the
//! destination's watermarks, so a restarted mirror resumes where the
//! destination left off. A batch produced but not yet acknowledged when the
//! process dies may be sent again.

mod ack;
mod batcher;
mod cursor;
mod discovery;
mod scheduler;
mod throttle;
mod types;

pub use ack::{AckTracker, Rearmed};
pub use batcher::ForwardingBatcher;
pub use cursor::{CursorTable, PartitionCursor};
pub use discovery::{discover, discover_watermarks, Topology};
pub use scheduler::{ReplicationScheduler, Scheduled, Side};
pub use throttle::ConsumeThrottle;
pub use types::MirrorStats;

use crate::client::{BrokerClient, ConsumedPartition};
use crate::config::MirrorSettings;
use crate::error::Result;
use crate::fault::FaultMonitor;
use crate::types::validate_topic;
use tracing::{debug, info};

/// Replicates one topic from `source` to `destination`
pub struct MirrorEngine<S, D> {
    topic: String,
    source: S,
    destination: D,
    settings: MirrorSettings,
    monitor: FaultMonitor,
    cursors: CursorTable,
    scheduler: ReplicationScheduler,
    batcher: ForwardingBatcher,
    acks: AckTracker,
    consumed: Vec<ConsumedPartition>,
    topology: Option<Topology>,
    stats: MirrorStats,
}

impl<S, D> MirrorEngine<S, D>
where
    S: BrokerClient,
    D: BrokerClient,
{
    /// Create an engine; nothing is sent until [`start`](Self::start)
    pub fn new(
        topic: impl Into<String>,
        source: S,
        destination: D,
        settings: MirrorSettings,
    ) -> Result<Self> {
        let topic = topic.into();
        validate_topic(&topic)?;

        Ok(Self {
            scheduler: ReplicationScheduler::new(topic.as_str(), &settings),
            batcher: ForwardingBatcher::from_settings(&settings),
            topic,
            source,
            destination,
            settings,
            monitor: FaultMonitor::abort_on_any(),
            cursors: CursorTable::default(),
            acks: AckTracker::new(),
            consumed: Vec::new(),
            topology: None,
            stats: MirrorStats::new(),
        })
    }

    /// Replace the scheduler's throttle
    #[must_use]
    pub fn with_throttle(mut self, throttle: ConsumeThrottle) -> Self {
        self.scheduler = self.scheduler.with_throttle(throttle);
        self
    }

    /// Topic being mirrored
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Source client
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Destination client
    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Cursor table
    pub fn cursors(&self) -> &CursorTable {
        &self.cursors
    }

    /// Scheduler state
    pub fn scheduler(&self) -> &ReplicationScheduler {
        &self.scheduler
    }

    /// Topology found by [`start`](Self::start)
    pub fn topology(&self) -> Option<&Topology> {
        self.topology.as_ref()
    }

    /// Counters so far
    pub fn stats(&self) -> &MirrorStats {
        &self.stats
    }

    /// Run discovery and seed the cursors from the destination
    pub async fn start(&mut self) -> Result<()> {
        let topology = discover(
            &self.topic,
            &mut self.source,
            &mut self.destination,
            self.settings.poll_timeout(),
            &self.monitor,
        )
        .await?;

        self.cursors = CursorTable::from_watermarks(&topology.destination);
        info!(
            "Mirroring '{}' from {} to {}, {} partitions",
            self.topic,
            self.source.endpoint(),
            self.destination.endpoint(),
            topology.partition_count()
        );
        self.topology = Some(topology);
        Ok(())
    }

    /// One loop iteration: maybe schedule, then poll whichever side is busy
    pub async fn tick(&mut self) -> Result<()> {
        let poll_timeout = self.settings.poll_timeout();

        match self.scheduler.schedule(&mut self.cursors, &mut self.source)? {
            Scheduled::Issued(_) => self.stats.add_consume(),
            Scheduled::Throttled => {
                self.stats.add_throttled();
                tokio::time::sleep(poll_timeout).await;
                return Ok(());
            }
            Scheduled::NotReady => {}
        }

        if !self.scheduler.source().is_idle() {
            let done = self.source.poll(poll_timeout).await?;
            self.monitor.inspect(&done.faults)?;
            self.consumed.extend(done.consumed);
            if !self.source.should_poll() {
                self.consume_completed()?;
            }
        }

        if !self.scheduler.destination().is_idle() {
            let done = self.destination.poll(poll_timeout).await?;
            self.monitor.inspect(&done.faults)?;
            self.acks.on_produce_acks(&mut self.cursors, &done.produce_acks);
            if !self.destination.should_poll() {
                self.scheduler.produce_completed();
                self.acks.finish_produce()?;
            }
        }
        Ok(())
    }

    /// Start if needed, then tick until a fatal error
    pub async fn run(&mut self) -> Result<()> {
        if self.topology.is_none() {
            self.start().await?;
        }
        loop {
            self.tick().await?;
        }
    }

    fn consume_completed(&mut self) -> Result<()> {
        let requested = self.scheduler.consume_completed();
        let consumed = std::mem::take(&mut self.consumed);
        self.acks.on_consumed(&mut self.cursors, &requested, &consumed)?;

        let batches = self.batcher.forward(consumed);
        if batches.is_empty() {
            self.stats.add_empty_cycle();
            return Ok(());
        }

        let overhead = self.settings.message_overhead;
        let (messages, bytes) = batches
            .iter()
            .flat_map(|b| &b.messages)
            .fold((0, 0), |(n, size), m| (n + 1, size + m.estimated_size(overhead)));
        let request_id = self.destination.produce(batches)?;
        self.scheduler.produce_issued(request_id);
        self.stats.add_produce(messages, bytes);
        debug!(request_id, messages, bytes, stats = ?self.stats, "forwarded");
        Ok(())
    }
}

impl<S, D> std::fmt::Debug for MirrorEngine<S, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorEngine")
            .field("topic", &self.topic)
            .field("cursors", &self.cursors)
            .field("scheduler", &self.scheduler)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
