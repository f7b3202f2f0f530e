//! Broker client module
//!
//! A poll-driven request/response interface to a broker plus two
//! implementations.
//!
//! # Overview
//!
//! Requests are *issued* synchronously and return a [`RequestId`]; their
//! results surface later from [`BrokerClient::poll`], which drives
//! outstanding I/O for at most the given timeout and returns whatever
//! completed in that window as a [`Completions`] record.
//!
//! - `HttpBrokerClient` - talks to a broker's JSON/HTTP gateway
//! - `MemoryBroker` - an in-process broker with the same semantics

mod http;
mod memory;
mod wire;

pub use http::{parse_endpoint, HttpBrokerClient, DEFAULT_PORT};
pub use memory::{MemoryBroker, MemoryClient, RequestCounts};

use crate::error::Result;
use crate::fault::Fault;
use crate::types::{Message, PartitionId, RequestId, TopicPartition, Watermarks};
use async_trait::async_trait;
use std::time::Duration;

// ============================================================================
// Requests
// ============================================================================

/// One partition of a consume request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Where to read from
    pub topic_partition: TopicPartition,
    /// First sequence number wanted
    pub seq_num: u64,
    /// Size hint in bytes for this partition's response
    pub fetch_size: u32,
}

impl FetchRequest {
    /// Create a fetch for `topic/partition` starting at `seq_num`
    pub fn new(topic: impl Into<String>, partition: PartitionId, seq_num: u64, fetch_size: u32) -> Self {
        Self {
            topic_partition: TopicPartition::new(topic, partition),
            seq_num,
            fetch_size,
        }
    }
}

/// Messages to append to one partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceBatch {
    /// Where to append
    pub topic_partition: TopicPartition,
    /// Sequence number for the first message; `None` lets the broker assign
    pub base_seq_num: Option<u64>,
    /// Messages in order
    pub messages: Vec<Message>,
}

impl ProduceBatch {
    /// Create a batch with broker-assigned sequence numbers
    pub fn new(topic: impl Into<String>, partition: PartitionId, messages: Vec<Message>) -> Self {
        Self {
            topic_partition: TopicPartition::new(topic, partition),
            base_seq_num: None,
            messages,
        }
    }

    /// Pin the sequence number of the first message
    #[must_use]
    pub fn with_base_seq_num(mut self, base: u64) -> Self {
        self.base_seq_num = Some(base);
        self
    }
}

// ============================================================================
// Results
// ============================================================================

/// Where the next consume for a partition should start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextFetch {
    /// Next sequence number to request
    pub seq_num: u64,
    /// Minimum fetch size needed to make progress
    pub min_fetch_size: u32,
}

/// Result of a consume request for one partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedPartition {
    /// Request this result belongs to
    pub request_id: RequestId,
    /// Partition consumed
    pub topic_partition: TopicPartition,
    /// Messages in sequence order (may be empty)
    pub messages: Vec<Message>,
    /// Where to continue from
    pub next: NextFetch,
}

/// Acknowledgment that a partition's batch was durably appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceAck {
    /// Request this ack belongs to
    pub request_id: RequestId,
    /// Partition acknowledged
    pub topic_partition: TopicPartition,
}

/// Result of a partition discovery request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPartitions {
    /// Request this result belongs to
    pub request_id: RequestId,
    /// Topic discovered
    pub topic: String,
    /// Watermarks indexed by partition id
    pub watermarks: Vec<Watermarks>,
}

/// Everything that completed during one poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completions {
    /// Faults reported
    pub faults: Vec<Fault>,
    /// Consume results
    pub consumed: Vec<ConsumedPartition>,
    /// Produce acknowledgments
    pub produce_acks: Vec<ProduceAck>,
    /// Discovery results
    pub discovered: Vec<DiscoveredPartitions>,
}

impl Completions {
    /// Completions carrying a single fault
    pub fn fault(fault: Fault) -> Self {
        Self {
            faults: vec![fault],
            ..Self::default()
        }
    }

    /// Whether nothing completed
    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
            && self.consumed.is_empty()
            && self.produce_acks.is_empty()
            && self.discovered.is_empty()
    }

    /// Append another set of completions
    pub fn merge(&mut self, other: Completions) {
        self.faults.extend(other.faults);
        self.consumed.extend(other.consumed);
        self.produce_acks.extend(other.produce_acks);
        self.discovered.extend(other.discovered);
    }
}

// ============================================================================
// Client Trait
// ============================================================================

/// Poll-driven broker client
///
/// Issuing methods never block; they fail only when the request cannot be
/// scheduled at all. Results, including faults, arrive through [`poll`].
///
/// [`poll`]: BrokerClient::poll
#[async_trait]
pub trait BrokerClient: Send {
    /// Endpoint this client talks to, for diagnostics
    fn endpoint(&self) -> &str;

    /// Ask for the partitions of `topic` and their watermarks
    fn discover_partitions(&mut self, topic: &str) -> Result<RequestId>;

    /// Read from one or more partitions
    fn consume(
        &mut self,
        fetches: Vec<FetchRequest>,
        max_wait: Duration,
        min_size: u32,
    ) -> Result<RequestId>;

    /// Append batches to one or more partitions
    fn produce(&mut self, batches: Vec<ProduceBatch>) -> Result<RequestId>;

    /// Whether any request is outstanding
    fn should_poll(&self) -> bool;

    /// Drive outstanding I/O for at most `timeout` and return what completed
    async fn poll(&mut self, timeout: Duration) -> Result<Completions>;
}
