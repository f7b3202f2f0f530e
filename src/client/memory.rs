//! In-process broker
//!
//! [`MemoryBroker`] stores topics in memory and hands out [`MemoryClient`]
//! handles implementing [`BrokerClient`]. Requests queue up when issued and
//! are answered on the next poll, so callers observe the same
//! issue/poll/complete cycle as with a networked broker.

use super::{
    BrokerClient, Completions, ConsumedPartition, DiscoveredPartitions, FetchRequest, NextFetch,
    ProduceAck, ProduceBatch,
};
use crate::error::Result;
use crate::fault::{Fault, FaultKind};
use crate::types::{Message, PartitionId, RequestId, Watermarks, SEQ_END};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::trace;

/// Number of requests issued against a broker, by type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestCounts {
    /// Discovery requests
    pub discover: usize,
    /// Consume requests
    pub consume: usize,
    /// Produce requests
    pub produce: usize,
}

#[derive(Debug, Default)]
struct PartitionLog {
    first_available: u64,
    messages: Vec<Message>,
}

impl PartitionLog {
    fn watermarks(&self) -> Watermarks {
        Watermarks {
            first_available: self.first_available,
            high_watermark: self.messages.last().map(|m| m.seq_num),
        }
    }

    fn next_seq(&self) -> u64 {
        self.watermarks().next_seq()
    }

    fn append(&mut self, base: Option<u64>, messages: impl IntoIterator<Item = Message>) {
        let mut seq = base.unwrap_or_else(|| self.next_seq());
        for mut msg in messages {
            msg.seq_num = seq;
            self.messages.push(msg);
            seq += 1;
        }
    }
}

#[derive(Debug, Default)]
struct BrokerState {
    topics: HashMap<String, Vec<PartitionLog>>,
    injected: VecDeque<FaultKind>,
    counts: RequestCounts,
}

/// An in-memory broker shared by any number of client handles
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create (or replace) a topic with `partitions` empty partitions
    pub fn create_topic(&self, topic: &str, partitions: usize) {
        let logs = (0..partitions).map(|_| PartitionLog::default()).collect();
        self.lock().topics.insert(topic.to_string(), logs);
    }

    /// Append messages to a partition, assigning consecutive sequence numbers
    ///
    /// Returns the high watermark afterwards. Panics if the partition does not exist.
    pub fn append(
        &self,
        topic: &str,
        partition: PartitionId,
        messages: impl IntoIterator<Item = Message>,
    ) -> Option<u64> {
        let mut state = self.lock();
        let log = state
            .topics
            .get_mut(topic)
            .and_then(|logs| logs.get_mut(usize::from(partition)))
            .unwrap_or_else(|| panic!("no such partition {topic}/{partition}"));
        log.append(None, messages);
        log.watermarks().high_watermark
    }

    /// Append messages starting at `base`, leaving a gap as compaction would
    ///
    /// Panics if the partition does not exist or `base` is below its next
    /// sequence number.
    pub fn append_at(
        &self,
        topic: &str,
        partition: PartitionId,
        base: u64,
        messages: impl IntoIterator<Item = Message>,
    ) -> Option<u64> {
        let mut state = self.lock();
        let log = state
            .topics
            .get_mut(topic)
            .and_then(|logs| logs.get_mut(usize::from(partition)))
            .unwrap_or_else(|| panic!("no such partition {topic}/{partition}"));
        assert!(base >= log.next_seq(), "base {base} is behind the log");
        log.append(Some(base), messages);
        log.watermarks().high_watermark
    }

    /// Drop every message below `seq_num`, as retention would
    pub fn truncate_before(&self, topic: &str, partition: PartitionId, seq_num: u64) {
        let mut state = self.lock();
        if let Some(log) = state
            .topics
            .get_mut(topic)
            .and_then(|logs| logs.get_mut(usize::from(partition)))
        {
            log.messages.retain(|m| m.seq_num >= seq_num);
            log.first_available = log.first_available.max(seq_num);
        }
    }

    /// Copy of every message stored in a partition
    pub fn messages(&self, topic: &str, partition: PartitionId) -> Vec<Message> {
        self.lock()
            .topics
            .get(topic)
            .and_then(|logs| logs.get(usize::from(partition)))
            .map(|log| log.messages.clone())
            .unwrap_or_default()
    }

    /// Watermarks of every partition of a topic
    pub fn watermarks(&self, topic: &str) -> Option<Vec<Watermarks>> {
        self.lock()
            .topics
            .get(topic)
            .map(|logs| logs.iter().map(PartitionLog::watermarks).collect())
    }

    /// Make the next processed request fail with `kind`
    pub fn inject_fault(&self, kind: FaultKind) {
        self.lock().injected.push_back(kind);
    }

    /// Requests issued so far
    pub fn request_counts(&self) -> RequestCounts {
        self.lock().counts
    }

    /// A new client handle
    pub fn client(&self, endpoint: impl Into<String>) -> MemoryClient {
        MemoryClient {
            broker: self.clone(),
            endpoint: endpoint.into(),
            next_request_id: 1,
            queue: VecDeque::new(),
        }
    }
}

#[derive(Debug)]
enum PendingOp {
    Discover(String),
    Consume(Vec<FetchRequest>),
    Produce(Vec<ProduceBatch>),
}

/// Client handle onto a [`MemoryBroker`]
#[derive(Debug)]
pub struct MemoryClient {
    broker: MemoryBroker,
    endpoint: String,
    next_request_id: RequestId,
    queue: VecDeque<(RequestId, PendingOp)>,
}

impl MemoryClient {
    /// The broker behind this handle
    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }

    /// Number of requests waiting to be answered
    pub fn outstanding(&self) -> usize {
        self.queue.len()
    }

    fn enqueue(&mut self, op: PendingOp) -> RequestId {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        {
            let mut state = self.broker.lock();
            match op {
                PendingOp::Discover(_) => state.counts.discover += 1,
                PendingOp::Consume(_) => state.counts.consume += 1,
                PendingOp::Produce(_) => state.counts.produce += 1,
            }
        }
        self.queue.push_back((id, op));
        id
    }
}

#[async_trait]
impl BrokerClient for MemoryClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn discover_partitions(&mut self, topic: &str) -> Result<RequestId> {
        Ok(self.enqueue(PendingOp::Discover(topic.to_string())))
    }

    fn consume(
        &mut self,
        fetches: Vec<FetchRequest>,
        _max_wait: Duration,
        _min_size: u32,
    ) -> Result<RequestId> {
        Ok(self.enqueue(PendingOp::Consume(fetches)))
    }

    fn produce(&mut self, batches: Vec<ProduceBatch>) -> Result<RequestId> {
        Ok(self.enqueue(PendingOp::Produce(batches)))
    }

    fn should_poll(&self) -> bool {
        !self.queue.is_empty()
    }

    async fn poll(&mut self, _timeout: Duration) -> Result<Completions> {
        let mut completions = Completions::default();
        let mut state = self.broker.lock();

        while let Some((request_id, op)) = self.queue.pop_front() {
            trace!(request_id, ?op, "memory broker answering");
            if let Some(kind) = state.injected.pop_front() {
                completions.faults.push(Fault::new(request_id, kind));
                continue;
            }
            let done = match op {
                PendingOp::Discover(topic) => state.discover(request_id, topic),
                PendingOp::Consume(fetches) => state.consume(request_id, fetches),
                PendingOp::Produce(batches) => state.produce(request_id, batches),
            };
            completions.merge(done);
        }
        Ok(completions)
    }
}

impl BrokerState {
    fn log_mut(
        &mut self,
        request_id: RequestId,
        topic: &str,
        partition: PartitionId,
    ) -> std::result::Result<&mut PartitionLog, Fault> {
        let logs = self
            .topics
            .get_mut(topic)
            .ok_or_else(|| Fault::new(request_id, FaultKind::UnknownTopic).with_topic(topic))?;
        logs.get_mut(usize::from(partition)).ok_or_else(|| {
            Fault::new(request_id, FaultKind::UnknownPartition)
                .with_topic(topic)
                .with_partition(partition)
        })
    }

    fn discover(&mut self, request_id: RequestId, topic: String) -> Completions {
        match self.topics.get(&topic) {
            Some(logs) => Completions {
                discovered: vec![DiscoveredPartitions {
                    request_id,
                    watermarks: logs.iter().map(PartitionLog::watermarks).collect(),
                    topic,
                }],
                ..Completions::default()
            },
            None => Completions::fault(
                Fault::new(request_id, FaultKind::UnknownTopic).with_topic(topic),
            ),
        }
    }

    fn consume(&mut self, request_id: RequestId, fetches: Vec<FetchRequest>) -> Completions {
        let mut completions = Completions::default();

        for fetch in fetches {
            let tp = fetch.topic_partition;
            let log = match self.log_mut(request_id, &tp.topic, tp.partition) {
                Ok(log) => log,
                Err(fault) => {
                    completions.faults.push(fault);
                    continue;
                }
            };

            let next_seq = log.next_seq();
            let from = if fetch.seq_num == SEQ_END {
                next_seq
            } else {
                fetch.seq_num.max(log.first_available)
            };
            if from > next_seq {
                let wm = log.watermarks();
                completions.faults.push(
                    Fault::boundary_check(request_id, wm.first_available, wm.high_watermark.unwrap_or_default())
                        .with_topic(tp.topic)
                        .with_partition(tp.partition),
                );
                continue;
            }

            let start = log.messages.partition_point(|m| m.seq_num < from);
            let budget = fetch.fetch_size as usize;
            let mut used = 0usize;
            let mut messages = Vec::new();
            for msg in &log.messages[start..] {
                let size = msg.estimated_size(0);
                if !messages.is_empty() && used + size > budget {
                    break;
                }
                used += size;
                messages.push(msg.clone());
            }

            let next = messages.last().map_or(from, |m| m.seq_num + 1);
            completions.consumed.push(ConsumedPartition {
                request_id,
                topic_partition: tp,
                messages,
                next: NextFetch {
                    seq_num: next,
                    min_fetch_size: fetch.fetch_size,
                },
            });
        }
        completions
    }

    fn produce(&mut self, request_id: RequestId, batches: Vec<ProduceBatch>) -> Completions {
        let mut completions = Completions::default();

        for batch in batches {
            let tp = batch.topic_partition;
            let log = match self.log_mut(request_id, &tp.topic, tp.partition) {
                Ok(log) => log,
                Err(fault) => {
                    completions.faults.push(fault);
                    continue;
                }
            };

            if batch.base_seq_num.is_some_and(|base| base < log.next_seq()) {
                completions.faults.push(
                    Fault::new(request_id, FaultKind::InvalidReq)
                        .with_topic(tp.topic)
                        .with_partition(tp.partition),
                );
                continue;
            }

            log.append(batch.base_seq_num, batch.messages);
            completions.produce_acks.push(ProduceAck {
                request_id,
                topic_partition: tp,
            });
        }
        completions
    }
}
