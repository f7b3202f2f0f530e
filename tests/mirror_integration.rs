//! Mirror integration tests against in-process brokers
//!
//! Both client handles are wrapped so every request they issue is recorded,
//! letting the tests check the request/forward/ack cycle from outside.

use async_trait::async_trait;
use lbctl::client::{
    BrokerClient, Completions, FetchRequest, MemoryBroker, MemoryClient, ProduceBatch,
};
use lbctl::config::MirrorSettings;
use lbctl::mirror::MirrorEngine;
use lbctl::{Error, FaultKind, Message, PartitionId, RequestId, Result};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Recording client
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Source,
    Destination,
}

#[derive(Debug, Default)]
struct Ledger {
    source_busy: bool,
    destination_busy: bool,
    overlaps: usize,
    consumes: Vec<Vec<(PartitionId, u64)>>,
    produces: Vec<Vec<(PartitionId, Option<u64>, usize)>>,
}

struct Recording {
    inner: MemoryClient,
    role: Role,
    ledger: Arc<Mutex<Ledger>>,
}

impl Recording {
    fn issue(&self) {
        let mut ledger = self.ledger.lock().unwrap();
        match self.role {
            Role::Source => ledger.source_busy = true,
            Role::Destination => ledger.destination_busy = true,
        }
        if ledger.source_busy && ledger.destination_busy {
            ledger.overlaps += 1;
        }
    }
}

#[async_trait]
impl BrokerClient for Recording {
    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }

    fn discover_partitions(&mut self, topic: &str) -> Result<RequestId> {
        self.inner.discover_partitions(topic)
    }

    fn consume(
        &mut self,
        fetches: Vec<FetchRequest>,
        max_wait: Duration,
        min_size: u32,
    ) -> Result<RequestId> {
        self.issue();
        self.ledger.lock().unwrap().consumes.push(
            fetches
                .iter()
                .map(|f| (f.topic_partition.partition, f.seq_num))
                .collect(),
        );
        self.inner.consume(fetches, max_wait, min_size)
    }

    fn produce(&mut self, batches: Vec<ProduceBatch>) -> Result<RequestId> {
        self.issue();
        self.ledger.lock().unwrap().produces.push(
            batches
                .iter()
                .map(|b| (b.topic_partition.partition, b.base_seq_num, b.messages.len()))
                .collect(),
        );
        self.inner.produce(batches)
    }

    fn should_poll(&self) -> bool {
        self.inner.should_poll()
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Completions> {
        let done = self.inner.poll(timeout).await;
        let busy = self.inner.should_poll();
        let mut ledger = self.ledger.lock().unwrap();
        match self.role {
            Role::Source => ledger.source_busy = busy,
            Role::Destination => ledger.destination_busy = busy,
        }
        done
    }
}

// ============================================================================
// Helpers
// ============================================================================

struct Harness {
    src: MemoryBroker,
    dst: MemoryBroker,
    ledger: Arc<Mutex<Ledger>>,
}

impl Harness {
    fn new(src_partitions: usize, dst_partitions: usize) -> Self {
        let src = MemoryBroker::new();
        let dst = MemoryBroker::new();
        src.create_topic("events", src_partitions);
        dst.create_topic("events", dst_partitions);
        Self {
            src,
            dst,
            ledger: Arc::default(),
        }
    }

    fn engine(&self) -> MirrorEngine<Recording, Recording> {
        let source = Recording {
            inner: self.src.client("source:11011"),
            role: Role::Source,
            ledger: Arc::clone(&self.ledger),
        };
        let destination = Recording {
            inner: self.dst.client("destination:11011"),
            role: Role::Destination,
            ledger: Arc::clone(&self.ledger),
        };
        let settings = MirrorSettings {
            poll_timeout_ms: 1,
            ..MirrorSettings::default()
        };
        MirrorEngine::new("events", source, destination, settings).unwrap()
    }

    fn publish(&self, broker: &MemoryBroker, partition: PartitionId, count: usize) {
        broker.append(
            "events",
            partition,
            (0..count).map(|i| Message::new(format!("{partition}:{i}")).with_key("key")),
        );
    }

    fn contents(broker: &MemoryBroker, partition: PartitionId) -> Vec<(u64, bytes::Bytes)> {
        broker
            .messages("events", partition)
            .into_iter()
            .map(|m| (m.seq_num, m.content))
            .collect()
    }
}

async fn ticks(engine: &mut MirrorEngine<Recording, Recording>, n: usize) {
    for _ in 0..n {
        engine.tick().await.unwrap();
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_copies_everything_then_idles_then_follows() {
    let h = Harness::new(1, 1);
    h.publish(&h.src, 0, 100);

    let mut engine = h.engine();
    engine.start().await.unwrap();
    ticks(&mut engine, 10).await;

    assert_eq!(Harness::contents(&h.dst, 0), Harness::contents(&h.src, 0));
    let produces = h.ledger.lock().unwrap().produces.len();
    assert_eq!(produces, 1);
    assert_eq!(h.ledger.lock().unwrap().consumes.len(), 10);
    assert_eq!(engine.stats().empty_cycles, 9);

    h.publish(&h.src, 0, 7);
    ticks(&mut engine, 2).await;
    assert_eq!(h.dst.messages("events", 0).len(), 107);
    assert_eq!(Harness::contents(&h.dst, 0), Harness::contents(&h.src, 0));
}

#[tokio::test]
async fn test_first_consume_starts_after_destination_watermarks() {
    let h = Harness::new(2, 2);
    h.publish(&h.src, 0, 30);
    h.publish(&h.src, 1, 30);
    h.publish(&h.dst, 0, 6);
    h.publish(&h.dst, 1, 11);

    let mut engine = h.engine();
    engine.start().await.unwrap();
    ticks(&mut engine, 1).await;

    let first = h.ledger.lock().unwrap().consumes[0].clone();
    assert_eq!(first, vec![(0, 6), (1, 11)]);
}

#[tokio::test]
async fn test_topology_mismatch_makes_no_data_requests() {
    let h = Harness::new(2, 3);
    h.publish(&h.src, 0, 5);

    let mut engine = h.engine();
    let err = engine.run().await.unwrap_err();

    assert!(matches!(
        err,
        Error::PartitionMismatch {
            source_partitions: 2,
            destination_partitions: 3
        }
    ));
    let ledger = h.ledger.lock().unwrap();
    assert!(ledger.consumes.is_empty());
    assert!(ledger.produces.is_empty());
}

#[tokio::test]
async fn test_never_reads_while_writing() {
    let h = Harness::new(4, 4);
    let mut engine = h.engine();
    engine.start().await.unwrap();

    for round in 0..20 {
        h.publish(&h.src, (round % 4) as PartitionId, round * 3 + 1);
        ticks(&mut engine, 1).await;
    }
    ticks(&mut engine, 3).await;

    let ledger = h.ledger.lock().unwrap();
    assert_eq!(ledger.overlaps, 0);
    for partition in 0..4 {
        assert_eq!(
            Harness::contents(&h.dst, partition),
            Harness::contents(&h.src, partition)
        );
    }
}

#[tokio::test]
async fn test_next_seq_never_decreases() {
    let h = Harness::new(2, 2);
    let mut engine = h.engine();
    engine.start().await.unwrap();

    let mut history: Vec<Vec<u64>> = Vec::new();
    for round in 0..15 {
        if round % 3 == 0 {
            h.publish(&h.src, 0, 10);
            h.publish(&h.src, 1, 4);
        }
        ticks(&mut engine, 1).await;
        history.push(engine.cursors().iter().map(|c| c.next_seq()).collect());
    }

    for pair in history.windows(2) {
        assert!(pair[0].iter().zip(&pair[1]).all(|(a, b)| a <= b), "{pair:?}");
    }
}

#[tokio::test]
async fn test_large_result_split_into_bounded_batches() {
    let h = Harness::new(1, 1);
    h.publish(&h.src, 0, 300);

    let mut engine = h.engine();
    engine.start().await.unwrap();
    ticks(&mut engine, 1).await;

    let produce = h.ledger.lock().unwrap().produces[0].clone();
    assert_eq!(produce, vec![(0, Some(0), 256), (0, Some(256), 44)]);
    assert_eq!(Harness::contents(&h.dst, 0), Harness::contents(&h.src, 0));
}

#[tokio::test]
async fn test_restart_resumes_without_duplicates() {
    let h = Harness::new(2, 2);
    h.publish(&h.src, 0, 40);
    h.publish(&h.src, 1, 25);

    {
        let mut engine = h.engine();
        engine.start().await.unwrap();
        ticks(&mut engine, 2).await;
    }

    h.publish(&h.src, 0, 5);
    let mut engine = h.engine();
    engine.start().await.unwrap();
    let resumed: Vec<u64> = engine.cursors().iter().map(|c| c.next_seq()).collect();
    assert_eq!(resumed, vec![40, 25]);

    ticks(&mut engine, 2).await;
    assert_eq!(h.dst.messages("events", 0).len(), 45);
    assert_eq!(h.dst.messages("events", 1).len(), 25);
}

#[tokio::test]
async fn test_source_fault_stops_the_mirror() {
    let h = Harness::new(1, 1);
    let mut engine = h.engine();
    engine.start().await.unwrap();
    h.src.inject_fault(FaultKind::SystemFail);

    let err = engine.run().await.unwrap_err();
    assert_eq!(err.fault_kind(), Some(FaultKind::SystemFail));
    assert_eq!(err.to_string(), "System Error");
}
