//! JSON bodies exchanged with the broker's HTTP gateway
//!
//! Keys and payloads travel base64-encoded.

use super::{
    Completions, ConsumedPartition, DiscoveredPartitions, FetchRequest, NextFetch, ProduceAck,
    ProduceBatch,
};
use crate::fault::{Fault, FaultKind};
use crate::types::{Message, PartitionId, RequestId, TopicPartition, Watermarks};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Shared
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireMessage {
    #[serde(default, skip_serializing)]
    pub seq_num: u64,
    #[serde(default)]
    pub ts: u64,
    #[serde(default, with = "b64")]
    pub key: Bytes,
    #[serde(with = "b64")]
    pub content: Bytes,
}

impl From<Message> for WireMessage {
    fn from(msg: Message) -> Self {
        Self {
            seq_num: msg.seq_num,
            ts: msg.timestamp,
            key: msg.key,
            content: msg.content,
        }
    }
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        Self {
            seq_num: wire.seq_num,
            timestamp: wire.ts,
            key: wire.key,
            content: wire.content,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireFault {
    #[serde(rename = "type")]
    pub kind: FaultKind,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub partition: Option<PartitionId>,
    #[serde(default)]
    pub first_available: Option<u64>,
    #[serde(default)]
    pub high_watermark: Option<u64>,
}

impl WireFault {
    pub fn into_fault(self, request_id: RequestId) -> Fault {
        Fault {
            request_id,
            kind: self.kind,
            topic: self.topic,
            partition: self.partition,
            first_available: self.first_available,
            high_watermark: self.high_watermark,
        }
    }
}

/// Body of a non-2xx response
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FaultEnvelope {
    #[serde(default)]
    pub faults: Vec<WireFault>,
}

fn faults_of(faults: Vec<WireFault>, request_id: RequestId) -> Vec<Fault> {
    faults.into_iter().map(|f| f.into_fault(request_id)).collect()
}

// ============================================================================
// Discover
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct DiscoverResponse {
    #[serde(default)]
    pub partitions: Vec<Watermarks>,
    #[serde(default)]
    pub faults: Vec<WireFault>,
}

impl DiscoverResponse {
    pub fn into_completions(self, request_id: RequestId, topic: String) -> Completions {
        if !self.faults.is_empty() {
            return Completions {
                faults: faults_of(self.faults, request_id),
                ..Completions::default()
            };
        }
        Completions {
            discovered: vec![DiscoveredPartitions {
                request_id,
                topic,
                watermarks: self.partitions,
            }],
            ..Completions::default()
        }
    }
}

// ============================================================================
// Consume
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct ConsumeBody {
    pub max_wait_ms: u64,
    pub min_size: u32,
    pub fetches: Vec<WireFetch>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireFetch {
    pub topic: String,
    pub partition: PartitionId,
    pub seq_num: u64,
    pub fetch_size: u32,
}

impl From<FetchRequest> for WireFetch {
    fn from(fetch: FetchRequest) -> Self {
        Self {
            topic: fetch.topic_partition.topic,
            partition: fetch.topic_partition.partition,
            seq_num: fetch.seq_num,
            fetch_size: fetch.fetch_size,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConsumeResponse {
    #[serde(default)]
    pub results: Vec<WireConsumed>,
    #[serde(default)]
    pub faults: Vec<WireFault>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireConsumed {
    pub topic: String,
    pub partition: PartitionId,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    pub next: WireNext,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireNext {
    pub seq_num: u64,
    #[serde(default)]
    pub min_fetch_size: u32,
}

impl ConsumeResponse {
    pub fn into_completions(self, request_id: RequestId) -> Completions {
        Completions {
            faults: faults_of(self.faults, request_id),
            consumed: self
                .results
                .into_iter()
                .map(|r| ConsumedPartition {
                    request_id,
                    topic_partition: TopicPartition::new(r.topic, r.partition),
                    messages: r.messages.into_iter().map(Message::from).collect(),
                    next: NextFetch {
                        seq_num: r.next.seq_num,
                        min_fetch_size: r.next.min_fetch_size,
                    },
                })
                .collect(),
            ..Completions::default()
        }
    }
}

// ============================================================================
// Produce
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct ProduceBody {
    pub batches: Vec<WireBatch>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireBatch {
    pub topic: String,
    pub partition: PartitionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_seq_num: Option<u64>,
    pub messages: Vec<WireMessage>,
}

impl From<ProduceBatch> for WireBatch {
    fn from(batch: ProduceBatch) -> Self {
        Self {
            topic: batch.topic_partition.topic,
            partition: batch.topic_partition.partition,
            base_seq_num: batch.base_seq_num,
            messages: batch.messages.into_iter().map(WireMessage::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProduceResponse {
    #[serde(default)]
    pub acks: Vec<TopicPartition>,
    #[serde(default)]
    pub faults: Vec<WireFault>,
}

impl ProduceResponse {
    pub fn into_completions(self, request_id: RequestId) -> Completions {
        Completions {
            faults: faults_of(self.faults, request_id),
            produce_acks: self
                .acks
                .into_iter()
                .map(|topic_partition| ProduceAck {
                    request_id,
                    topic_partition,
                })
                .collect(),
            ..Completions::default()
        }
    }
}
