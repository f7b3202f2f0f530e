//! Common types used throughout lbctl
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// Client-assigned identifier of an outstanding broker request (never 0)
pub type RequestId = u32;

/// Partition index within a topic
pub type PartitionId = u16;

/// Longest topic name accepted by the broker
pub const MAX_TOPIC_LEN: usize = 255;

/// Sequence number meaning "whatever comes after the current end"
pub const SEQ_END: u64 = u64::MAX;

// ============================================================================
// Addressing
// ============================================================================

/// A topic and one of its partitions
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartition {
    /// Topic name
    pub topic: String,
    /// Partition index
    pub partition: PartitionId,
}

impl TopicPartition {
    /// Create a new topic/partition pair
    pub fn new(topic: impl Into<String>, partition: PartitionId) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.partition)
    }
}

/// Validate a topic name
pub fn validate_topic(topic: &str) -> crate::Result<()> {
    if topic.is_empty() || topic.len() > MAX_TOPIC_LEN {
        return Err(crate::Error::InvalidTopic {
            topic: topic.to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// Messages
// ============================================================================

/// A single log message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Sequence number within the partition (assigned by the broker)
    pub seq_num: u64,
    /// Creation time in milliseconds since the epoch
    pub timestamp: u64,
    /// Optional key; empty when absent
    pub key: Bytes,
    /// Message payload
    pub content: Bytes,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            seq_num: 0,
            timestamp: now_millis(),
            key: Bytes::new(),
            content: content.into(),
        }
    }

    /// Set the key
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = key.into();
        self
    }

    /// Set the timestamp
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the sequence number
    #[must_use]
    pub fn with_seq_num(mut self, seq_num: u64) -> Self {
        self.seq_num = seq_num;
        self
    }

    /// Estimated on-the-wire size with a fixed per-message overhead
    pub fn estimated_size(&self, overhead: usize) -> usize {
        self.key.len() + self.content.len() + overhead
    }
}

/// Current wall-clock time in milliseconds
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

// ============================================================================
// Watermarks
// ============================================================================

/// Sequence number bounds of one partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Watermarks {
    /// First sequence number still available
    pub first_available: u64,
    /// Last assigned sequence number; `None` for an empty partition
    pub high_watermark: Option<u64>,
}

impl Watermarks {
    /// Create watermarks for a non-empty partition
    pub fn new(first_available: u64, high_watermark: u64) -> Self {
        Self {
            first_available,
            high_watermark: Some(high_watermark),
        }
    }

    /// Watermarks of a partition that has never been written to
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sequence number the next appended message will receive
    pub fn next_seq(&self) -> u64 {
        self.high_watermark.map_or(self.first_available, |hwm| hwm + 1)
    }
}
