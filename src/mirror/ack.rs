//! Cursor re-arming after consume results and produce acknowledgments

use super::cursor::CursorTable;
use crate::client::{ConsumedPartition, ProduceAck};
use crate::error::{Error, Result};
use crate::types::PartitionId;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Tracks which partitions wait for a destination acknowledgment
#[derive(Debug, Clone, Default)]
pub struct AckTracker {
    awaiting: BTreeSet<PartitionId>,
}

/// Partitions re-armed right away after a consume result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rearmed {
    /// Partitions whose result carried no messages
    pub empty: Vec<PartitionId>,
    /// Partitions that were requested but missing from the response
    pub missing: Vec<PartitionId>,
}

impl AckTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Partitions waiting for an acknowledgment
    pub fn awaiting(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.awaiting.iter().copied()
    }

    /// Whether any acknowledgment is outstanding
    pub fn is_awaiting(&self) -> bool {
        !self.awaiting.is_empty()
    }

    /// Apply a completed consume covering `requested`
    ///
    /// Every reported partition advances to its next sequence number. Empty
    /// ones are re-queued at once, the rest wait for their produce ack.
    /// Requested partitions absent from the response are re-queued unchanged.
    pub fn on_consumed(
        &mut self,
        cursors: &mut CursorTable,
        requested: &[PartitionId],
        consumed: &[ConsumedPartition],
    ) -> Result<Rearmed> {
        let mut seen = BTreeSet::new();
        let mut rearmed = Rearmed::default();

        for result in consumed {
            let id = result.topic_partition.partition;
            if !requested.contains(&id) || !seen.insert(id) {
                return Err(Error::protocol(format!(
                    "unexpected partition {} in consume response",
                    result.topic_partition
                )));
            }

            cursors.advance(id, result.next.seq_num);
            if result.messages.is_empty() {
                cursors.enqueue(id);
                rearmed.empty.push(id);
            } else {
                self.awaiting.insert(id);
            }
        }

        for &id in requested {
            if !seen.contains(&id) {
                warn!(partition = id, "partition missing from consume response, re-queued");
                cursors.enqueue(id);
                rearmed.missing.push(id);
            }
        }
        Ok(rearmed)
    }

    /// Re-queue every acknowledged partition
    pub fn on_produce_acks(&mut self, cursors: &mut CursorTable, acks: &[ProduceAck]) {
        for ack in acks {
            let id = ack.topic_partition.partition;
            if self.awaiting.remove(&id) {
                debug!(partition = id, request_id = ack.request_id, "ack received");
                cursors.enqueue(id);
            } else {
                debug!(partition = id, "ack for partition not awaiting one");
            }
        }
    }

    /// The produce request finished; every forwarded partition must have
    /// been acknowledged
    pub fn finish_produce(&mut self) -> Result<()> {
        if self.awaiting.is_empty() {
            return Ok(());
        }
        let missing: Vec<String> = self.awaiting.iter().map(ToString::to_string).collect();
        self.awaiting.clear();
        Err(Error::protocol(format!(
            "produce completed without acknowledging partitions {}",
            missing.join(", ")
        )))
    }
}
