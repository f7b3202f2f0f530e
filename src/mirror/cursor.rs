//! Per-partition replication cursors
//!
//! The table is a dense vector indexed by partition id plus a FIFO of
//! partitions ready to be scheduled. A cursor's `ready` flag is set exactly
//! while its id sits in the queue.

use crate::types::{PartitionId, Watermarks};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Replication position of one partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionCursor {
    id: PartitionId,
    next_seq: u64,
    ready: bool,
}

impl PartitionCursor {
    /// Partition index
    pub fn id(&self) -> PartitionId {
        self.id
    }

    /// Next sequence number to request from the source
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Whether the cursor is queued for scheduling
    pub fn is_ready(&self) -> bool {
        self.ready
    }
}

/// All cursors of a mirrored topic and the queue of ready ones
#[derive(Debug, Clone, Default)]
pub struct CursorTable {
    cursors: Vec<PartitionCursor>,
    ready: VecDeque<PartitionId>,
}

impl CursorTable {
    /// Seed one ready cursor per partition, starting right after each
    /// partition's last assigned sequence number
    pub fn from_watermarks(watermarks: &[Watermarks]) -> Self {
        let cursors: Vec<PartitionCursor> = watermarks
            .iter()
            .enumerate()
            .map(|(i, wm)| PartitionCursor {
                id: i as PartitionId,
                next_seq: wm.next_seq(),
                ready: true,
            })
            .collect();
        let ready = cursors.iter().map(PartitionCursor::id).collect();
        Self { cursors, ready }
    }

    /// Number of partitions
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// Whether the table has no partitions
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Cursor of one partition
    pub fn get(&self, id: PartitionId) -> Option<&PartitionCursor> {
        self.cursors.get(usize::from(id))
    }

    /// All cursors in partition order
    pub fn iter(&self) -> impl Iterator<Item = &PartitionCursor> {
        self.cursors.iter()
    }

    /// Whether any cursor is waiting to be scheduled
    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Number of queued cursors
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Drain the ready queue, marking every drained cursor not ready
    pub fn dequeue_all_ready(&mut self) -> Vec<PartitionCursor> {
        let mut drained = Vec::with_capacity(self.ready.len());
        while let Some(id) = self.ready.pop_front() {
            if let Some(cursor) = self.cursors.get_mut(usize::from(id)) {
                cursor.ready = false;
                drained.push(*cursor);
            }
        }
        drained
    }

    /// Queue a cursor for scheduling; returns `false` if it was already
    /// queued or does not exist
    pub fn enqueue(&mut self, id: PartitionId) -> bool {
        let Some(cursor) = self.cursors.get_mut(usize::from(id)) else {
            warn!(partition = id, "enqueue of unknown partition ignored");
            return false;
        };
        if cursor.ready {
            return false;
        }
        cursor.ready = true;
        self.ready.push_back(id);
        true
    }

    /// Move a cursor forward; a value below the current position is ignored
    pub fn advance(&mut self, id: PartitionId, next_seq: u64) -> bool {
        let Some(cursor) = self.cursors.get_mut(usize::from(id)) else {
            warn!(partition = id, "advance of unknown partition ignored");
            return false;
        };
        if next_seq < cursor.next_seq {
            warn!(
                partition = id,
                current = cursor.next_seq,
                reported = next_seq,
                "ignoring backwards next sequence number"
            );
            return false;
        }
        if next_seq != cursor.next_seq {
            debug!(partition = id, from = cursor.next_seq, to = next_seq, "cursor advanced");
            cursor.next_seq = next_seq;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> CursorTable {
        CursorTable::from_watermarks(&[Watermarks::new(0, 5), Watermarks::new(2, 10), Watermarks::empty()])
    }

    #[test]
    fn test_seeded_from_destination_watermarks() {
        let table = table();
        let seqs: Vec<u64> = table.iter().map(PartitionCursor::next_seq).collect();
        assert_eq!(seqs, vec![6, 11, 0]);
        assert!(table.iter().all(PartitionCursor::is_ready));
        assert_eq!(table.ready_len(), 3);
    }

    #[test]
    fn test_dequeue_all_ready_drains_in_order() {
        let mut table = table();
        let drained: Vec<PartitionId> = table.dequeue_all_ready().iter().map(PartitionCursor::id).collect();
        assert_eq!(drained, vec![0, 1, 2]);
        assert!(!table.has_ready());
        assert!(table.iter().all(|c| !c.is_ready()));
        assert!(table.dequeue_all_ready().is_empty());
    }

    #[test]
    fn test_enqueue_is_idempotent() {
        let mut table = table();
        table.dequeue_all_ready();

        assert!(table.enqueue(1));
        assert!(!table.enqueue(1));
        assert_eq!(table.ready_len(), 1);
        assert!(table.get(1).unwrap().is_ready());
        assert!(!table.enqueue(42));
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut table = table();
        assert!(table.advance(0, 20));
        assert_eq!(table.get(0).unwrap().next_seq(), 20);

        assert!(!table.advance(0, 7));
        assert_eq!(table.get(0).unwrap().next_seq(), 20);

        assert!(table.advance(0, 20));
        assert!(!table.advance(9, 1));
    }

    #[test]
    fn test_empty_table() {
        let table = CursorTable::from_watermarks(&[]);
        assert!(table.is_empty());
        assert!(!table.has_ready());
    }
}
