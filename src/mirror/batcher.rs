//! Repackaging of consumed messages into destination batches

use crate::client::{ConsumedPartition, ProduceBatch};
use crate::config::MirrorSettings;
use crate::types::Message;
use tracing::debug;

/// Splits consumed partitions into count- and size-bounded produce batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardingBatcher {
    max_messages: usize,
    max_bytes: usize,
    overhead: usize,
}

impl Default for ForwardingBatcher {
    fn default() -> Self {
        Self::from_settings(&MirrorSettings::default())
    }
}

impl ForwardingBatcher {
    /// Create a batcher with explicit limits
    pub fn new(max_messages: usize, max_bytes: usize, overhead: usize) -> Self {
        Self {
            max_messages: max_messages.max(1),
            max_bytes,
            overhead,
        }
    }

    /// Create a batcher from mirror settings
    pub fn from_settings(settings: &MirrorSettings) -> Self {
        Self::new(
            settings.max_batch_messages,
            settings.max_batch_bytes,
            settings.message_overhead,
        )
    }

    /// Split one partition's messages, preserving order
    ///
    /// A new batch starts when the current one already holds the maximum
    /// number of messages, when the next message would push it past the
    /// byte limit, or when its sequence number does not follow the previous
    /// one. A message larger than the byte limit travels alone.
    pub fn split(&self, messages: Vec<Message>) -> Vec<Vec<Message>> {
        let mut batches = Vec::new();
        let mut current: Vec<Message> = Vec::new();
        let mut current_bytes = 0usize;

        for msg in messages {
            let size = msg.estimated_size(self.overhead);
            let gap = current
                .last()
                .is_some_and(|prev| msg.seq_num != prev.seq_num.wrapping_add(1));
            let full = current.len() >= self.max_messages
                || (!current.is_empty() && current_bytes + size > self.max_bytes);
            if full || gap {
                batches.push(std::mem::take(&mut current));
                current_bytes = 0;
            }
            current_bytes += size;
            current.push(msg);
        }
        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }

    /// Turn every non-empty consumed partition into produce batches for the
    /// same topic/partition on the destination
    ///
    /// Each batch is pinned to the source sequence number of its first message;
    /// batches never span a gap, so the destination keeps source numbering.
    pub fn forward(&self, consumed: Vec<ConsumedPartition>) -> Vec<ProduceBatch> {
        let mut batches = Vec::new();
        for partition in consumed {
            if partition.messages.is_empty() {
                continue;
            }
            let tp = partition.topic_partition;
            let split = self.split(partition.messages);
            debug!(partition = %tp, batches = split.len(), "forwarding");

            batches.extend(split.into_iter().map(|messages| {
                let base = messages.first().map_or(0, |m| m.seq_num);
                ProduceBatch::new(tp.topic.clone(), tp.partition, messages).with_base_seq_num(base)
            }));
        }
        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NextFetch;
    use crate::types::TopicPartition;
    use test_case::test_case;

    fn messages(count: usize, size: usize, first_seq: u64) -> Vec<Message> {
        (0..count)
            .map(|i| Message::new(vec![b'x'; size]).with_seq_num(first_seq + i as u64))
            .collect()
    }

    fn sizes(batches: &[Vec<Message>]) -> Vec<usize> {
        batches.iter().map(Vec::len).collect()
    }

    #[test_case(0, vec![] ; "nothing")]
    #[test_case(1, vec![1] ; "single message")]
    #[test_case(256, vec![256] ; "exactly one full batch")]
    #[test_case(257, vec![256, 1] ; "one over")]
    #[test_case(300, vec![256, 44] ; "three hundred")]
    #[test_case(600, vec![256, 256, 88] ; "several")]
    fn test_split_by_count(count: usize, expected: Vec<usize>) {
        let batcher = ForwardingBatcher::default();
        assert_eq!(sizes(&batcher.split(messages(count, 10, 0))), expected);
    }

    #[test]
    fn test_split_by_bytes() {
        // 1 MiB payloads plus overhead: four would exceed 4 MiB
        let batcher = ForwardingBatcher::default();
        let batches = batcher.split(messages(10, 1024 * 1024, 0));
        assert_eq!(sizes(&batches), vec![3, 3, 3, 1]);
    }

    #[test]
    fn test_oversized_message_travels_alone() {
        let batcher = ForwardingBatcher::new(256, 100, 0);
        let mut input = messages(1, 10, 0);
        input.extend(messages(1, 500, 1));
        input.extend(messages(1, 10, 2));

        assert_eq!(sizes(&batcher.split(input)), vec![1, 1, 1]);
    }

    #[test]
    fn test_split_preserves_order() {
        let batcher = ForwardingBatcher::default();
        let batches = batcher.split(messages(300, 10, 1000));
        let seqs: Vec<u64> = batches.iter().flatten().map(|m| m.seq_num).collect();
        assert_eq!(seqs, (1000..1300).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_at_sequence_gap() {
        let batcher = ForwardingBatcher::default();
        let input: Vec<Message> = [0, 1, 5, 6]
            .into_iter()
            .map(|seq| Message::new(format!("m{seq}")).with_seq_num(seq))
            .collect();

        let batches = batcher.split(input);
        assert_eq!(sizes(&batches), vec![2, 2]);
        assert_eq!(batches[1][0].seq_num, 5);
    }

    #[test]
    fn test_forward_keeps_source_numbering_across_gap() {
        let batcher = ForwardingBatcher::default();
        let consumed = vec![ConsumedPartition {
            request_id: 1,
            topic_partition: TopicPartition::new("events", 0),
            messages: [0, 1, 5, 6]
                .into_iter()
                .map(|seq| Message::new(format!("m{seq}")).with_seq_num(seq))
                .collect(),
            next: NextFetch {
                seq_num: 7,
                min_fetch_size: 0,
            },
        }];

        let bases: Vec<Option<u64>> = batcher.forward(consumed).iter().map(|b| b.base_seq_num).collect();
        assert_eq!(bases, vec![Some(0), Some(5)]);
    }

    #[test]
    fn test_forward_skips_empty_and_pins_base() {
        let batcher = ForwardingBatcher::default();
        let consumed = vec![
            ConsumedPartition {
                request_id: 1,
                topic_partition: TopicPartition::new("events", 0),
                messages: messages(300, 10, 40),
                next: NextFetch {
                    seq_num: 340,
                    min_fetch_size: 0,
                },
            },
            ConsumedPartition {
                request_id: 1,
                topic_partition: TopicPartition::new("events", 1),
                messages: vec![],
                next: NextFetch {
                    seq_num: 7,
                    min_fetch_size: 0,
                },
            },
        ];

        let batches = batcher.forward(consumed);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.topic_partition == TopicPartition::new("events", 0)));
        assert_eq!(batches[0].base_seq_num, Some(40));
        assert_eq!(batches[1].base_seq_num, Some(296));
        assert_eq!(batches[1].messages.len(), 44);
    }
}
