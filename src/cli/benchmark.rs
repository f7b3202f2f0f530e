//! `benchmark`: produce latency measurements

use super::commands::{BenchmarkArgs, BenchmarkKind};
use crate::client::{BrokerClient, FetchRequest, ProduceBatch};
use crate::error::{Error, Result};
use crate::fault::FaultMonitor;
use crate::types::{Message, TopicPartition, SEQ_END};
use bytes::Bytes;
use std::io::Write;
use std::time::{Duration, Instant};

const TAIL_FETCH_SIZE: u32 = 10_000;
const TAIL_MAX_WAIT: Duration = Duration::from_secs(10);
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Outcome of one benchmark run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkReport {
    /// Which benchmark ran
    pub kind: BenchmarkKind,
    /// Time from publishing until the data or ack came back
    pub elapsed: Duration,
}

impl BenchmarkReport {
    fn args(&self) -> BenchmarkArgs {
        match self.kind {
            BenchmarkKind::P2c(args) | BenchmarkKind::P2t(args) => args,
        }
    }

    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        let args = self.args();
        let what = match self.kind {
            BenchmarkKind::P2c(_) => "data",
            BenchmarkKind::P2t(_) => "ACK",
        };
        format!(
            "Got {what} after publishing {} message(s) of size {} ({}), took {}",
            args.count,
            size_repr(args.size as u64),
            size_repr((args.count * args.size) as u64),
            duration_repr(self.elapsed)
        )
    }
}

/// Run a benchmark against one partition
pub async fn run_benchmark<C>(
    client: &mut C,
    topic_partition: &TopicPartition,
    kind: BenchmarkKind,
    monitor: &FaultMonitor,
) -> Result<BenchmarkReport>
where
    C: BrokerClient + ?Sized,
{
    let (args, tail) = match kind {
        BenchmarkKind::P2c(args) => (args, true),
        BenchmarkKind::P2t(args) => (args, false),
    };
    let topic = topic_partition.topic.as_str();
    let partition = topic_partition.partition;

    if tail {
        let fetch = FetchRequest::new(topic, partition, SEQ_END, TAIL_FETCH_SIZE);
        client
            .consume(vec![fetch], TAIL_MAX_WAIT, 0)
            .map_err(|_| Error::Other("Unable to schedule consumer request".to_string()))?;
    }

    let content = Bytes::from(vec![0u8; args.size]);
    let messages = (0..args.count).map(|_| Message::new(content.clone())).collect();
    let start = Instant::now();
    client
        .produce(vec![ProduceBatch::new(topic, partition, messages)])
        .map_err(|_| Error::Other("Unable to schedule publisher request".to_string()))?;

    while client.should_poll() {
        let done = client.poll(POLL_TIMEOUT).await?;
        monitor.inspect(&done.faults)?;

        let finished = if tail {
            let mut got_data = false;
            for consumed in &done.consumed {
                if consumed.messages.is_empty() {
                    // Still tailing: keep waiting from where the broker says
                    let fetch = FetchRequest::new(topic, partition, consumed.next.seq_num, TAIL_FETCH_SIZE);
                    client.consume(vec![fetch], TAIL_MAX_WAIT, 0)?;
                } else {
                    got_data = true;
                }
            }
            got_data
        } else {
            !done.produce_acks.is_empty()
        };

        if finished {
            return Ok(BenchmarkReport {
                kind,
                elapsed: start.elapsed(),
            });
        }
    }
    Err(Error::protocol("benchmark requests completed without a result"))
}

/// Run a benchmark and print its summary
pub async fn benchmark<C, W>(
    client: &mut C,
    topic_partition: &TopicPartition,
    kind: BenchmarkKind,
    monitor: &FaultMonitor,
    out: &mut W,
) -> Result<BenchmarkReport>
where
    C: BrokerClient + ?Sized,
    W: Write + Send,
{
    let report = run_benchmark(client, topic_partition, kind, monitor).await?;
    writeln!(out, "{}", report.summary())?;
    Ok(report)
}

/// Human-readable byte size
pub fn size_repr(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["kb", "mb", "gb", "tb"];
    if bytes < 1024 {
        return format!("{bytes}b");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2}{}", UNITS[unit])
}

/// Human-readable duration
pub fn duration_repr(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros < 1_000 {
        format!("{micros}us")
    } else if micros < 1_000_000 {
        format!("{:.2}ms", micros as f64 / 1_000.0)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryBroker;
    use test_case::test_case;

    #[test_case(0, "0b" ; "zero")]
    #[test_case(128, "128b" ; "bytes")]
    #[test_case(1024, "1.00kb" ; "one kilobyte")]
    #[test_case(1536, "1.50kb" ; "fraction")]
    #[test_case(4 * 1024 * 1024, "4.00mb" ; "megabytes")]
    fn test_size_repr(bytes: u64, expected: &str) {
        assert_eq!(size_repr(bytes), expected);
    }

    #[test_case(Duration::from_micros(250), "250us" ; "micros")]
    #[test_case(Duration::from_micros(1_500), "1.50ms" ; "millis")]
    #[test_case(Duration::from_millis(2_250), "2.25s" ; "seconds")]
    fn test_duration_repr(duration: Duration, expected: &str) {
        assert_eq!(duration_repr(duration), expected);
    }

    #[test]
    fn test_summary() {
        let report = BenchmarkReport {
            kind: BenchmarkKind::P2t(BenchmarkArgs { count: 4, size: 512 }),
            elapsed: Duration::from_micros(900),
        };
        assert_eq!(
            report.summary(),
            "Got ACK after publishing 4 message(s) of size 512b (2.00kb), took 900us"
        );
    }

    #[tokio::test]
    async fn test_p2t() {
        let broker = MemoryBroker::new();
        broker.create_topic("events", 1);
        let kind = BenchmarkKind::P2t(BenchmarkArgs { count: 3, size: 16 });

        let mut out = Vec::new();
        let report = benchmark(
            &mut broker.client("b"),
            &TopicPartition::new("events", 0),
            kind,
            &FaultMonitor::abort_on_any(),
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(report.kind, kind);
        assert_eq!(broker.messages("events", 0).len(), 3);
        assert!(String::from_utf8(out).unwrap().starts_with("Got ACK after publishing 3 message(s)"));
    }

    #[tokio::test]
    async fn test_p2c_reads_back_published_data() {
        let broker = MemoryBroker::new();
        broker.create_topic("events", 1);
        broker.append("events", 0, [Message::new("old")]);
        let kind = BenchmarkKind::P2c(BenchmarkArgs { count: 2, size: 8 });

        let report = run_benchmark(
            &mut broker.client("b"),
            &TopicPartition::new("events", 0),
            kind,
            &FaultMonitor::abort_on_any(),
        )
        .await
        .unwrap();

        assert_eq!(report.summary().split(',').next(), Some("Got data after publishing 2 message(s) of size 8b (16b)"));
        // the tail consume plus one re-issue after the empty first answer
        assert_eq!(broker.request_counts().consume, 2);
    }
}
