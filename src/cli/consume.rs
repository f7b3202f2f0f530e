//! `consume`: follow one partition and print what arrives

use super::commands::{ConsumeArgs, Field};
use super::time_range::TimeRange;
use crate::client::{BrokerClient, FetchRequest};
use crate::config::ConsumeSettings;
use crate::error::{Error, Result};
use crate::fault::{FaultMonitor, Verdict};
use crate::types::{Message, RequestId, TopicPartition, SEQ_END};
use std::io::Write;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Where consumption starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartFrom {
    /// First available message
    Beginning,
    /// Only messages produced from now on
    End,
    /// An absolute sequence number
    Seq(u64),
}

impl StartFrom {
    /// Sequence number to request first
    pub fn seq_num(self) -> u64 {
        match self {
            StartFrom::Beginning => 0,
            StartFrom::End => SEQ_END,
            StartFrom::Seq(seq) => seq,
        }
    }
}

impl FromStr for StartFrom {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("beginning") || s == "first" {
            Ok(StartFrom::Beginning)
        } else if s.eq_ignore_ascii_case("end") || s.eq_ignore_ascii_case("eof") {
            Ok(StartFrom::End)
        } else if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            s.parse().map(StartFrom::Seq).map_err(|_| {
                Error::config(format!("Sequence number {s} is out of range"))
            })
        } else {
            Err(Error::config(
                "Expected either \"beginning\", \"end\" or a sequence number",
            ))
        }
    }
}

/// Follows one partition, printing messages as they arrive
#[derive(Debug)]
pub struct Consumer {
    topic_partition: TopicPartition,
    next: u64,
    fetch_size: u32,
    fields: Vec<Field>,
    stats_only: bool,
    time_range: Option<TimeRange>,
    settings: ConsumeSettings,
    monitor: FaultMonitor,
    pending: Option<RequestId>,
}

impl Consumer {
    /// Create a consumer for `topic_partition` configured by `args`
    pub fn new(
        topic_partition: TopicPartition,
        args: &ConsumeArgs,
        settings: ConsumeSettings,
        monitor: FaultMonitor,
    ) -> Self {
        Self {
            topic_partition,
            next: args.from.seq_num(),
            fetch_size: settings.min_fetch_size,
            fields: args.fields.clone(),
            stats_only: args.stats,
            time_range: args.time_range,
            settings,
            monitor,
            pending: None,
        }
    }

    /// Next sequence number that will be requested
    pub fn next_seq(&self) -> u64 {
        self.next
    }

    /// Issue a request if none is pending, poll once and print the results
    ///
    /// Returns the number of messages written.
    pub async fn step<C, W>(&mut self, client: &mut C, out: &mut W) -> Result<usize>
    where
        C: BrokerClient + ?Sized,
        W: Write + Send,
    {
        if self.pending.is_none() {
            debug!(from = self.next, "requesting");
            let fetch = FetchRequest::new(
                self.topic_partition.topic.as_str(),
                self.topic_partition.partition,
                self.next,
                self.fetch_size,
            );
            let max_wait = Duration::from_millis(self.settings.max_wait_ms);
            self.pending = Some(client.consume(vec![fetch], max_wait, 0)?);
        }

        let done = client
            .poll(Duration::from_millis(self.settings.poll_timeout_ms))
            .await?;
        if let Verdict::Retry { backoff, .. } = self.monitor.inspect(&done.faults)? {
            tokio::time::sleep(backoff).await;
            self.pending = None;
            return Ok(0);
        }

        let mut written = 0;
        for consumed in done.consumed {
            if self.stats_only {
                writeln!(out, "{} messages", consumed.messages.len())?;
            } else {
                for msg in &consumed.messages {
                    if self.time_range.map_or(true, |range| range.contains(msg.timestamp)) {
                        self.write_message(out, msg)?;
                        written += 1;
                    }
                }
            }

            self.fetch_size = consumed.next.min_fetch_size.max(self.settings.min_fetch_size);
            self.next = consumed.next.seq_num;
            self.pending = None;
        }
        out.flush()?;
        Ok(written)
    }

    /// Consume until a fatal error
    pub async fn run<C, W>(&mut self, client: &mut C, out: &mut W) -> Result<()>
    where
        C: BrokerClient + ?Sized,
        W: Write + Send,
    {
        loop {
            self.step(client, out).await?;
        }
    }

    fn write_message<W: Write>(&self, out: &mut W, msg: &Message) -> Result<()> {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                out.write_all(b"\t")?;
            }
            match field {
                Field::SeqNum => write!(out, "{}", msg.seq_num)?,
                Field::Ts => write!(out, "{}", msg.timestamp)?,
                Field::Key => out.write_all(&msg.key)?,
                Field::Content => out.write_all(&msg.content)?,
            }
        }
        out.write_all(b"\n")?;
        Ok(())
    }
}
