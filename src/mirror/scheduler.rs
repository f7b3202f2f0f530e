//! Consume scheduling and the two request state machines
//!
//! The source and destination handles are each either idle or awaiting one
//! request. A consume is issued only while both are idle, so a source read
//! never overlaps an unacknowledged destination write.

use super::cursor::CursorTable;
use super::throttle::ConsumeThrottle;
use crate::client::{BrokerClient, FetchRequest};
use crate::config::MirrorSettings;
use crate::error::Result;
use crate::types::{PartitionId, RequestId};
use std::time::Duration;
use tracing::{debug, trace};

/// Request state of one broker handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    /// Nothing outstanding
    #[default]
    Idle,
    /// Waiting for the given request to complete
    Awaiting(RequestId),
}

impl Side {
    /// Whether nothing is outstanding
    pub fn is_idle(&self) -> bool {
        matches!(self, Side::Idle)
    }

    /// Outstanding request, if any
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Side::Idle => None,
            Side::Awaiting(id) => Some(*id),
        }
    }
}

/// What one scheduling attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduled {
    /// A consume request was issued
    Issued(RequestId),
    /// A request is outstanding on either side, or no cursor is ready
    NotReady,
    /// Everything was ready but the throttle had no permit
    Throttled,
}

/// Decides once per tick whether to issue a multi-partition consume
#[derive(Debug)]
pub struct ReplicationScheduler {
    topic: String,
    fetch_size_hint: u32,
    max_wait: Duration,
    source: Side,
    destination: Side,
    in_flight: Vec<PartitionId>,
    throttle: Option<ConsumeThrottle>,
}

impl ReplicationScheduler {
    /// Create a scheduler for `topic`
    pub fn new(topic: impl Into<String>, settings: &MirrorSettings) -> Self {
        Self {
            topic: topic.into(),
            fetch_size_hint: settings.fetch_size_hint,
            max_wait: settings.consume_max_wait(),
            source: Side::Idle,
            destination: Side::Idle,
            in_flight: Vec::new(),
            throttle: ConsumeThrottle::from_rate(settings.max_consume_requests_per_second),
        }
    }

    /// Limit consume requests with a throttle
    #[must_use]
    pub fn with_throttle(mut self, throttle: ConsumeThrottle) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Source handle state
    pub fn source(&self) -> Side {
        self.source
    }

    /// Destination handle state
    pub fn destination(&self) -> Side {
        self.destination
    }

    /// Partitions included in the outstanding consume request
    pub fn in_flight(&self) -> &[PartitionId] {
        &self.in_flight
    }

    /// Active throttle, if any
    pub fn throttle(&self) -> Option<&ConsumeThrottle> {
        self.throttle.as_ref()
    }

    /// Whether a consume could be issued now, ignoring the throttle
    pub fn can_schedule(&self, cursors: &CursorTable) -> bool {
        self.source.is_idle() && self.destination.is_idle() && cursors.has_ready()
    }

    /// Issue one consume covering every ready cursor, if allowed
    pub fn schedule<C>(&mut self, cursors: &mut CursorTable, source: &mut C) -> Result<Scheduled>
    where
        C: BrokerClient + ?Sized,
    {
        if !self.can_schedule(cursors) {
            trace!(source = ?self.source, destination = ?self.destination, "not scheduling");
            return Ok(Scheduled::NotReady);
        }
        if let Some(throttle) = &self.throttle {
            if !throttle.try_acquire() {
                trace!("consume throttled");
                return Ok(Scheduled::Throttled);
            }
        }

        let ready = cursors.dequeue_all_ready();
        let fetches = ready
            .iter()
            .map(|c| FetchRequest::new(self.topic.as_str(), c.id(), c.next_seq(), self.fetch_size_hint))
            .collect();
        let request_id = source.consume(fetches, self.max_wait, 0)?;

        self.in_flight = ready.iter().map(|c| c.id()).collect();
        self.source = Side::Awaiting(request_id);
        debug!(request_id, partitions = self.in_flight.len(), "consume scheduled");
        Ok(Scheduled::Issued(request_id))
    }

    /// The outstanding consume finished; returns the partitions it covered
    pub fn consume_completed(&mut self) -> Vec<PartitionId> {
        self.source = Side::Idle;
        std::mem::take(&mut self.in_flight)
    }

    /// A produce request was issued to the destination
    pub fn produce_issued(&mut self, request_id: RequestId) {
        debug!(request_id, "produce issued");
        self.destination = Side::Awaiting(request_id);
    }

    /// The outstanding produce finished
    pub fn produce_completed(&mut self) {
        self.destination = Side::Idle;
    }
}
