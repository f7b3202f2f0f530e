//! Mirror engine types

/// Counters kept by a running mirror
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    /// Consume requests issued to the source
    pub consume_requests: u64,
    /// Produce requests issued to the destination
    pub produce_requests: u64,
    /// Messages forwarded
    pub messages_forwarded: u64,
    /// Estimated bytes forwarded
    pub bytes_forwarded: u64,
    /// Consume cycles that returned nothing to forward
    pub empty_cycles: u64,
    /// Ticks on which the throttle withheld a consume
    pub throttled_ticks: u64,
}

impl MirrorStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a consume request
    pub fn add_consume(&mut self) {
        self.consume_requests += 1;
    }

    /// Count a produce request carrying `messages` messages of `bytes` estimated bytes
    pub fn add_produce(&mut self, messages: usize, bytes: usize) {
        self.produce_requests += 1;
        self.messages_forwarded += messages as u64;
        self.bytes_forwarded += bytes as u64;
    }

    /// Count a cycle without anything to forward
    pub fn add_empty_cycle(&mut self) {
        self.empty_cycles += 1;
    }

    /// Count a throttled tick
    pub fn add_throttled(&mut self) {
        self.throttled_ticks += 1;
    }
}
