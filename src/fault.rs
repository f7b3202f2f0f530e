//! Broker fault classification and the fatal-vs-retryable policy
//!
//! Every subcommand funnels the faults returned by a poll through a
//! [`FaultMonitor`]. The mirror engine aborts on anything; the other
//! subcommands may be configured to retry network faults after a fixed
//! backoff.

use crate::error::{Error, Result};
use crate::types::{PartitionId, RequestId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{error, warn};

/// Kind of fault reported for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Requested sequence number outside the partition's available range
    BoundaryCheck,
    /// Topic does not exist
    UnknownTopic,
    /// Partition does not exist
    UnknownPartition,
    /// Access denied
    Access,
    /// Broker-side failure
    SystemFail,
    /// Malformed or unsupported request
    InvalidReq,
    /// Connection or transport failure
    Network,
    /// Anything else
    #[serde(other)]
    Other,
}

/// A fault reported for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Request the fault belongs to
    pub request_id: RequestId,
    /// Classification
    pub kind: FaultKind,
    /// Topic involved, when known
    pub topic: Option<String>,
    /// Partition involved, when known
    pub partition: Option<PartitionId>,
    /// First available sequence number (boundary check faults)
    pub first_available: Option<u64>,
    /// High watermark (boundary check faults)
    pub high_watermark: Option<u64>,
}

impl Fault {
    /// Create a fault with no context
    pub fn new(request_id: RequestId, kind: FaultKind) -> Self {
        Self {
            request_id,
            kind,
            topic: None,
            partition: None,
            first_available: None,
            high_watermark: None,
        }
    }

    /// Create a boundary check fault
    pub fn boundary_check(request_id: RequestId, first_available: u64, high_watermark: u64) -> Self {
        Self {
            first_available: Some(first_available),
            high_watermark: Some(high_watermark),
            ..Self::new(request_id, FaultKind::BoundaryCheck)
        }
    }

    /// Attach the topic
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Attach the partition
    #[must_use]
    pub fn with_partition(mut self, partition: PartitionId) -> Self {
        self.partition = Some(partition);
        self
    }

    /// One-line operator diagnostic
    pub fn diagnostic(&self) -> String {
        let topic = self.topic.as_deref().unwrap_or_default();
        match self.kind {
            FaultKind::BoundaryCheck => format!(
                "Boundary Check fault. first available sequence number is {}, high watermark is {}",
                self.first_available.unwrap_or_default(),
                self.high_watermark.unwrap_or_default()
            ),
            FaultKind::UnknownTopic => format!("Unknown topic '{topic}' error"),
            FaultKind::UnknownPartition => format!("Unknown partition of '{topic}' error"),
            FaultKind::Access => "Access error".to_string(),
            FaultKind::SystemFail => "System Error".to_string(),
            FaultKind::InvalidReq => "Invalid Request".to_string(),
            FaultKind::Network => "Network error".to_string(),
            FaultKind::Other => "Broker fault".to_string(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.diagnostic())
    }
}

/// What to do with faults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Every fault is fatal
    AbortOnAny,
    /// Network faults are retried after `backoff`; everything else is fatal
    RetryNetwork {
        /// Fixed delay before the caller reissues
        backoff: Duration,
    },
}

/// Outcome of inspecting one poll's faults
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No faults
    Clear,
    /// Only retryable faults; the listed requests should be reissued after `backoff`
    Retry {
        /// Delay before reissuing
        backoff: Duration,
        /// Requests that failed
        request_ids: Vec<RequestId>,
    },
}

/// Applies a [`FaultPolicy`] to the faults surfaced by a poll
#[derive(Debug, Clone)]
pub struct FaultMonitor {
    policy: FaultPolicy,
}

impl FaultMonitor {
    /// Create a monitor with the given policy
    pub fn new(policy: FaultPolicy) -> Self {
        Self { policy }
    }

    /// Monitor that treats every fault as fatal (mirror)
    pub fn abort_on_any() -> Self {
        Self::new(FaultPolicy::AbortOnAny)
    }

    /// Monitor for the operator subcommands: retry network faults only when
    /// `retry` is set
    pub fn for_retry_mode(retry: bool, backoff: Duration) -> Self {
        if retry {
            Self::new(FaultPolicy::RetryNetwork { backoff })
        } else {
            Self::abort_on_any()
        }
    }

    /// The active policy
    pub fn policy(&self) -> FaultPolicy {
        self.policy
    }

    /// Inspect faults; returns `Err` with the first fatal fault
    pub fn inspect(&self, faults: &[Fault]) -> Result<Verdict> {
        if faults.is_empty() {
            return Ok(Verdict::Clear);
        }

        let mut retry_ids = Vec::new();
        for fault in faults {
            match self.policy {
                FaultPolicy::RetryNetwork { .. } if fault.kind == FaultKind::Network => {
                    warn!(request_id = fault.request_id, "{}, will retry", fault);
                    retry_ids.push(fault.request_id);
                }
                _ => {
                    error!(request_id = fault.request_id, kind = ?fault.kind, "{}", fault);
                    return Err(Error::Fault(fault.clone()));
                }
            }
        }

        match self.policy {
            FaultPolicy::RetryNetwork { backoff } => Ok(Verdict::Retry {
                backoff,
                request_ids: retry_ids,
            }),
            FaultPolicy::AbortOnAny => Ok(Verdict::Clear),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics() {
        assert_eq!(
            Fault::boundary_check(1, 10, 99).diagnostic(),
            "Boundary Check fault. first available sequence number is 10, high watermark is 99"
        );
        assert_eq!(
            Fault::new(1, FaultKind::UnknownPartition)
                .with_topic("orders")
                .diagnostic(),
            "Unknown partition of 'orders' error"
        );
        assert_eq!(Fault::new(1, FaultKind::Access).to_string(), "Access error");
        assert_eq!(Fault::new(1, FaultKind::SystemFail).to_string(), "System Error");
        assert_eq!(Fault::new(1, FaultKind::InvalidReq).to_string(), "Invalid Request");
        assert_eq!(Fault::new(1, FaultKind::Network).to_string(), "Network error");
    }

    #[test]
    fn test_fault_kind_wire_names() {
        let kind: FaultKind = serde_json::from_str("\"boundary_check\"").unwrap();
        assert_eq!(kind, FaultKind::BoundaryCheck);
        let kind: FaultKind = serde_json::from_str("\"invalid_req\"").unwrap();
        assert_eq!(kind, FaultKind::InvalidReq);
        let kind: FaultKind = serde_json::from_str("\"something_new\"").unwrap();
        assert_eq!(kind, FaultKind::Other);
    }

    #[test]
    fn test_abort_on_any() {
        let monitor = FaultMonitor::abort_on_any();
        assert_eq!(monitor.inspect(&[]).unwrap(), Verdict::Clear);

        let err = monitor
            .inspect(&[Fault::new(7, FaultKind::Network)])
            .unwrap_err();
        assert_eq!(err.fault_kind(), Some(FaultKind::Network));
    }

    #[test]
    fn test_retry_network_only() {
        let backoff = Duration::from_millis(400);
        let monitor = FaultMonitor::for_retry_mode(true, backoff);

        let verdict = monitor
            .inspect(&[Fault::new(3, FaultKind::Network), Fault::new(4, FaultKind::Network)])
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Retry {
                backoff,
                request_ids: vec![3, 4]
            }
        );

        let err = monitor
            .inspect(&[Fault::new(3, FaultKind::Network), Fault::new(4, FaultKind::Access)])
            .unwrap_err();
        assert_eq!(err.fault_kind(), Some(FaultKind::Access));
    }

    #[test]
    fn test_retry_mode_disabled_is_fatal() {
        let monitor = FaultMonitor::for_retry_mode(false, Duration::from_millis(400));
        assert_eq!(monitor.policy(), FaultPolicy::AbortOnAny);
        assert!(monitor.inspect(&[Fault::new(1, FaultKind::Network)]).is_err());
    }
}
