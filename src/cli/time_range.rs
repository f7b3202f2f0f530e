//! Timestamp range filter for `consume -T`

use crate::error::{Error, Result};
use chrono::{Local, NaiveDateTime, TimeZone};
use std::str::FromStr;

const FORMAT: &str = "%Y%m%d%H:%M:%S";

/// Inclusive range of message timestamps, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// First timestamp accepted
    pub start_ms: u64,
    /// Last timestamp accepted; open-ended when `None`
    pub end_ms: Option<u64>,
}

impl TimeRange {
    /// Whether `ts` falls inside the range
    pub fn contains(&self, ts: u64) -> bool {
        ts >= self.start_ms && self.end_ms.map_or(true, |end| ts <= end)
    }
}

/// Parse `YYYYMMDDHH:MM:SS` in local time into epoch milliseconds
pub fn parse_timestamp(input: &str) -> Result<u64> {
    let invalid = || Error::InvalidTimestamp {
        input: input.to_string(),
    };
    if input.len() != 16 {
        return Err(invalid());
    }

    let naive = NaiveDateTime::parse_from_str(input, FORMAT).map_err(|_| invalid())?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(invalid)?;
    u64::try_from(local.timestamp_millis()).map_err(|_| invalid())
}

impl FromStr for TimeRange {
    type Err = Error;

    /// `from` or `from,to`
    fn from_str(s: &str) -> Result<Self> {
        let (from, to) = match s.split_once(',') {
            Some((from, to)) => (from, Some(to)),
            None => (s, None),
        };
        let start_ms = parse_timestamp(from)?;
        let end_ms = to
            .filter(|to| !to.is_empty())
            .map(parse_timestamp)
            .transpose()?;
        Ok(Self { start_ms, end_ms })
    }
}
