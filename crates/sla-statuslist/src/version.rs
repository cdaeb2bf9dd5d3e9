use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sla_types::{canonical_timestamp, parse_timestamp, truncate_to_millis, Digest};

use crate::error::{StatusListError, StatusListResult};

/// Hex characters of the parent hash carried in a version token.
pub const PARENT_PREFIX_LEN: usize = 8;

/// Version token of a status list document.
///
/// Rendered as `<timestamp>[.<counter>][#<parent>]`, where `timestamp` is the
/// canonical update time, `counter` disambiguates updates that land on the
/// same millisecond (or under a clock that moved backwards), and `parent` is
/// the first eight hex characters of the previous document hash.
///
/// Versions are totally ordered by `(timestamp, counter, parent)`. The
/// successor rule is the hybrid-logical-clock local event rule, so each
/// successor is strictly greater than its predecessor whatever the wall
/// clock does.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentVersion {
    timestamp: DateTime<Utc>,
    counter: u32,
    parent: Option<String>,
}

impl DocumentVersion {
    /// First version of a new document.
    pub fn genesis(now: DateTime<Utc>) -> Self {
        Self {
            timestamp: truncate_to_millis(now),
            counter: 0,
            parent: None,
        }
    }

    /// Version following `self` for a document whose previous hash was
    /// `parent_hash`, observed at wall-clock time `now`.
    ///
    /// Fails with `VersionExhausted` when the counter would overflow and `now`
    /// is not past the current timestamp.
    pub fn successor(&self, now: DateTime<Utc>, parent_hash: &Digest) -> StatusListResult<Self> {
        let now = truncate_to_millis(now);
        let (timestamp, counter) = if now > self.timestamp {
            (now, 0)
        } else {
            let counter = self
                .counter
                .checked_add(1)
                .ok_or_else(|| StatusListError::VersionExhausted(self.to_string()))?;
            (self.timestamp, counter)
        };
        Ok(Self {
            timestamp,
            counter,
            parent: Some(parent_hash.short_hex()),
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_genesis(&self) -> bool {
        self.parent.is_none()
    }
}

impl fmt::Display for DocumentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&canonical_timestamp(&self.timestamp))?;
        if self.counter > 0 {
            write!(f, ".{}", self.counter)?;
        }
        if let Some(parent) = &self.parent {
            write!(f, "#{parent}")?;
        }
        Ok(())
    }
}

impl FromStr for DocumentVersion {
    type Err = StatusListError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| StatusListError::InvalidVersion {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (head, parent) = match s.split_once('#') {
            Some((head, parent)) => {
                if parent.len() != PARENT_PREFIX_LEN
                    || !parent.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
                {
                    return Err(invalid("parent must be 8 lowercase hex characters"));
                }
                (head, Some(parent.to_string()))
            }
            None => (s, None),
        };

        // The timestamp itself contains a '.', so a counter is only present
        // when the segment after the last '.' is all digits.
        let (ts, counter) = match head.rsplit_once('.') {
            Some((ts, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
                let counter: u32 = n.parse().map_err(|_| invalid("counter overflow"))?;
                if counter == 0 || n.starts_with('0') {
                    return Err(invalid("counter must be a positive integer without leading zeros"));
                }
                (ts, counter)
            }
            _ => (head, 0),
        };

        let timestamp = parse_timestamp(ts).map_err(|e| invalid(&e.to_string()))?;
        if canonical_timestamp(&timestamp) != ts {
            return Err(invalid("timestamp is not in canonical form"));
        }

        Ok(Self {
            timestamp,
            counter,
            parent,
        })
    }
}

impl Serialize for DocumentVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocumentVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
