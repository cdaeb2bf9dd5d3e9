use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::error::TypeError;

/// Source of wall-clock time.
///
/// Injected into every component that stamps documents or ledger records so
/// that tests can pin time and exercise clock regressions. Implementations
/// return instants truncated to whole milliseconds, the precision of the
/// canonical timestamp format.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        truncate_to_millis(Utc::now())
    }
}

/// Manually driven clock for tests and deterministic replays.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(truncate_to_millis(now)),
        }
    }

    /// Clock pinned at the given milliseconds since the UNIX epoch.
    pub fn at_millis(ms: i64) -> Self {
        Self::new(DateTime::from_timestamp_millis(ms).unwrap_or_default())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock mutex poisoned") = truncate_to_millis(now);
    }

    /// Move the clock forward (or backward, for negative durations).
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

impl fmt::Debug for FixedClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedClock({})", canonical_timestamp(&self.now()))
    }
}

/// Drop sub-millisecond precision.
pub fn truncate_to_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(t.timestamp_millis()).unwrap_or(t)
}

/// Canonical rendering: RFC 3339, UTC, exactly three fractional digits,
/// `Z` suffix (`2025-01-15T10:00:00.000Z`).
pub fn canonical_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse any RFC 3339 timestamp into UTC, truncated to milliseconds.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, TypeError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| truncate_to_millis(t.with_timezone(&Utc)))
        .map_err(|e| TypeError::InvalidTimestamp {
            value: s.to_string(),
            reason: e.to_string(),
        })
}

/// Serde adapter that always writes the canonical timestamp form, so that
/// serializing a parsed document reproduces its hashed bytes exactly.
///
/// Use with `#[serde(with = "sla_types::temporal::canonical")]`.
pub mod canonical {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::canonical_timestamp(t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_timestamp(&s).map_err(serde::de::Error::custom)
    }
}
