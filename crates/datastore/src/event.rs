//! Event and bucket metadata types.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form event payload. Two events share a context iff their data are equal.
pub type EventData = Map<String, Value>;

/// A timestamped activity with a duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub duration: TimeDelta,
    #[serde(default)]
    pub data: EventData,
}

impl Event {
    pub fn new(timestamp: DateTime<Utc>, duration: TimeDelta, data: EventData) -> Self {
        Self {
            timestamp,
            duration,
            data,
        }
    }

    /// The instant this event ends (`timestamp + duration`), clamped to the
    /// latest representable instant.
    pub fn end(&self) -> DateTime<Utc> {
        self.timestamp
            .checked_add_signed(self.duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether both events carry the same data.
    pub fn same_context(&self, other: &Event) -> bool {
        self.data == other.data
    }
}

/// Metadata describing a bucket. Immutable once the bucket is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketMetadata {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub client: String,
    pub hostname: String,
    pub created: DateTime<Utc>,
}

impl BucketMetadata {
    /// Describe a new bucket. The display name defaults to the id.
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        client: impl Into<String>,
        hostname: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind: kind.into(),
            client: client.into(),
            hostname: hostname.into(),
            created,
        }
    }

    /// Set a display name other than the id.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Durations are stored as (fractional) seconds with microsecond precision.
///
/// `TimeDelta` itself holds nanoseconds, so a sub-microsecond remainder
/// survives in `MemoryBackend` but is truncated by every backend that
/// serializes events.
pub(crate) mod duration_secs {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn to_secs(duration: &TimeDelta) -> f64 {
        match duration.num_microseconds() {
            Some(us) => us as f64 / 1_000_000.0,
            None => duration.num_milliseconds() as f64 / 1_000.0,
        }
    }

    pub fn from_secs(secs: f64) -> Option<TimeDelta> {
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        let us = (secs * 1_000_000.0).round();
        if us > i64::MAX as f64 {
            return None;
        }
        Some(TimeDelta::microseconds(us as i64))
    }

    pub fn serialize<S: Serializer>(duration: &TimeDelta, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(to_secs(duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<TimeDelta, D::Error> {
        let secs = f64::deserialize(d)?;
        from_secs(secs).ok_or_else(|| {
            D::Error::custom(format!(
                "duration must be a non-negative number of seconds, got {secs}"
            ))
        })
    }
}
