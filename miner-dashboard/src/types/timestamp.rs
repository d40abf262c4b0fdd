//! Wall-clock timestamps as they appear on the wire.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use time::{
    format_description::{well_known::Rfc3339, BorrowedFormatItem},
    macros::format_description,
    OffsetDateTime, UtcOffset,
};

// RFC 3339 in UTC, whole seconds, `Z` suffix: 2024-05-01T12:00:00Z
const WIRE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// A UTC instant truncated to whole seconds.
///
/// Every timestamp the dashboard emits (health checks, stat snapshots,
/// miner status, push frames) goes through this type, so all of them share
/// one representation and compare consistently with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// The current instant.
    pub fn now() -> Self {
        Self::from_datetime(OffsetDateTime::now_utc())
    }

    /// Wrap an arbitrary instant, normalizing to UTC and whole seconds.
    pub fn from_datetime(at: OffsetDateTime) -> Self {
        let utc = at.to_offset(UtcOffset::UTC);
        Self(utc.replace_nanosecond(0).unwrap_or(utc))
    }

    /// Parse any RFC 3339 instant.
    pub fn parse(s: &str) -> Result<Self, time::error::Parse> {
        OffsetDateTime::parse(s, &Rfc3339).map(Self::from_datetime)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0.format(WIRE_FORMAT).map_err(|_| fmt::Error)?;
        f.write_str(&s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Timestamp::parse(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_display_is_rfc3339_utc_seconds() {
        let ts = Timestamp::from_datetime(datetime!(2024-05-01 12:34:56.789 UTC));
        assert_eq!(ts.to_string(), "2024-05-01T12:34:56Z");
    }

    #[test]
    fn test_offset_normalized_to_utc() {
        let ts = Timestamp::from_datetime(datetime!(2024-05-01 14:00:00 +02:00));
        assert_eq!(ts.to_string(), "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_output_parses_back() {
        let now = Timestamp::now();
        let parsed = Timestamp::parse(&now.to_string()).unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn test_serde_uses_string_form() {
        let ts = Timestamp::from_datetime(datetime!(2023-01-02 03:04:05 UTC));
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2023-01-02T03:04:05Z\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_str::<Timestamp>("\"yesterday\"").is_err());
    }
}
