//! Civil time provider and wall-clock timestamp type
//!
//! All timestamps in the system are produced through a [`Clock`] pinned to a
//! single IANA timezone, so state transitions carry a consistent local-time
//! basis regardless of the host timezone. [`LocalTimestamp`] is the civil
//! wall-clock instant in that zone; on the wire it is formatted to the
//! minute as `"HH:MM DD.MM.YYYY"`.

use crate::error::{GridwatchError, Result};
use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Wire format for persisted and provider timestamps
pub const TIMESTAMP_FORMAT: &str = "%H:%M %d.%m.%Y";

/// Time provider pinned to one civil timezone
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    tz: Tz,
}

impl Clock {
    /// Create a clock for an IANA timezone name (e.g. `Europe/Kyiv`)
    pub fn new(tz_name: &str) -> Result<Self> {
        let tz: Tz = tz_name
            .parse()
            .map_err(|_| GridwatchError::validation("timezone", tz_name))?;
        Ok(Self { tz })
    }

    /// Current wall-clock time in the configured zone
    pub fn now(&self) -> LocalTimestamp {
        LocalTimestamp(Utc::now().with_timezone(&self.tz).naive_local())
    }

    /// Timezone this clock is pinned to
    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

/// Civil wall-clock timestamp in the clock's fixed zone
///
/// Full precision in memory; minute precision once serialized. Equality is
/// full-precision, which matters only within a single process run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalTimestamp(NaiveDateTime);

impl LocalTimestamp {
    /// Parse from the `"HH:MM DD.MM.YYYY"` wire format
    pub fn parse(s: &str) -> Result<Self> {
        let naive = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)?;
        Ok(Self(naive))
    }

    /// This timestamp shifted back by `window`
    pub fn minus(&self, window: Duration) -> Self {
        let delta = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        Self(self.0.checked_sub_signed(delta).unwrap_or(NaiveDateTime::MIN))
    }

    /// This timestamp shifted forward by `offset`
    pub fn plus(&self, offset: Duration) -> Self {
        let delta = chrono::Duration::from_std(offset).unwrap_or(chrono::Duration::MAX);
        Self(self.0.checked_add_signed(delta).unwrap_or(NaiveDateTime::MAX))
    }
}

impl fmt::Display for LocalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl Serialize for LocalTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for LocalTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        LocalTimestamp::parse(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_roundtrip() {
        let ts = LocalTimestamp::parse("09:30 15.02.2025").unwrap();
        assert_eq!(ts.to_string(), "09:30 15.02.2025");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(LocalTimestamp::parse("2025-02-15T09:30:00Z").is_err());
        assert!(LocalTimestamp::parse("").is_err());
    }

    #[test]
    fn minus_and_plus_shift_by_window() {
        let ts = LocalTimestamp::parse("12:00 01.06.2025").unwrap();
        let earlier = ts.minus(Duration::from_secs(3600));
        assert_eq!(earlier.to_string(), "11:00 01.06.2025");
        let later = ts.plus(Duration::from_secs(90 * 60));
        assert_eq!(later.to_string(), "13:30 01.06.2025");
        assert!(earlier < ts && ts < later);
    }

    #[test]
    fn serde_uses_wire_format() {
        let ts = LocalTimestamp::parse("23:59 31.12.2024").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"23:59 31.12.2024\"");
        let back: LocalTimestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn clock_rejects_unknown_zone() {
        assert!(Clock::new("Europe/Kyiv").is_ok());
        assert!(Clock::new("Mars/Olympus").is_err());
    }
}
