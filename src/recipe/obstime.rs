//! Observation timestamps.
//!
//! Recipes carry naive UTC timestamps written as `YYYY-MM-DD HH:MM:SS`
//! (a `T` separator and fractional seconds are also accepted).

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SequenceError;

const ACCEPTED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Seconds per day.
const SECONDS_PER_DAY: f64 = 86_400.0;

/// A naive UTC observation timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObsTime(pub NaiveDateTime);

impl ObsTime {
    pub fn new(datetime: NaiveDateTime) -> Self {
        Self(datetime)
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// Modified Julian date (days since 1858-11-17 00:00).
    pub fn mjd(&self) -> f64 {
        let epoch = NaiveDate::from_ymd_opt(1858, 11, 17)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        let delta = self.0 - epoch;
        let seconds = delta.num_seconds() as f64
            + f64::from(delta.subsec_nanos()) / 1_000_000_000.0;
        seconds / SECONDS_PER_DAY
    }

    /// ISO-8601 rendering truncated to whole seconds, with `T` separator.
    pub fn iso_seconds(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

impl FromStr for ObsTime {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ACCEPTED_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .map(ObsTime)
            .ok_or_else(|| SequenceError::InvalidTimestamp {
                value: s.to_string(),
            })
    }
}

impl fmt::Display for ObsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DISPLAY_FORMAT))
    }
}

impl From<NaiveDateTime> for ObsTime {
    fn from(value: NaiveDateTime) -> Self {
        Self(value)
    }
}

impl Serialize for ObsTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObsTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepted_formats() {
        let a: ObsTime = "2027-01-25 00:00:00".parse().expect("space separator");
        let b: ObsTime = "2027-01-25T00:00:00".parse().expect("T separator");
        assert_eq!(a, b);

        let c: ObsTime = "2027-01-25 00:00:01.5".parse().expect("fractional seconds");
        assert!(c > a);

        assert!("25/01/2027".parse::<ObsTime>().is_err());
    }

    #[test]
    fn test_mjd_epoch_and_known_date() {
        let epoch: ObsTime = "1858-11-17 00:00:00".parse().expect("epoch");
        assert_eq!(epoch.mjd(), 0.0);

        let j2000: ObsTime = "2000-01-01 12:00:00".parse().expect("j2000");
        assert!((j2000.mjd() - 51544.5).abs() < 1e-9);
    }

    #[test]
    fn test_display_omits_zero_fraction() {
        let t: ObsTime = "2027-01-01T00:00:02.2".parse().expect("parse");
        assert_eq!(t.to_string(), "2027-01-01 00:00:02.200");
        assert_eq!(t.iso_seconds(), "2027-01-01T00:00:02");

        let whole: ObsTime = "2027-01-01 00:00:02".parse().expect("parse");
        assert_eq!(whole.to_string(), "2027-01-01 00:00:02");
    }
}
