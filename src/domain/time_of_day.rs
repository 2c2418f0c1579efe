//! Time of day (hour:minute, no date) used to schedule publications.
//!
//! Stored and displayed as zero-padded `HH:MM`. Parsing accepts `H:MM`, `HH:M`, etc.

use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Returns None when hour is outside [0,23] or minute outside [0,59].
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Wall-clock time of day of `now`, truncated to the minute.
    pub fn of(now: &DateTime<FixedOffset>) -> Self {
        Self {
            hour: now.hour() as u8,
            minute: now.minute() as u8,
        }
    }

    /// Parse `HH:MM` (24-hour). Each part is one or two ASCII digits; surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Result<Self, TimeParseError> {
        let s = input.trim();
        let (h, m) = s.split_once(':').ok_or(TimeParseError::Format)?;
        let hour = parse_part(h)?;
        let minute = parse_part(m)?;
        Self::new(hour, minute).ok_or(TimeParseError::OutOfRange { hour, minute })
    }
}

fn parse_part(part: &str) -> Result<u8, TimeParseError> {
    if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimeParseError::Format);
    }
    part.parse().map_err(|_| TimeParseError::Format)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimeParseError {
    #[error("expected HH:MM")]
    Format,
    #[error("{hour:02}:{minute:02} is not a valid time (hour 0-23, minute 0-59)")]
    OutOfRange { hour: u8, minute: u8 },
}

impl FromStr for TimeOfDay {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
