use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TimeOfDayError {
    #[error("time must use the 24-hour HH:MM format")]
    InvalidFormat,
}

/// Wall-clock time of day with minute precision (`HH:MM`, 24-hour).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Builds a time of day from components.
    ///
    /// # Errors
    ///
    /// Returns `TimeOfDayError::InvalidFormat` when hour > 23 or minute > 59.
    pub fn new(hour: u8, minute: u8) -> Result<Self, TimeOfDayError> {
        if hour > 23 || minute > 59 {
            return Err(TimeOfDayError::InvalidFormat);
        }
        Ok(Self { hour, minute })
    }

    /// Truncates a `NaiveTime` to minute precision.
    #[must_use]
    pub fn from_naive(time: NaiveTime) -> Self {
        // hour() < 24 and minute() < 60 always fit in u8
        Self {
            hour: u8::try_from(time.hour()).unwrap_or(0),
            minute: u8::try_from(time.minute()).unwrap_or(0),
        }
    }

    #[must_use]
    pub fn hour(&self) -> u8 {
        self.hour
    }

    #[must_use]
    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Minutes elapsed since midnight.
    #[must_use]
    pub fn minutes_since_midnight(&self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.minute)
    }

    /// Adds minutes, wrapping around midnight.
    ///
    /// `23:45 + 60` yields `00:45`; the calendar date is not carried.
    #[must_use]
    pub fn plus_minutes(&self, minutes: u32) -> Self {
        let total = (self.minutes_since_midnight() + minutes % MINUTES_PER_DAY) % MINUTES_PER_DAY;
        Self {
            hour: u8::try_from(total / 60).unwrap_or(0),
            minute: u8::try_from(total % 60).unwrap_or(0),
        }
    }

    #[must_use]
    pub fn to_naive(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }

    /// Combines with a calendar date; seconds are always zero.
    #[must_use]
    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.to_naive())
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeOfDayError;

    /// Accepts `H:MM` or `HH:MM` with hour 0-23 and minute 00-59.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = s
            .trim()
            .split_once(':')
            .ok_or(TimeOfDayError::InvalidFormat)?;

        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(hour) || !digits(minute) || hour.len() > 2 || minute.len() != 2 {
            return Err(TimeOfDayError::InvalidFormat);
        }

        let hour: u8 = hour.parse().map_err(|_| TimeOfDayError::InvalidFormat)?;
        let minute: u8 = minute.parse().map_err(|_| TimeOfDayError::InvalidFormat)?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl fmt::Debug for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeOfDay({self})")
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
