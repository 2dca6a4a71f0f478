use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{MenteeId, SessionId, TimeOfDay};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStatusError {
    #[error("session is already {0} and cannot change")]
    Terminal(SessionStatus),

    #[error("unknown session status: {0}")]
    Unknown(String),
}

/// Lifecycle of a mentorship session.
///
/// `Upcoming` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Upcoming,
    Completed,
    Cancelled,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Upcoming => "upcoming",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Upcoming)
    }

    /// `upcoming → completed`.
    ///
    /// # Errors
    ///
    /// Returns `SessionStatusError::Terminal` from any terminal state.
    pub fn complete(self) -> Result<Self, SessionStatusError> {
        self.transition_to(SessionStatus::Completed)
    }

    /// `upcoming → cancelled`.
    ///
    /// # Errors
    ///
    /// Returns `SessionStatusError::Terminal` from any terminal state.
    pub fn cancel(self) -> Result<Self, SessionStatusError> {
        self.transition_to(SessionStatus::Cancelled)
    }

    fn transition_to(self, next: SessionStatus) -> Result<Self, SessionStatusError> {
        if self.is_terminal() {
            return Err(SessionStatusError::Terminal(self));
        }
        Ok(next)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = SessionStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(SessionStatus::Upcoming),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            other => Err(SessionStatusError::Unknown(other.to_owned())),
        }
    }
}

/// Client-side mirror of a server-owned session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub mentee_id: Option<MenteeId>,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub topic: Option<String>,
    pub location: Option<String>,
    pub meeting_link: Option<String>,
    pub status: SessionStatus,
}

impl Session {
    /// Instant the session ends, in naive local time.
    #[must_use]
    pub fn ends_at(&self) -> NaiveDateTime {
        self.end_time.on(self.date)
    }
}

/// Parses the date formats the backend emits: `YYYY-MM-DD` or a full
/// RFC 3339 timestamp, whose calendar date is kept as written.
#[must_use]
pub fn parse_session_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.date_naive())
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upcoming_can_complete_or_cancel() {
        assert_eq!(
            SessionStatus::Upcoming.complete(),
            Ok(SessionStatus::Completed)
        );
        assert_eq!(
            SessionStatus::Upcoming.cancel(),
            Ok(SessionStatus::Cancelled)
        );
    }

    #[test]
    fn terminal_states_reject_transitions() {
        assert_eq!(
            SessionStatus::Completed.cancel(),
            Err(SessionStatusError::Terminal(SessionStatus::Completed))
        );
        assert_eq!(
            SessionStatus::Cancelled.complete(),
            Err(SessionStatusError::Terminal(SessionStatus::Cancelled))
        );
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            SessionStatus::Upcoming,
            SessionStatus::Completed,
            SessionStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>(), Ok(status));
        }
        assert!("done".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn parses_plain_and_iso_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(parse_session_date("2024-03-09"), Some(expected));
        assert_eq!(
            parse_session_date("2024-03-09T00:00:00.000Z"),
            Some(expected)
        );
        assert_eq!(parse_session_date("2024-03-09T10:15:00"), Some(expected));
        assert_eq!(parse_session_date("next tuesday"), None);
        assert_eq!(parse_session_date(""), None);
    }
}
