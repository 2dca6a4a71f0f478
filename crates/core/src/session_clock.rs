//! Decides whether a session's end instant has passed.

use chrono::{NaiveDate, NaiveDateTime};

use crate::model::{TimeOfDay, parse_session_date};

/// `true` iff `now` is at or past `date` at `end_time` (seconds zeroed).
///
/// Missing data never counts as ended.
#[must_use]
pub fn has_session_ended(
    date: Option<NaiveDate>,
    end_time: Option<TimeOfDay>,
    now: NaiveDateTime,
) -> bool {
    match (date, end_time) {
        (Some(date), Some(end_time)) => now >= end_time.on(date),
        _ => false,
    }
}

/// String form of [`has_session_ended`] for values read from storage or the
/// wire. Unparseable input is treated as missing.
#[must_use]
pub fn has_session_ended_raw(
    date: Option<&str>,
    end_time: Option<&str>,
    now: NaiveDateTime,
) -> bool {
    let date = date.and_then(parse_session_date);
    let end_time = end_time.and_then(|raw| raw.parse::<TimeOfDay>().ok());
    has_session_ended(date, end_time, now)
}
