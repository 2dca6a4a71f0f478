use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{NextSession, SessionId, TimeOfDay, parse_session_date};

/// Locally persisted record of the most recently scheduled session for one
/// mentee.
///
/// Date and time are kept as the raw strings written at scheduling time so a
/// single malformed entry never poisons the whole persisted map; the typed
/// accessors return `None` for anything unparseable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenteeCacheEntry {
    #[serde(default)]
    pub next_session: String,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub raw_date: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub request_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
}

impl MenteeCacheEntry {
    /// Entry for a freshly scheduled, not yet completed session.
    #[must_use]
    pub fn scheduled(
        display: impl Into<String>,
        session_id: SessionId,
        date: NaiveDate,
        end_time: TimeOfDay,
    ) -> Self {
        Self {
            next_session: display.into(),
            session_id: Some(session_id),
            raw_date: Some(date.format("%Y-%m-%d").to_string()),
            end_time: Some(end_time.to_string()),
            completed: false,
            request_status: None,
            cached_at: None,
        }
    }

    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        self.raw_date.as_deref().and_then(parse_session_date)
    }

    #[must_use]
    pub fn end_time_of_day(&self) -> Option<TimeOfDay> {
        self.end_time.as_deref().and_then(|raw| raw.parse().ok())
    }

    #[must_use]
    pub fn to_next_session(&self) -> NextSession {
        NextSession {
            display: self.next_session.clone(),
            session_id: self.session_id.clone(),
            date: self.date(),
            end_time: self.end_time_of_day(),
            completed: self.completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_keys() {
        let entry = MenteeCacheEntry::scheduled(
            "3/10/2024 at 14:00",
            SessionId::new("s9"),
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            "15:00".parse().unwrap(),
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["nextSession"], "3/10/2024 at 14:00");
        assert_eq!(value["sessionId"], "s9");
        assert_eq!(value["rawDate"], "2024-03-10");
        assert_eq!(value["endTime"], "15:00");
        assert_eq!(value["completed"], false);
        assert!(value.get("cachedAt").is_none());
    }

    #[test]
    fn tolerates_missing_and_malformed_fields() {
        let entry: MenteeCacheEntry =
            serde_json::from_str(r#"{"nextSession":"soon","endTime":"late"}"#).unwrap();
        assert_eq!(entry.next_session, "soon");
        assert!(entry.end_time_of_day().is_none());
        assert!(entry.date().is_none());
        assert!(!entry.completed);
    }
}
