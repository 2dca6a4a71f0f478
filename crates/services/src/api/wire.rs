use mentor_core::model::{
    Mentee, MenteeId, MentorshipId, NextSession, Session, SessionId, SessionStatus, TimeOfDay,
    ValidatedSession, parse_session_date, schedule::format_next_session,
};
use serde::{Deserialize, Serialize};

/// Counts reported by the server's completion sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCounts {
    #[serde(default)]
    pub updated: u32,
    #[serde(default)]
    pub failed: u32,
}

impl CompletionCounts {
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Body of the session creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionPayload {
    pub title: String,
    pub description: String,
    pub date: String,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
}

impl From<&ValidatedSession> for NewSessionPayload {
    fn from(session: &ValidatedSession) -> Self {
        Self {
            title: session.title.clone(),
            description: session.description.clone(),
            date: session.date.format("%Y-%m-%d").to_string(),
            start_time: session.start_time,
            end_time: session.end_time,
            meeting_link: session.meeting_link.clone(),
        }
    }
}

/// Session as returned by the server. Only the id is guaranteed; the rest
/// is echoed back by most endpoints but not relied upon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(alias = "_id")]
    pub id: SessionId,
    #[serde(default)]
    pub mentee_id: Option<MenteeId>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub status: SessionStatus,
}

impl SessionRecord {
    /// Typed session, when the record carries a parseable date and times.
    #[must_use]
    pub fn to_session(&self) -> Option<Session> {
        Some(Session {
            id: self.id.clone(),
            mentee_id: self.mentee_id.clone(),
            date: parse_session_date(self.date.as_deref()?)?,
            start_time: self.start_time.as_deref()?.parse().ok()?,
            end_time: self.end_time.as_deref()?.parse().ok()?,
            topic: self.topic.clone(),
            location: self.location.clone(),
            meeting_link: self.meeting_link.clone(),
            status: self.status,
        })
    }
}

/// Responses arrive either bare or wrapped in a `session` field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SessionEnvelope {
    Wrapped { session: SessionRecord },
    Bare(SessionRecord),
}

impl SessionEnvelope {
    pub(crate) fn into_record(self) -> SessionRecord {
        match self {
            SessionEnvelope::Wrapped { session } | SessionEnvelope::Bare(session) => session,
        }
    }
}

/// One row of the mentee list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenteeRecord {
    #[serde(alias = "_id")]
    pub id: MenteeId,
    pub mentorship_id: MentorshipId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub request_status: Option<String>,
    #[serde(default)]
    pub sessions_completed: u32,
    #[serde(default)]
    pub total_sessions: u32,
    #[serde(default)]
    pub next_session_id: Option<SessionId>,
    #[serde(default)]
    pub next_session_date: Option<String>,
    #[serde(default)]
    pub next_session_time: Option<String>,
    #[serde(default)]
    pub next_session_end_time: Option<String>,
    #[serde(default)]
    pub next_session_status: Option<SessionStatus>,
}

impl MenteeRecord {
    #[must_use]
    pub fn into_mentee(self) -> Mentee {
        let next = self.next_session();
        Mentee::new(
            self.id,
            self.mentorship_id,
            self.name,
            self.sessions_completed,
            self.total_sessions,
        )
        .with_email(self.email)
        .with_request_status(self.request_status)
        .with_next_session(next)
    }

    fn next_session(&self) -> Option<NextSession> {
        if matches!(self.next_session_status, Some(SessionStatus::Cancelled)) {
            return None;
        }
        let date = self.next_session_date.as_deref().and_then(parse_session_date);
        let start: Option<TimeOfDay> = self
            .next_session_time
            .as_deref()
            .and_then(|raw| raw.parse().ok());
        let end_time = self
            .next_session_end_time
            .as_deref()
            .and_then(|raw| raw.parse().ok());
        if date.is_none() && self.next_session_id.is_none() {
            return None;
        }

        let display = match (date, start) {
            (Some(date), Some(start)) => format_next_session(date, start),
            (Some(date), None) => date.format("%-m/%-d/%Y").to_string(),
            _ => String::new(),
        };

        Some(NextSession {
            display,
            session_id: self.next_session_id.clone(),
            date,
            end_time,
            completed: matches!(self.next_session_status, Some(SessionStatus::Completed)),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum MenteeListEnvelope {
    Wrapped { mentees: Vec<MenteeRecord> },
    Bare(Vec<MenteeRecord>),
}

impl MenteeListEnvelope {
    pub(crate) fn into_records(self) -> Vec<MenteeRecord> {
        match self {
            MenteeListEnvelope::Wrapped { mentees } | MenteeListEnvelope::Bare(mentees) => mentees,
        }
    }
}
