use chrono::NaiveDate;

use crate::model::{MenteeCacheEntry, MenteeId, MentorshipId, SessionId, TimeOfDay};

/// Percentage of completed sessions, `round(min(100, completed / total * 100))`.
///
/// Returns 0 when no sessions are planned.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn progress_percent(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let ratio = f64::from(completed) / f64::from(total) * 100.0;
    // clamped to 0..=100 before the cast
    ratio.min(100.0).round() as u8
}

/// The next session known for a mentee, either from the server or from the
/// local schedule cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextSession {
    pub display: String,
    pub session_id: Option<SessionId>,
    pub date: Option<NaiveDate>,
    pub end_time: Option<TimeOfDay>,
    pub completed: bool,
}

/// View model for one mentee row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mentee {
    id: MenteeId,
    mentorship_id: MentorshipId,
    name: String,
    email: Option<String>,
    request_status: Option<String>,
    sessions_completed: u32,
    total_sessions: u32,
    progress: u8,
    next_session: Option<NextSession>,
}

impl Mentee {
    #[must_use]
    pub fn new(
        id: MenteeId,
        mentorship_id: MentorshipId,
        name: impl Into<String>,
        sessions_completed: u32,
        total_sessions: u32,
    ) -> Self {
        Self {
            id,
            mentorship_id,
            name: name.into(),
            email: None,
            request_status: None,
            sessions_completed,
            total_sessions,
            progress: progress_percent(sessions_completed, total_sessions),
            next_session: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    #[must_use]
    pub fn with_request_status(mut self, status: Option<String>) -> Self {
        self.request_status = status;
        self
    }

    #[must_use]
    pub fn with_next_session(mut self, next: Option<NextSession>) -> Self {
        self.next_session = next;
        self
    }

    #[must_use]
    pub fn id(&self) -> &MenteeId {
        &self.id
    }

    #[must_use]
    pub fn mentorship_id(&self) -> &MentorshipId {
        &self.mentorship_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn request_status(&self) -> Option<&str> {
        self.request_status.as_deref()
    }

    #[must_use]
    pub fn sessions_completed(&self) -> u32 {
        self.sessions_completed
    }

    #[must_use]
    pub fn total_sessions(&self) -> u32 {
        self.total_sessions
    }

    #[must_use]
    pub fn progress(&self) -> u8 {
        self.progress
    }

    #[must_use]
    pub fn next_session(&self) -> Option<&NextSession> {
        self.next_session.as_ref()
    }

    /// Counts one more completed session, marks the next session completed,
    /// and recomputes progress.
    pub fn record_completed_session(&mut self) {
        self.sessions_completed = self.sessions_completed.saturating_add(1);
        self.progress = progress_percent(self.sessions_completed, self.total_sessions);
        if let Some(next) = self.next_session.as_mut() {
            next.completed = true;
        }
    }

    /// Overlays a locally cached schedule onto this row.
    ///
    /// The cache only wins when it names a session the server row does not
    /// already carry, or when the server row has no next session at all.
    pub fn apply_cache_entry(&mut self, entry: &MenteeCacheEntry) {
        let same_session = self
            .next_session
            .as_ref()
            .and_then(|next| next.session_id.as_ref())
            .is_some_and(|id| entry.session_id.as_ref() == Some(id));

        if same_session {
            if let Some(next) = self.next_session.as_mut() {
                next.completed |= entry.completed;
            }
        } else {
            self.next_session = Some(entry.to_next_session());
        }

        if self.request_status.is_none() {
            self.request_status.clone_from(&entry.request_status);
        }
    }

    /// Replaces the next session after a successful scheduling round-trip.
    pub fn set_next_session(&mut self, next: NextSession) {
        self.next_session = Some(next);
    }

    /// Forget the next session, e.g. after it was cancelled.
    pub fn clear_next_session(&mut self) {
        self.next_session = None;
    }

    /// Whether the next session has a complete end instant and is not yet
    /// marked completed.
    #[must_use]
    pub fn pending_session_end(&self) -> Option<(NaiveDate, TimeOfDay)> {
        let next = self.next_session.as_ref()?;
        if next.completed {
            return None;
        }
        Some((next.date?, next.end_time?))
    }
}
