use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::FixedOffset;
use mentor_core::Clock;
use mentor_core::model::{
    FieldErrors, MenteeCacheEntry, MenteeId, NextSession, ScheduleField, SessionDraft, SessionId,
    SessionStatus, ValidatedSession,
};
use storage::{CredentialStore, ScheduleCache};
use tracing::{info, warn};

use crate::api::{MentorshipApi, NewSessionPayload, SessionRecord};
use crate::error::SchedulingError;
use crate::mentees::MenteeListService;

/// A session the server accepted, as merged into local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledSession {
    pub mentee_id: MenteeId,
    pub session_id: SessionId,
    pub display: String,
    pub details: ValidatedSession,
}

/// Validates and submits new sessions, then merges the server's answer into
/// the mentee list and the schedule cache.
pub struct SchedulingService {
    api: Arc<dyn MentorshipApi>,
    credentials: CredentialStore,
    cache: Arc<ScheduleCache>,
    mentees: Arc<MenteeListService>,
    clock: Clock,
    offset: FixedOffset,
    form_errors: Mutex<FieldErrors>,
}

impl SchedulingService {
    #[must_use]
    pub fn new(
        api: Arc<dyn MentorshipApi>,
        credentials: CredentialStore,
        cache: Arc<ScheduleCache>,
        mentees: Arc<MenteeListService>,
        clock: Clock,
        offset: FixedOffset,
    ) -> Self {
        Self {
            api,
            credentials,
            cache,
            mentees,
            clock,
            offset,
            form_errors: Mutex::new(FieldErrors::new()),
        }
    }

    /// Blank form pre-filled with tomorrow and the next free half hour.
    #[must_use]
    pub fn form_defaults(&self) -> SessionDraft {
        SessionDraft::with_defaults(self.clock.wall_clock(self.offset))
    }

    /// Validation messages currently shown on the form.
    ///
    /// Failed submissions add to this set; a field's message only goes away
    /// when that field is edited or a submission succeeds.
    #[must_use]
    pub fn form_errors(&self) -> FieldErrors {
        self.lock_form_errors().clone()
    }

    /// Drop the message for a field the user has just edited.
    pub fn field_edited(&self, field: ScheduleField) {
        self.lock_form_errors().clear_field(field);
    }

    fn lock_form_errors(&self) -> MutexGuard<'_, FieldErrors> {
        self.form_errors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedule a session for a mentee.
    ///
    /// Nothing is sent when validation fails, and nothing local changes when
    /// the server rejects the request.
    ///
    /// # Errors
    ///
    /// Returns `SchedulingError::Validation` with field-keyed messages,
    /// `UnknownMentee` / `MissingCredential` for missing context, or `Api` with
    /// the server's message.
    pub async fn schedule_session(
        &self,
        mentee_id: &MenteeId,
        draft: &SessionDraft,
    ) -> Result<ScheduledSession, SchedulingError> {
        let details = match draft.validate(self.clock.wall_clock(self.offset)) {
            Ok(details) => details,
            Err(fresh) => {
                let mut shown = self.lock_form_errors();
                shown.absorb(fresh);
                return Err(SchedulingError::Validation(shown.clone()));
            }
        };

        let mentee = self
            .mentees
            .find(mentee_id)
            .await
            .ok_or_else(|| SchedulingError::UnknownMentee(mentee_id.to_string()))?;
        let token = self
            .credentials
            .token()
            .await?
            .ok_or(SchedulingError::MissingCredential)?;

        let payload = NewSessionPayload::from(&details);
        let record = self
            .api
            .create_session(&token, mentee.mentorship_id(), &payload)
            .await
            .inspect_err(|err| {
                warn!(error = %err, mentee = %mentee_id, "Failed to schedule session");
            })?;

        let label = details.display();
        self.mentees
            .apply_scheduled(
                mentee_id,
                NextSession {
                    display: label.clone(),
                    session_id: Some(record.id.clone()),
                    date: Some(details.date),
                    end_time: Some(details.end_time),
                    completed: false,
                },
            )
            .await;

        let mut entry = MenteeCacheEntry::scheduled(
            label.clone(),
            record.id.clone(),
            details.date,
            details.end_time,
        );
        entry.request_status = mentee.request_status().map(str::to_owned);
        if let Err(err) = self.cache.set(mentee_id, entry, self.clock.now()).await {
            warn!(error = %err, mentee = %mentee_id, "Failed to cache scheduled session");
        }

        *self.lock_form_errors() = FieldErrors::new();
        info!(mentee = %mentee_id, session = %record.id, when = %label, "Session scheduled");
        Ok(ScheduledSession {
            mentee_id: mentee_id.clone(),
            session_id: record.id,
            display: label,
            details,
        })
    }

    /// Cancel an upcoming session.
    ///
    /// # Errors
    ///
    /// Returns `SchedulingError::Status` if the session is already known to be
    /// completed, `MissingCredential` without a token, or `Api` when the
    /// server rejects the change.
    pub async fn cancel_session(
        &self,
        mentee_id: &MenteeId,
        session: &SessionId,
    ) -> Result<SessionRecord, SchedulingError> {
        let known_status = self
            .mentees
            .find(mentee_id)
            .await
            .and_then(|m| m.next_session().cloned())
            .filter(|next| next.session_id.as_ref() == Some(session))
            .map_or(SessionStatus::Upcoming, |next| {
                if next.completed {
                    SessionStatus::Completed
                } else {
                    SessionStatus::Upcoming
                }
            });
        let target = known_status.cancel()?;

        let token = self
            .credentials
            .token()
            .await?
            .ok_or(SchedulingError::MissingCredential)?;
        let record = self
            .api
            .update_session_status(&token, session, target)
            .await
            .inspect_err(|err| {
                warn!(error = %err, %session, "Failed to cancel session");
            })?;

        self.mentees.clear_next_session_if(mentee_id, session).await;
        match self.cache.get(mentee_id).await {
            Ok(Some(entry)) if entry.session_id.as_ref() == Some(session) => {
                if let Err(err) = self.cache.remove(mentee_id).await {
                    warn!(error = %err, mentee = %mentee_id, "Failed to drop cancelled session from cache");
                }
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, mentee = %mentee_id, "Failed to read schedule cache"),
        }

        info!(mentee = %mentee_id, %session, "Session cancelled");
        Ok(record)
    }
}
