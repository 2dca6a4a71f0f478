//! Backend REST surface used by the sync services.

mod http;
mod wire;

use async_trait::async_trait;
use mentor_core::model::{BearerToken, MentorshipId, SessionId, SessionStatus};

use crate::error::ApiError;

pub use http::HttpMentorshipApi;
pub use wire::{CompletionCounts, MenteeRecord, NewSessionPayload, SessionRecord};

/// Mentorship endpoints consumed by the client. Every call is authenticated
/// with the caller's bearer token.
#[async_trait]
pub trait MentorshipApi: Send + Sync {
    /// `GET /api/mentorship/mentees`
    async fn list_mentees(&self, token: &BearerToken) -> Result<Vec<MenteeRecord>, ApiError>;

    /// `GET /api/mentorship/sessions/check-completed`
    ///
    /// The server decides which sessions have ended and applies the
    /// `upcoming → completed` transitions itself.
    async fn check_completed_sessions(
        &self,
        token: &BearerToken,
    ) -> Result<CompletionCounts, ApiError>;

    /// `PUT /api/mentorship/sessions/:id` with `{"status": ...}`
    async fn update_session_status(
        &self,
        token: &BearerToken,
        session: &SessionId,
        status: SessionStatus,
    ) -> Result<SessionRecord, ApiError>;

    /// `POST /api/mentorship/:mentorshipId/sessions`
    async fn create_session(
        &self,
        token: &BearerToken,
        mentorship: &MentorshipId,
        payload: &NewSessionPayload,
    ) -> Result<SessionRecord, ApiError>;
}
