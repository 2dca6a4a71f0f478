mod auth;
mod cache_entry;
mod ids;
mod mentee;
pub mod schedule;
pub mod session;
mod time_of_day;

pub use auth::BearerToken;
pub use cache_entry::MenteeCacheEntry;
pub use ids::{MenteeId, MentorshipId, ParseIdError, SessionId};
pub use mentee::{Mentee, NextSession, progress_percent};
pub use schedule::{
    DEFAULT_SESSION_MINUTES, FieldErrors, ScheduleField, SessionDraft, ValidatedSession,
};
pub use session::{Session, SessionStatus, SessionStatusError, parse_session_date};
pub use time_of_day::{TimeOfDay, TimeOfDayError};
