#![forbid(unsafe_code)]

pub mod api;
pub mod app_services;
pub mod config;
pub mod error;
pub mod mentees;
pub mod polling;
pub mod reconciler;
pub mod scheduling;

#[cfg(test)]
mod test_harness;

pub use mentor_core::Clock;

pub use api::{
    CompletionCounts, HttpMentorshipApi, MenteeRecord, MentorshipApi, NewSessionPayload,
    SessionRecord,
};
pub use app_services::AppServices;
pub use config::{ApiConfig, PollingConfig, SyncConfig};
pub use error::{ApiError, AppServicesError, ConfigError, MenteeListError, SchedulingError};
pub use mentees::{LocalCheckReport, MenteeListService};
pub use polling::{PollTask, PollingDriver};
pub use reconciler::CompletionReconciler;
pub use scheduling::{ScheduledSession, SchedulingService};
