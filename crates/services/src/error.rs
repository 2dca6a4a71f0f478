//! Shared error types for the services crate.

use thiserror::Error;

use mentor_core::model::{FieldErrors, SessionStatusError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Errors emitted by the backend client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("request failed with status {status}: {message}")]
    Server {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("API base URL cannot carry a path")]
    InvalidBaseUrl,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `SchedulingService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchedulingError {
    #[error("invalid session details: {0}")]
    Validation(FieldErrors),
    #[error("not signed in")]
    MissingCredential,
    #[error("unknown mentee: {0}")]
    UnknownMentee(String),
    #[error(transparent)]
    Status(#[from] SessionStatusError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SchedulingError {
    /// Message suitable for an alert or toast.
    ///
    /// Server rejections surface the server's own message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            SchedulingError::Api(ApiError::Server { message, .. }) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Errors emitted by `MenteeListService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MenteeListError {
    #[error("not signed in")]
    MissingCredential,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
