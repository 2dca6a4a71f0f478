use async_trait::async_trait;
use mentor_core::model::{BearerToken, MentorshipId, SessionId, SessionStatus};
use reqwest::{Client, Method, Request, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::wire::{MenteeListEnvelope, SessionEnvelope};
use super::{CompletionCounts, MenteeRecord, MentorshipApi, NewSessionPayload, SessionRecord};
use crate::config::ApiConfig;
use crate::error::ApiError;

/// `MentorshipApi` over HTTP with `reqwest`.
#[derive(Clone)]
pub struct HttpMentorshipApi {
    client: Client,
    base_url: Url,
}

impl HttpMentorshipApi {
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ApiError::InvalidBaseUrl)?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn authorized(
        &self,
        method: Method,
        segments: &[&str],
        token: &BearerToken,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "Preparing request");
        Ok(self.client.request(method, url).bearer_auth(token.expose()))
    }

    fn list_mentees_request(&self, token: &BearerToken) -> Result<Request, ApiError> {
        Ok(self
            .authorized(Method::GET, &["api", "mentorship", "mentees"], token)?
            .build()?)
    }

    fn check_completed_request(&self, token: &BearerToken) -> Result<Request, ApiError> {
        Ok(self
            .authorized(
                Method::GET,
                &["api", "mentorship", "sessions", "check-completed"],
                token,
            )?
            .build()?)
    }

    fn update_status_request(
        &self,
        token: &BearerToken,
        session: &SessionId,
        status: SessionStatus,
    ) -> Result<Request, ApiError> {
        Ok(self
            .authorized(
                Method::PUT,
                &["api", "mentorship", "sessions", session.as_str()],
                token,
            )?
            .json(&StatusUpdate { status })
            .build()?)
    }

    fn create_session_request(
        &self,
        token: &BearerToken,
        mentorship: &MentorshipId,
        payload: &NewSessionPayload,
    ) -> Result<Request, ApiError> {
        Ok(self
            .authorized(
                Method::POST,
                &["api", "mentorship", mentorship.as_str(), "sessions"],
                token,
            )?
            .json(payload)
            .build()?)
    }

    async fn send<T: DeserializeOwned>(&self, request: Request) -> Result<T, ApiError> {
        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(server_error(status, &body));
        }

        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Prefers the server's own `message`/`error` text over the status reason.
fn server_error(status: StatusCode, body: &[u8]) -> ApiError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    ApiError::Server { status, message }
}

#[derive(serde::Serialize)]
struct StatusUpdate {
    status: SessionStatus,
}

#[async_trait]
impl MentorshipApi for HttpMentorshipApi {
    async fn list_mentees(&self, token: &BearerToken) -> Result<Vec<MenteeRecord>, ApiError> {
        let envelope: MenteeListEnvelope = self.send(self.list_mentees_request(token)?).await?;
        Ok(envelope.into_records())
    }

    async fn check_completed_sessions(
        &self,
        token: &BearerToken,
    ) -> Result<CompletionCounts, ApiError> {
        self.send(self.check_completed_request(token)?).await
    }

    async fn update_session_status(
        &self,
        token: &BearerToken,
        session: &SessionId,
        status: SessionStatus,
    ) -> Result<SessionRecord, ApiError> {
        let request = self.update_status_request(token, session, status)?;
        let envelope: SessionEnvelope = self.send(request).await?;
        Ok(envelope.into_record())
    }

    async fn create_session(
        &self,
        token: &BearerToken,
        mentorship: &MentorshipId,
        payload: &NewSessionPayload,
    ) -> Result<SessionRecord, ApiError> {
        let request = self.create_session_request(token, mentorship, payload)?;
        let envelope: SessionEnvelope = self.send(request).await?;
        Ok(envelope.into_record())
    }
}
