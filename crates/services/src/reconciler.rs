use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mentor_core::model::{BearerToken, SessionId, SessionStatus};
use storage::CredentialStore;
use tracing::{debug, info, warn};

use crate::api::{CompletionCounts, MentorshipApi, SessionRecord};

/// Applies `upcoming → completed` transitions for sessions whose end time has
/// passed. Every entry point swallows failures so it can run unattended.
pub struct CompletionReconciler {
    api: Arc<dyn MentorshipApi>,
    credentials: CredentialStore,
    busy: AtomicBool,
}

impl CompletionReconciler {
    #[must_use]
    pub fn new(api: Arc<dyn MentorshipApi>, credentials: CredentialStore) -> Self {
        Self {
            api,
            credentials,
            busy: AtomicBool::new(false),
        }
    }

    /// Ask the server to sweep ended sessions and report its counts.
    ///
    /// Without a stored token this returns zero counts and makes no request.
    pub async fn check_completed_sessions(&self) -> CompletionCounts {
        let Some(token) = self.current_token().await else {
            debug!("No credential stored; skipping completed-session sweep");
            return CompletionCounts::zero();
        };

        match self.api.check_completed_sessions(&token).await {
            Ok(counts) => {
                if counts.updated > 0 || counts.failed > 0 {
                    info!(
                        updated = counts.updated,
                        failed = counts.failed,
                        "Completed-session sweep applied updates"
                    );
                }
                counts
            }
            Err(err) => {
                warn!(error = %err, "Completed-session sweep failed");
                CompletionCounts::zero()
            }
        }
    }

    /// [`Self::check_completed_sessions`] unless a previous call is still in
    /// flight, in which case this returns `None` immediately.
    pub async fn run_guarded(&self) -> Option<CompletionCounts> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Completed-session sweep already running; skipping");
            return None;
        }
        let _reset = BusyReset(&self.busy);
        Some(self.check_completed_sessions().await)
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Mark one session completed on the server.
    ///
    /// Failures are logged and yield `None`.
    pub async fn mark_session_completed(&self, session: &SessionId) -> Option<SessionRecord> {
        let Some(token) = self.current_token().await else {
            debug!(%session, "No credential stored; cannot mark session completed");
            return None;
        };

        match self
            .api
            .update_session_status(&token, session, SessionStatus::Completed)
            .await
        {
            Ok(record) => {
                info!(%session, "Session marked completed");
                Some(record)
            }
            Err(err) => {
                warn!(error = %err, %session, "Failed to mark session completed");
                None
            }
        }
    }

    async fn current_token(&self) -> Option<BearerToken> {
        match self.credentials.token().await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "Failed to read stored credential");
                None
            }
        }
    }
}

/// Clears the busy flag when a guarded run finishes or is dropped mid-flight.
struct BusyReset<'a>(&'a AtomicBool);

impl Drop for BusyReset<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
