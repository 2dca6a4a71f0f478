use std::sync::Arc;

use chrono::FixedOffset;
use storage::repository::Storage;
use storage::{CredentialStore, ScheduleCache};

use crate::api::{HttpMentorshipApi, MentorshipApi};
use crate::config::{PollingConfig, SyncConfig};
use crate::error::AppServicesError;
use crate::mentees::MenteeListService;
use crate::polling::PollingDriver;
use crate::reconciler::CompletionReconciler;
use crate::scheduling::SchedulingService;
use crate::Clock;

/// Wires storage, the backend client and the sync services together.
#[derive(Clone)]
pub struct AppServices {
    credentials: CredentialStore,
    schedules: Arc<ScheduleCache>,
    polling: PollingConfig,
    reconciler: Arc<CompletionReconciler>,
    mentees: Arc<MenteeListService>,
    scheduling: Arc<SchedulingService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the HTTP backend client.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or HTTP client
    /// construction fails.
    pub async fn new_sqlite(
        db_url: &str,
        config: &SyncConfig,
        clock: Clock,
        offset: FixedOffset,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let api: Arc<dyn MentorshipApi> = Arc::new(HttpMentorshipApi::new(&config.api)?);
        Ok(Self::from_parts(storage, api, config, clock, offset))
    }

    /// Assemble services over an existing storage backend and API client.
    #[must_use]
    pub fn from_parts(
        storage: Storage,
        api: Arc<dyn MentorshipApi>,
        config: &SyncConfig,
        clock: Clock,
        offset: FixedOffset,
    ) -> Self {
        let storage = storage.with_cache_ttl(config.cache_ttl);
        let schedules = storage.schedules;
        let credentials = storage.credentials;

        let reconciler = Arc::new(CompletionReconciler::new(
            Arc::clone(&api),
            credentials.clone(),
        ));
        let mentees = Arc::new(MenteeListService::new(
            Arc::clone(&api),
            credentials.clone(),
            Arc::clone(&schedules),
            Arc::clone(&reconciler),
            clock,
            offset,
        ));
        let scheduling = Arc::new(SchedulingService::new(
            api,
            credentials.clone(),
            Arc::clone(&schedules),
            Arc::clone(&mentees),
            clock,
            offset,
        ));

        Self {
            credentials,
            schedules,
            polling: config.polling,
            reconciler,
            mentees,
            scheduling,
        }
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    #[must_use]
    pub fn schedules(&self) -> Arc<ScheduleCache> {
        Arc::clone(&self.schedules)
    }

    #[must_use]
    pub fn reconciler(&self) -> Arc<CompletionReconciler> {
        Arc::clone(&self.reconciler)
    }

    #[must_use]
    pub fn mentees(&self) -> Arc<MenteeListService> {
        Arc::clone(&self.mentees)
    }

    #[must_use]
    pub fn scheduling(&self) -> Arc<SchedulingService> {
        Arc::clone(&self.scheduling)
    }

    /// Start both background pollers with the configured periods.
    #[must_use]
    pub fn start_polling(&self) -> PollingDriver {
        PollingDriver::start(self.reconciler(), self.mentees(), self.polling)
    }
}
