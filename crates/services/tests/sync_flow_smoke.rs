use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::FixedOffset;
use mentor_core::model::{BearerToken, MenteeId, MentorshipId, SessionDraft, SessionId, SessionStatus};
use mentor_core::time::fixed_now;
use services::config::{ApiConfig, PollingConfig, SyncConfig};
use services::{
    AppServices, ApiError, Clock, CompletionCounts, MenteeRecord, MentorshipApi, NewSessionPayload,
    SessionRecord,
};
use storage::Storage;

/// Backend stand-in holding one mentee and remembering status changes.
#[derive(Default)]
struct Backend {
    sweeps: AtomicUsize,
    completed: Mutex<Vec<SessionId>>,
}

fn record(id: SessionId, status: SessionStatus) -> SessionRecord {
    serde_json::from_value(serde_json::json!({ "_id": id.as_str(), "status": status.as_str() }))
        .unwrap()
}

#[async_trait]
impl MentorshipApi for Backend {
    async fn list_mentees(&self, _token: &BearerToken) -> Result<Vec<MenteeRecord>, ApiError> {
        Ok(vec![serde_json::from_value(serde_json::json!({
            "_id": "mentee-1",
            "mentorshipId": "ms-1",
            "name": "Ada",
            "requestStatus": "accepted",
            "sessionsCompleted": 2,
            "totalSessions": 8
        }))
        .unwrap()])
    }

    async fn check_completed_sessions(
        &self,
        _token: &BearerToken,
    ) -> Result<CompletionCounts, ApiError> {
        self.sweeps.fetch_add(1, Ordering::SeqCst);
        Ok(CompletionCounts::zero())
    }

    async fn update_session_status(
        &self,
        _token: &BearerToken,
        session: &SessionId,
        status: SessionStatus,
    ) -> Result<SessionRecord, ApiError> {
        if status == SessionStatus::Completed {
            self.completed.lock().unwrap().push(session.clone());
        }
        Ok(record(session.clone(), status))
    }

    async fn create_session(
        &self,
        _token: &BearerToken,
        _mentorship: &MentorshipId,
        _payload: &NewSessionPayload,
    ) -> Result<SessionRecord, ApiError> {
        Ok(record(SessionId::new("session-42"), SessionStatus::Upcoming))
    }
}

fn config() -> SyncConfig {
    SyncConfig {
        api: ApiConfig::new("http://localhost:5000").unwrap(),
        polling: PollingConfig::default(),
        cache_ttl: chrono::Duration::days(14),
    }
}

async fn signed_in_storage() -> Storage {
    let storage = Storage::in_memory();
    storage
        .credentials
        .store_token(&BearerToken::new("token-abc").unwrap())
        .await
        .unwrap();
    storage
}

fn services_at(storage: &Storage, backend: &Arc<Backend>, clock: Clock) -> AppServices {
    let utc = FixedOffset::east_opt(0).unwrap();
    AppServices::from_parts(storage.clone(), backend.clone(), &config(), clock, utc)
}

#[tokio::test]
async fn schedule_then_poll_completes_session_once() {
    let backend = Arc::new(Backend::default());
    let mut clock = Clock::fixed(fixed_now());
    let storage = signed_in_storage().await;
    let services = services_at(&storage, &backend, clock);
    let mentee = MenteeId::new("mentee-1");

    assert_eq!(services.mentees().fetch().await.unwrap().len(), 1);
    let draft = SessionDraft {
        title: "Intro".into(),
        description: "First chat".into(),
        date: "2023-11-15".into(),
        time: "09:00".into(),
        meeting_link: String::new(),
    };
    let scheduled = services
        .scheduling()
        .schedule_session(&mentee, &draft)
        .await
        .unwrap();
    assert_eq!(scheduled.display, "11/15/2023 at 09:00");

    // The services hold their own copy of the clock, so rebuild over the
    // same storage once the session is over.
    clock.advance(chrono::Duration::days(1));
    let later = services_at(&storage, &backend, clock);
    let rows = later.mentees().fetch().await.unwrap();
    assert_eq!(
        rows[0].next_session().and_then(|n| n.session_id.clone()),
        Some(SessionId::new("session-42"))
    );

    let report = later.mentees().check_cached_sessions().await;
    assert_eq!(report.completed, vec![mentee.clone()]);
    assert!(later.mentees().check_cached_sessions().await.completed.is_empty());

    let row = later.mentees().find(&mentee).await.unwrap();
    assert_eq!(row.sessions_completed(), 3);
    assert_eq!(row.progress(), 38);
    assert_eq!(backend.completed.lock().unwrap().len(), 1);
    assert!(later.schedules().get(&mentee).await.unwrap().unwrap().completed);
}

#[tokio::test]
async fn watcher_completes_session_booked_by_another_instance() {
    let backend = Arc::new(Backend::default());
    let storage = signed_in_storage().await;
    let mentee = MenteeId::new("mentee-1");

    let mut watcher_clock = Clock::fixed(fixed_now());
    watcher_clock.advance(chrono::Duration::days(1));
    let watcher = services_at(&storage, &backend, watcher_clock);
    watcher.mentees().fetch().await.unwrap();

    let booker = services_at(&storage, &backend, Clock::fixed(fixed_now()));
    booker.mentees().fetch().await.unwrap();
    let draft = SessionDraft {
        title: "Intro".into(),
        description: "First chat".into(),
        date: "2023-11-15".into(),
        time: "09:00".into(),
        meeting_link: String::new(),
    };
    let scheduled = booker
        .scheduling()
        .schedule_session(&mentee, &draft)
        .await
        .unwrap();

    let report = watcher.mentees().check_cached_sessions().await;

    assert_eq!(report.completed, vec![mentee.clone()]);
    assert_eq!(
        backend.completed.lock().unwrap().as_slice(),
        &[scheduled.session_id]
    );
    assert!(storage.schedules.get(&mentee).await.unwrap().unwrap().completed);
    assert_eq!(
        watcher.mentees().find(&mentee).await.unwrap().sessions_completed(),
        3
    );
}

#[tokio::test(start_paused = true)]
async fn polling_driver_sweeps_immediately_and_stops_cleanly() {
    let backend = Arc::new(Backend::default());
    let storage = signed_in_storage().await;
    let services = services_at(&storage, &backend, Clock::fixed(fixed_now()));

    let driver = services.start_polling();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(backend.sweeps.load(Ordering::SeqCst), 1);
    assert!(driver.is_running());

    tokio::time::sleep(Duration::from_secs(5 * 60)).await;
    assert_eq!(backend.sweeps.load(Ordering::SeqCst), 2);

    driver.shutdown().await;
    tokio::time::sleep(Duration::from_secs(60 * 60)).await;
    assert_eq!(backend.sweeps.load(Ordering::SeqCst), 2);
}
