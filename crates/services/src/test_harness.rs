use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDateTime};
use mentor_core::Clock;
use mentor_core::model::{BearerToken, MentorshipId, SessionId, SessionStatus};
use mentor_core::time::fixed_now;
use reqwest::StatusCode;
use storage::repository::Storage;

use crate::api::{CompletionCounts, MenteeRecord, MentorshipApi, NewSessionPayload, SessionRecord};
use crate::error::ApiError;
use crate::mentees::MenteeListService;
use crate::reconciler::CompletionReconciler;
use crate::scheduling::SchedulingService;

/// Scriptable in-process stand-in for the backend.
#[derive(Default)]
pub(crate) struct FakeApi {
    pub(crate) calls: AtomicUsize,
    pub(crate) mentees: Mutex<Vec<MenteeRecord>>,
    pub(crate) sweeps: Mutex<VecDeque<CompletionCounts>>,
    pub(crate) created: Mutex<Vec<(MentorshipId, NewSessionPayload)>>,
    pub(crate) status_updates: Mutex<Vec<(SessionId, SessionStatus)>>,
    pub(crate) fail_reads: AtomicBool,
    pub(crate) fail_writes: AtomicBool,
}

impl FakeApi {
    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn set_mentees(&self, records: Vec<MenteeRecord>) {
        *self.mentees.lock().unwrap() = records;
    }

    pub(crate) fn push_sweep(&self, updated: u32, failed: u32) {
        self.sweeps
            .lock()
            .unwrap()
            .push_back(CompletionCounts { updated, failed });
    }

    fn unavailable() -> ApiError {
        ApiError::Server {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "backend down".into(),
        }
    }

    fn record(id: SessionId, status: SessionStatus) -> SessionRecord {
        SessionRecord {
            id,
            mentee_id: None,
            date: None,
            start_time: None,
            end_time: None,
            topic: None,
            location: None,
            meeting_link: None,
            status,
        }
    }
}

#[async_trait]
impl MentorshipApi for FakeApi {
    async fn list_mentees(&self, _token: &BearerToken) -> Result<Vec<MenteeRecord>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.mentees.lock().unwrap().clone())
    }

    async fn check_completed_sessions(
        &self,
        _token: &BearerToken,
    ) -> Result<CompletionCounts, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.sweeps.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn update_session_status(
        &self,
        _token: &BearerToken,
        session: &SessionId,
        status: SessionStatus,
    ) -> Result<SessionRecord, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.status_updates
            .lock()
            .unwrap()
            .push((session.clone(), status));
        Ok(Self::record(session.clone(), status))
    }

    async fn create_session(
        &self,
        _token: &BearerToken,
        mentorship: &MentorshipId,
        payload: &NewSessionPayload,
    ) -> Result<SessionRecord, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ApiError::Server {
                status: StatusCode::CONFLICT,
                message: "Mentor already booked at that time".into(),
            });
        }
        let mut created = self.created.lock().unwrap();
        created.push((mentorship.clone(), payload.clone()));
        let id = SessionId::new(format!("sess-{}", created.len()));
        Ok(Self::record(id, SessionStatus::Upcoming))
    }
}

pub(crate) fn mentee_record(id: &str, completed: u32, total: u32) -> MenteeRecord {
    MenteeRecord {
        id: id.parse().unwrap(),
        mentorship_id: MentorshipId::new(format!("ms-{id}")),
        name: format!("Mentee {id}"),
        email: None,
        request_status: Some("accepted".into()),
        sessions_completed: completed,
        total_sessions: total,
        next_session_id: None,
        next_session_date: None,
        next_session_time: None,
        next_session_end_time: None,
        next_session_status: None,
    }
}

pub(crate) struct Harness {
    pub(crate) api: Arc<FakeApi>,
    pub(crate) storage: Storage,
    pub(crate) reconciler: Arc<CompletionReconciler>,
    pub(crate) mentees: Arc<MenteeListService>,
    pub(crate) scheduling: SchedulingService,
}

impl Harness {
    /// Local wall-clock time of the fixed test clock (UTC offset).
    pub(crate) fn now(&self) -> NaiveDateTime {
        fixed_now().naive_utc()
    }
}

pub(crate) async fn harness(signed_in: bool) -> Harness {
    let api = Arc::new(FakeApi::default());
    let storage = Storage::in_memory();
    if signed_in {
        storage
            .credentials
            .store_token(&BearerToken::new("test-token").unwrap())
            .await
            .unwrap();
    }

    let clock = Clock::fixed(fixed_now());
    let utc = FixedOffset::east_opt(0).unwrap();
    let dyn_api: Arc<dyn MentorshipApi> = api.clone();
    let reconciler = Arc::new(CompletionReconciler::new(
        Arc::clone(&dyn_api),
        storage.credentials.clone(),
    ));
    let mentees = Arc::new(MenteeListService::new(
        Arc::clone(&dyn_api),
        storage.credentials.clone(),
        Arc::clone(&storage.schedules),
        Arc::clone(&reconciler),
        clock,
        utc,
    ));
    let scheduling = SchedulingService::new(
        dyn_api,
        storage.credentials.clone(),
        Arc::clone(&storage.schedules),
        Arc::clone(&mentees),
        clock,
        utc,
    );

    Harness {
        api,
        storage,
        reconciler,
        mentees,
        scheduling,
    }
}
