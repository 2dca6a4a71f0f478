use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDateTime};
use mentor_core::Clock;
use mentor_core::model::{Mentee, MenteeCacheEntry, MenteeId, NextSession, SessionId};
use mentor_core::session_clock::has_session_ended;
use storage::{CredentialStore, ScheduleCache};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::MentorshipApi;
use crate::error::MenteeListError;
use crate::reconciler::CompletionReconciler;

/// Outcome of one pass of [`MenteeListService::check_cached_sessions`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalCheckReport {
    /// Mentees whose next session was marked completed on this pass.
    pub completed: Vec<MenteeId>,
    /// Mentees whose session had ended but could not be marked completed.
    pub failed: Vec<MenteeId>,
}

/// Owns the in-memory mentee list and keeps it in step with the server and
/// the local schedule cache.
pub struct MenteeListService {
    api: Arc<dyn MentorshipApi>,
    credentials: CredentialStore,
    cache: Arc<ScheduleCache>,
    reconciler: Arc<CompletionReconciler>,
    clock: Clock,
    offset: FixedOffset,
    mentees: RwLock<Vec<Mentee>>,
}

impl MenteeListService {
    #[must_use]
    pub fn new(
        api: Arc<dyn MentorshipApi>,
        credentials: CredentialStore,
        cache: Arc<ScheduleCache>,
        reconciler: Arc<CompletionReconciler>,
        clock: Clock,
        offset: FixedOffset,
    ) -> Self {
        Self {
            api,
            credentials,
            cache,
            reconciler,
            clock,
            offset,
            mentees: RwLock::new(Vec::new()),
        }
    }

    /// Load the authoritative list from the server and overlay cached
    /// schedules the server does not reflect yet.
    ///
    /// Successful loads also prune cache entries the server has superseded
    /// and entries past their TTL.
    ///
    /// # Errors
    ///
    /// Returns `MenteeListError` when no credential is stored or the request
    /// fails. The in-memory list is left untouched in that case.
    pub async fn fetch(&self) -> Result<Vec<Mentee>, MenteeListError> {
        let token = self
            .credentials
            .token()
            .await?
            .ok_or(MenteeListError::MissingCredential)?;
        let records = self.api.list_mentees(&token).await?;

        let known: BTreeMap<MenteeId, Option<SessionId>> = records
            .iter()
            .map(|r| (r.id.clone(), r.next_session_id.clone()))
            .collect();
        if let Err(err) = self.cache.reconcile_with(&known).await {
            warn!(error = %err, "Failed to prune superseded schedule cache entries");
        }
        match self.cache.evict_expired(self.clock.now()).await {
            Ok(0) => {}
            Ok(evicted) => debug!(evicted, "Evicted expired schedule cache entries"),
            Err(err) => warn!(error = %err, "Failed to evict expired schedule cache entries"),
        }

        let mut mentees: Vec<Mentee> = records.into_iter().map(|r| r.into_mentee()).collect();
        self.overlay_cache(&mut mentees).await;

        let mut guard = self.mentees.write().await;
        guard.clone_from(&mentees);
        Ok(mentees)
    }

    /// [`Self::fetch`], degrading to the last known list (with the cache
    /// re-applied) when the server cannot be reached.
    pub async fn refresh(&self) -> Vec<Mentee> {
        match self.fetch().await {
            Ok(mentees) => mentees,
            Err(err) => {
                warn!(error = %err, "Failed to load mentees; showing last known list");
                let mut mentees = self.snapshot().await;
                self.overlay_cache(&mut mentees).await;
                let mut guard = self.mentees.write().await;
                guard.clone_from(&mentees);
                mentees
            }
        }
    }

    /// Current in-memory list.
    pub async fn snapshot(&self) -> Vec<Mentee> {
        self.mentees.read().await.clone()
    }

    pub async fn find(&self, id: &MenteeId) -> Option<Mentee> {
        self.mentees
            .read()
            .await
            .iter()
            .find(|m| m.id() == id)
            .cloned()
    }

    /// Record a freshly scheduled session on the matching row.
    ///
    /// Returns `false` when the mentee is not in the list.
    pub async fn apply_scheduled(&self, id: &MenteeId, next: NextSession) -> bool {
        let mut guard = self.mentees.write().await;
        match guard.iter_mut().find(|m| m.id() == id) {
            Some(mentee) => {
                mentee.set_next_session(next);
                true
            }
            None => false,
        }
    }

    /// Drop the row's next session if it is still `session`.
    pub async fn clear_next_session_if(&self, id: &MenteeId, session: &SessionId) {
        let mut guard = self.mentees.write().await;
        if let Some(mentee) = guard.iter_mut().find(|m| {
            m.id() == id
                && m.next_session()
                    .is_some_and(|n| n.session_id.as_ref() == Some(session))
        }) {
            mentee.clear_next_session();
        }
    }

    /// Complete every pending next session whose end time has passed,
    /// using the service clock.
    pub async fn check_cached_sessions(&self) -> LocalCheckReport {
        self.check_cached_sessions_at(self.clock.wall_clock(self.offset))
            .await
    }

    /// Same as [`Self::check_cached_sessions`] at an explicit local instant.
    ///
    /// A session only counts once the server accepts the completion; the row
    /// counter goes up by one and the cache entry is flagged. Rows whose next
    /// session changed while the request was in flight are left alone.
    pub async fn check_cached_sessions_at(&self, now: NaiveDateTime) -> LocalCheckReport {
        // Another writer may have scheduled sessions since the list loaded.
        if let Some(entries) = self.cached_entries().await {
            apply_entries(&mut self.mentees.write().await, &entries);
        }

        let candidates: Vec<(MenteeId, Option<SessionId>)> = {
            let guard = self.mentees.read().await;
            guard
                .iter()
                .filter_map(|mentee| {
                    let (date, end) = mentee.pending_session_end()?;
                    if !has_session_ended(Some(date), Some(end), now) {
                        return None;
                    }
                    let session = mentee.next_session().and_then(|n| n.session_id.clone());
                    Some((mentee.id().clone(), session))
                })
                .collect()
        };

        let mut report = LocalCheckReport::default();
        for (mentee_id, session) in candidates {
            let Some(session) = session else {
                debug!(mentee = %mentee_id, "Ended session has no id; skipping");
                continue;
            };

            if self.reconciler.mark_session_completed(&session).await.is_none() {
                report.failed.push(mentee_id);
                continue;
            }

            let counted = {
                let mut guard = self.mentees.write().await;
                guard
                    .iter_mut()
                    .find(|m| m.id() == &mentee_id)
                    .filter(|m| {
                        m.next_session()
                            .is_some_and(|n| !n.completed && n.session_id.as_ref() == Some(&session))
                    })
                    .map(Mentee::record_completed_session)
                    .is_some()
            };

            if let Err(err) = self.cache.mark_completed(&mentee_id, Some(&session)).await {
                warn!(error = %err, mentee = %mentee_id, "Failed to flag cached session completed");
            }

            if counted {
                info!(mentee = %mentee_id, %session, "Ended session marked completed");
                report.completed.push(mentee_id);
            }
        }
        report
    }

    async fn overlay_cache(&self, mentees: &mut [Mentee]) {
        if let Some(entries) = self.cached_entries().await {
            apply_entries(mentees, &entries);
        }
    }

    async fn cached_entries(&self) -> Option<BTreeMap<MenteeId, MenteeCacheEntry>> {
        match self.cache.entries().await {
            Ok(entries) => Some(entries.into_iter().collect()),
            Err(err) => {
                warn!(error = %err, "Failed to read schedule cache");
                None
            }
        }
    }
}

fn apply_entries(mentees: &mut [Mentee], entries: &BTreeMap<MenteeId, MenteeCacheEntry>) {
    for mentee in mentees.iter_mut() {
        if let Some(entry) = entries.get(mentee.id()) {
            mentee.apply_cache_entry(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::test_harness::{harness, mentee_record};
    use chrono::Duration;
    use mentor_core::time::fixed_now;

    fn with_next(
        mut record: crate::api::MenteeRecord,
        session: &str,
        date: &str,
        end: &str,
    ) -> crate::api::MenteeRecord {
        record.next_session_id = Some(SessionId::new(session));
        record.next_session_date = Some(date.into());
        record.next_session_time = Some("09:00".into());
        record.next_session_end_time = Some(end.into());
        record
    }

    #[tokio::test]
    async fn fetch_requires_credential() {
        let h = harness(false).await;
        let err = h.mentees.fetch().await.unwrap_err();
        assert!(matches!(err, MenteeListError::MissingCredential));
        assert_eq!(h.api.call_count(), 0);
    }

    #[tokio::test]
    async fn refresh_degrades_to_last_known_list() {
        let h = harness(true).await;
        h.api.set_mentees(vec![mentee_record("m1", 1, 4)]);
        assert_eq!(h.mentees.refresh().await.len(), 1);

        h.api.fail_reads.store(true, Ordering::SeqCst);
        let degraded = h.mentees.refresh().await;

        assert_eq!(degraded.len(), 1);
        assert_eq!(degraded[0].progress(), 25);
    }

    #[tokio::test]
    async fn fetch_overlays_pending_cache_and_prunes_synced() {
        let h = harness(true).await;
        let cache = &h.storage.schedules;
        let pending = MenteeCacheEntry::scheduled(
            "11/20/2023 at 10:00",
            SessionId::new("new-sess"),
            chrono::NaiveDate::from_ymd_opt(2023, 11, 20).unwrap(),
            "11:00".parse().unwrap(),
        );
        cache.set(&MenteeId::new("m1"), pending, fixed_now()).await.unwrap();
        let synced = MenteeCacheEntry::scheduled(
            "11/21/2023 at 10:00",
            SessionId::new("s2"),
            chrono::NaiveDate::from_ymd_opt(2023, 11, 21).unwrap(),
            "11:00".parse().unwrap(),
        );
        cache.set(&MenteeId::new("m2"), synced, fixed_now()).await.unwrap();

        h.api.set_mentees(vec![
            mentee_record("m1", 0, 2),
            with_next(mentee_record("m2", 0, 2), "s2", "2023-11-21", "11:00"),
        ]);
        let mentees = h.mentees.fetch().await.unwrap();

        let m1 = mentees.iter().find(|m| m.id().as_str() == "m1").unwrap();
        assert_eq!(
            m1.next_session().unwrap().session_id,
            Some(SessionId::new("new-sess"))
        );
        assert!(cache.get(&MenteeId::new("m1")).await.unwrap().is_some());
        assert!(cache.get(&MenteeId::new("m2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn local_check_completes_ended_sessions_once() {
        let h = harness(true).await;
        h.api.set_mentees(vec![
            with_next(mentee_record("m1", 1, 4), "s1", "2023-11-14", "21:00"),
            with_next(mentee_record("m2", 0, 4), "s2", "2023-11-15", "10:00"),
        ]);
        h.mentees.fetch().await.unwrap();

        let report = h.mentees.check_cached_sessions().await;
        assert_eq!(report.completed, vec![MenteeId::new("m1")]);
        assert!(report.failed.is_empty());

        let m1 = h.mentees.find(&MenteeId::new("m1")).await.unwrap();
        assert_eq!(m1.sessions_completed(), 2);
        assert_eq!(m1.progress(), 50);

        let again = h.mentees.check_cached_sessions().await;
        assert!(again.completed.is_empty());
        assert_eq!(
            h.mentees.find(&MenteeId::new("m1")).await.unwrap().sessions_completed(),
            2
        );
        assert_eq!(h.api.status_updates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_completion_leaves_row_untouched() {
        let h = harness(true).await;
        h.api.set_mentees(vec![with_next(
            mentee_record("m1", 0, 2),
            "s1",
            "2023-11-14",
            "21:00",
        )]);
        h.mentees.fetch().await.unwrap();
        h.api.fail_writes.store(true, Ordering::SeqCst);

        let report = h.mentees.check_cached_sessions().await;

        assert_eq!(report.failed, vec![MenteeId::new("m1")]);
        let m1 = h.mentees.find(&MenteeId::new("m1")).await.unwrap();
        assert_eq!(m1.sessions_completed(), 0);
        assert!(!m1.next_session().unwrap().completed);

        h.api.fail_writes.store(false, Ordering::SeqCst);
        let retry = h
            .mentees
            .check_cached_sessions_at(h.now() + Duration::minutes(1))
            .await;
        assert_eq!(retry.completed, vec![MenteeId::new("m1")]);
    }

    #[tokio::test]
    async fn local_check_picks_up_entries_cached_after_load() {
        let h = harness(true).await;
        h.api.set_mentees(vec![mentee_record("m1", 0, 2)]);
        h.mentees.fetch().await.unwrap();

        let late = MenteeCacheEntry::scheduled(
            "11/14/2023 at 20:00",
            SessionId::new("late-sess"),
            chrono::NaiveDate::from_ymd_opt(2023, 11, 14).unwrap(),
            "21:00".parse().unwrap(),
        );
        let mentee = MenteeId::new("m1");
        h.storage.schedules.set(&mentee, late, fixed_now()).await.unwrap();

        let report = h.mentees.check_cached_sessions().await;

        assert_eq!(report.completed, vec![mentee.clone()]);
        let m1 = h.mentees.find(&mentee).await.unwrap();
        assert_eq!(m1.sessions_completed(), 1);
        assert!(m1.next_session().unwrap().completed);
        assert!(h.storage.schedules.get(&mentee).await.unwrap().unwrap().completed);
        assert_eq!(
            h.api.status_updates.lock().unwrap().as_slice(),
            &[(SessionId::new("late-sess"), mentor_core::model::SessionStatus::Completed)]
        );
    }
}
