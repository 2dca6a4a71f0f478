//! Fixed-interval background drivers with explicit owner handles.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::PollingConfig;
use crate::mentees::MenteeListService;
use crate::reconciler::CompletionReconciler;

/// A running poller. The first tick fires immediately, then one per period.
///
/// `stop` lets an in-flight tick finish and waits for the task to exit;
/// dropping the handle without stopping aborts the task.
pub struct PollTask {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl PollTask {
    /// Spawn `tick` on the current Tokio runtime every `period`.
    ///
    /// Ticks run one after another inside the task; a slow tick delays the
    /// next one instead of overlapping it.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(task = name, period_secs = period.as_secs(), "Poller started");
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = interval.tick() => tick().await,
                }
            }
            debug!(task = name, "Poller stopped");
        });

        Self {
            name,
            stop_tx,
            handle: Some(handle),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Signal the task to stop and wait for it to exit.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!(task = self.name, error = %err, "Poller ended abnormally");
            }
        }
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Run the server-side completion sweep now and then every `period`,
/// skipping a tick while a previous sweep is still running.
#[must_use]
pub fn spawn_completion_poller(
    reconciler: Arc<CompletionReconciler>,
    period: Duration,
) -> PollTask {
    PollTask::spawn("completion-sweep", period, move || {
        let reconciler = Arc::clone(&reconciler);
        async move {
            let _ = reconciler.run_guarded().await;
        }
    })
}

/// Re-check the mentee list's pending sessions now and then every `period`.
#[must_use]
pub fn spawn_mentee_check_poller(mentees: Arc<MenteeListService>, period: Duration) -> PollTask {
    PollTask::spawn("mentee-session-check", period, move || {
        let mentees = Arc::clone(&mentees);
        async move {
            let report = mentees.check_cached_sessions().await;
            if !report.completed.is_empty() || !report.failed.is_empty() {
                debug!(
                    completed = report.completed.len(),
                    failed = report.failed.len(),
                    "Mentee session check finished"
                );
            }
        }
    })
}

/// Owns both pollers; they run independently and stop together.
pub struct PollingDriver {
    completion: PollTask,
    mentee_check: PollTask,
}

impl PollingDriver {
    #[must_use]
    pub fn start(
        reconciler: Arc<CompletionReconciler>,
        mentees: Arc<MenteeListService>,
        config: PollingConfig,
    ) -> Self {
        Self {
            completion: spawn_completion_poller(reconciler, config.completion_interval),
            mentee_check: spawn_mentee_check_poller(mentees, config.mentee_check_interval),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.completion.is_finished() && !self.mentee_check.is_finished()
    }

    pub async fn shutdown(self) {
        let Self {
            completion,
            mentee_check,
        } = self;
        tokio::join!(completion.stop(), mentee_check.stop());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counting_task(period: Duration) -> (Arc<AtomicUsize>, PollTask) {
        let count = Arc::new(AtomicUsize::new(0));
        let task = PollTask::spawn("test", period, {
            let count = Arc::clone(&count);
            move || {
                let count = Arc::clone(&count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            }
        });
        (count, task)
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_immediately_then_on_period() {
        let (count, task) = counting_task(Duration::from_secs(60));

        sleep(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        sleep(Duration::from_secs(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);

        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_loop() {
        let (count, task) = counting_task(Duration::from_secs(60));
        sleep(Duration::from_millis(1)).await;
        task.stop().await;

        sleep(Duration::from_secs(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_aborts() {
        let (count, task) = counting_task(Duration::from_secs(60));
        sleep(Duration::from_millis(1)).await;
        drop(task);

        sleep(Duration::from_secs(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
