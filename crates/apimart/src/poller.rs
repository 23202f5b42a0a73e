//! Timer-driven status polling for one generation task.
//!
//! A poller owns one recurring status check per task: every fixed
//! interval it asks the [`StatusSource`] for a snapshot, folds it into
//! the task's [`TaskState`], and publishes the new state on a
//! [`watch`] channel. Polling stops on a terminal state, on the attempt
//! ceiling, or when the [`CancellationToken`] fires — the timer is
//! dropped on every exit path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use pictor_core::task::{TaskSnapshot, TaskState};
use pictor_core::types::TaskId;

use crate::api::{ApimartApi, ApimartApiError};

/// Default spacing between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Attempt ceiling used by batch generation.
pub const BATCH_ATTEMPT_CEILING: u32 = 100;

// ---------------------------------------------------------------------------
// Status source seam
// ---------------------------------------------------------------------------

/// Anything that can answer "what is the state of this task right now".
///
/// Implemented by [`ApimartApi`]; tests substitute a scripted source so
/// the poller never touches the network.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn task_status(&self, task_id: &TaskId) -> Result<TaskSnapshot, ApimartApiError>;
}

#[async_trait]
impl StatusSource for ApimartApi {
    async fn task_status(&self, task_id: &TaskId) -> Result<TaskSnapshot, ApimartApiError> {
        self.get_task_status(task_id).await
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tunable parameters for one poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Fixed interval between status checks.
    pub interval: Duration,
    /// Stop after this many status checks even without a terminal state,
    /// freezing the last-known state. `None` polls until terminal.
    pub max_attempts: Option<u32>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
        }
    }
}

impl PollerConfig {
    /// Configuration for batch generation: same interval, capped attempts.
    pub fn batch() -> Self {
        Self {
            max_attempts: Some(BATCH_ATTEMPT_CEILING),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Spawn a poller task for `task_id`.
///
/// Returns a receiver holding the latest [`TaskState`] (starting at the
/// idle state) and the join handle of the polling task. Trigger `cancel`
/// to stop early; cancellation is idempotent and harmless after natural
/// termination.
pub fn spawn_poller<S: StatusSource + 'static>(
    source: Arc<S>,
    task_id: TaskId,
    config: PollerConfig,
    cancel: CancellationToken,
) -> (watch::Receiver<TaskState>, tokio::task::JoinHandle<()>) {
    let (tx, rx) = watch::channel(TaskState::new());
    let join = tokio::spawn(async move {
        poll_until_settled(source.as_ref(), &task_id, &config, &cancel, &tx).await;
    });
    (rx, join)
}

/// Run the polling loop to completion.
///
/// One status request per tick. Request failures are transient by
/// definition here: they are logged and retried on the next tick without
/// touching the task state. Terminal classification lives in
/// [`TaskState::apply`].
async fn poll_until_settled<S: StatusSource + ?Sized>(
    source: &S,
    task_id: &TaskId,
    config: &PollerConfig,
    cancel: &CancellationToken,
    tx: &watch::Sender<TaskState>,
) {
    let mut state = TaskState::new();
    let mut attempts = 0u32;

    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // An interval's first tick completes immediately; consume it so the
    // first status request lands one full interval after start, matching
    // the submit endpoint's own minimum turnaround.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(task_id = %task_id, "Polling cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        attempts += 1;
        match source.task_status(task_id).await {
            Ok(snapshot) => {
                state.apply(&snapshot);
                tx.send_replace(state.clone());
                if state.status.is_terminal() {
                    tracing::info!(
                        task_id = %task_id,
                        status = ?state.status,
                        attempts,
                        "Task settled",
                    );
                    return;
                }
            }
            Err(e) => {
                // Transient by policy: a flaky status check never fails
                // the task, the next tick simply retries.
                tracing::warn!(
                    task_id = %task_id,
                    error = %e,
                    "Status check failed; retrying next tick",
                );
            }
        }

        if let Some(max) = config.max_attempts {
            if attempts >= max {
                tracing::warn!(
                    task_id = %task_id,
                    attempts,
                    "Attempt ceiling reached; freezing last-known state",
                );
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use tokio::time::Instant;

    use pictor_core::task::{ReportedStatus, TaskStatus};

    /// Scripted status source: pops one response per call and records
    /// when each call happened. Once the script runs dry it keeps
    /// answering "still running".
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<TaskSnapshot, ApimartApiError>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<TaskSnapshot, ApimartApiError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn call_instants(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn task_status(&self, _task_id: &TaskId) -> Result<TaskSnapshot, ApimartApiError> {
            self.calls.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(TaskSnapshot::running()))
        }
    }

    fn running() -> Result<TaskSnapshot, ApimartApiError> {
        Ok(TaskSnapshot::running())
    }

    fn running_with_progress(progress: u8) -> Result<TaskSnapshot, ApimartApiError> {
        Ok(TaskSnapshot {
            progress: Some(progress),
            ..TaskSnapshot::running()
        })
    }

    fn success(url: &str) -> Result<TaskSnapshot, ApimartApiError> {
        Ok(TaskSnapshot {
            image_url: Some(url.to_string()),
            ..TaskSnapshot::running()
        })
    }

    fn failed() -> Result<TaskSnapshot, ApimartApiError> {
        Ok(TaskSnapshot {
            reported_status: ReportedStatus::Failed,
            progress: None,
            image_url: None,
            error_message: Some("vendor says no".to_string()),
        })
    }

    fn network_error() -> Result<TaskSnapshot, ApimartApiError> {
        Err(ApimartApiError::ApiError {
            status: 502,
            body: "bad gateway".to_string(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn success_terminates_polling() {
        let source = ScriptedSource::new(vec![running(), running(), success("https://x/img.png")]);
        let (rx, join) = spawn_poller(
            source.clone(),
            TaskId::new("t-1"),
            PollerConfig::default(),
            CancellationToken::new(),
        );

        join.await.unwrap();
        let state = rx.borrow();
        assert_eq!(state.status, TaskStatus::Success);
        assert_eq!(state.display_progress, 100);
        assert_eq!(state.result_image_url.as_deref(), Some("https://x/img.png"));
        assert_eq!(source.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_cancels_timer_and_sends_no_further_requests() {
        let source = ScriptedSource::new(vec![failed()]);
        let (rx, join) = spawn_poller(
            source.clone(),
            TaskId::new("t-2"),
            PollerConfig::default(),
            CancellationToken::new(),
        );

        join.await.unwrap();
        assert_eq!(rx.borrow().status, TaskStatus::Failed);
        assert_eq!(
            rx.borrow().failure_message.as_deref(),
            Some("vendor says no")
        );
        assert_eq!(source.call_count(), 1);

        // Long after termination, still exactly one request.
        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 10).await;
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn network_error_keeps_running_on_the_same_cadence() {
        let source = ScriptedSource::new(vec![
            running_with_progress(30),
            network_error(),
            success("https://x/img.png"),
        ]);
        let (rx, join) = spawn_poller(
            source.clone(),
            TaskId::new("t-3"),
            PollerConfig::default(),
            CancellationToken::new(),
        );

        join.await.unwrap();
        assert_eq!(rx.borrow().status, TaskStatus::Success);

        // All three requests, the failed one included, are spaced one
        // fixed interval apart.
        let instants = source.call_instants();
        assert_eq!(instants.len(), 3);
        assert_eq!(instants[1] - instants[0], DEFAULT_POLL_INTERVAL);
        assert_eq!(instants[2] - instants[1], DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn network_error_does_not_change_state() {
        let source = ScriptedSource::new(vec![running_with_progress(40), network_error()]);
        let cancel = CancellationToken::new();
        let (rx, join) = spawn_poller(
            source.clone(),
            TaskId::new("t-4"),
            PollerConfig::default(),
            cancel.clone(),
        );

        // Let the first two ticks happen, then stop the poller.
        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 2 + Duration::from_millis(1)).await;
        cancel.cancel();
        join.await.unwrap();

        assert_eq!(source.call_count(), 2);
        let state = rx.borrow();
        assert_eq!(state.status, TaskStatus::Running);
        assert_eq!(state.display_progress, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_ceiling_freezes_last_known_state() {
        let source = ScriptedSource::new(vec![]);
        let config = PollerConfig {
            max_attempts: Some(5),
            ..Default::default()
        };
        let (rx, join) = spawn_poller(
            source.clone(),
            TaskId::new("t-5"),
            config,
            CancellationToken::new(),
        );

        join.await.unwrap();
        assert_eq!(source.call_count(), 5);
        let state = rx.borrow();
        assert_eq!(state.status, TaskStatus::Running);
        assert!(state.display_progress < 100);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_config_uses_observed_ceiling() {
        let config = PollerConfig::batch();
        assert_matches!(config.max_attempts, Some(BATCH_ATTEMPT_CEILING));
        assert_eq!(config.interval, DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn display_progress_is_monotonic_across_noisy_reports() {
        let source = ScriptedSource::new(vec![
            running_with_progress(5),
            running_with_progress(60),
            running(),
            running_with_progress(20),
            success("https://x/img.png"),
        ]);
        let (mut rx, join) = spawn_poller(
            source.clone(),
            TaskId::new("t-6"),
            PollerConfig::default(),
            CancellationToken::new(),
        );

        let watcher = tokio::spawn(async move {
            let mut previous = rx.borrow().display_progress;
            while rx.changed().await.is_ok() {
                let current = rx.borrow().display_progress;
                assert!(current >= previous, "progress went {previous} -> {current}");
                previous = current;
            }
            previous
        });

        join.await.unwrap();
        assert_eq!(watcher.await.unwrap(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_termination_is_a_noop() {
        let source = ScriptedSource::new(vec![success("https://x/img.png")]);
        let cancel = CancellationToken::new();
        let (rx, join) = spawn_poller(
            source.clone(),
            TaskId::new("t-7"),
            PollerConfig::default(),
            cancel.clone(),
        );

        join.await.unwrap();
        cancel.cancel();
        cancel.cancel();
        assert_eq!(rx.borrow().status, TaskStatus::Success);
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_an_active_poller() {
        let source = ScriptedSource::new(vec![]);
        let cancel = CancellationToken::new();
        let (rx, join) = spawn_poller(
            source.clone(),
            TaskId::new("t-8"),
            PollerConfig::default(),
            cancel.clone(),
        );

        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 3 + Duration::from_millis(1)).await;
        cancel.cancel();
        join.await.unwrap();

        let calls_at_cancel = source.call_count();
        assert_eq!(calls_at_cancel, 3);
        assert_eq!(rx.borrow().status, TaskStatus::Running);

        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 5).await;
        assert_eq!(source.call_count(), calls_at_cancel);
    }
}
