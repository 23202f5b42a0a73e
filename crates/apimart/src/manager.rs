//! Multi-task polling manager.
//!
//! [`TaskManager`] tracks every in-flight generation: it spawns one
//! poller per task under a child of its master [`CancellationToken`],
//! hands out watch receivers for observation, and guarantees every
//! timer dies on [`stop`](TaskManager::stop) or
//! [`shutdown`](TaskManager::shutdown). Each task's state is mutated
//! only by its own poller; the task map is the only shared structure.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use pictor_core::generation::GenerationRequest;
use pictor_core::task::TaskState;
use pictor_core::types::TaskId;

use crate::api::{ApimartApi, ApimartApiError};
use crate::poller::{spawn_poller, PollerConfig, StatusSource};

/// Owns the pollers for all in-flight tasks.
///
/// Created once and cheaply cloned around via `Arc`.
pub struct TaskManager<S> {
    source: Arc<S>,
    config: PollerConfig,
    tasks: RwLock<HashMap<TaskId, ManagedTask>>,
    /// Master cancellation token — cancelled during shutdown.
    cancel: CancellationToken,
}

/// Internal bookkeeping for one tracked task.
struct ManagedTask {
    rx: watch::Receiver<TaskState>,
    /// Per-task cancellation token (child of the master token).
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<()>,
}

impl<S: StatusSource + 'static> TaskManager<S> {
    /// Create a manager that polls through `source` with `config`.
    pub fn new(source: Arc<S>, config: PollerConfig) -> Arc<Self> {
        Arc::new(Self {
            source,
            config,
            tasks: RwLock::new(HashMap::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Start polling an already-submitted task.
    ///
    /// Returns a receiver holding the latest [`TaskState`]. Tracking the
    /// same task twice hands back the existing receiver instead of
    /// spawning a second timer.
    pub async fn track(&self, task_id: TaskId) -> watch::Receiver<TaskState> {
        let mut tasks = self.tasks.write().await;
        if let Some(existing) = tasks.get(&task_id) {
            return existing.rx.clone();
        }

        let cancel = self.cancel.child_token();
        let (rx, join) = spawn_poller(
            self.source.clone(),
            task_id.clone(),
            self.config.clone(),
            cancel.clone(),
        );
        tracing::info!(task_id = %task_id, "Tracking task");
        tasks.insert(
            task_id,
            ManagedTask {
                rx: rx.clone(),
                cancel,
                join,
            },
        );
        rx
    }

    /// Observe a tracked task, if known.
    pub async fn watch(&self, task_id: &TaskId) -> Option<watch::Receiver<TaskState>> {
        self.tasks.read().await.get(task_id).map(|t| t.rx.clone())
    }

    /// IDs of all tasks whose pollers are still live.
    pub async fn active_task_ids(&self) -> Vec<TaskId> {
        self.tasks
            .read()
            .await
            .iter()
            .filter(|(_, t)| !t.join.is_finished())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Cancel the poller for one task.
    ///
    /// Idempotent, and a no-op for unknown or already-terminated tasks.
    /// The last-known state stays observable through existing receivers.
    pub async fn stop(&self, task_id: &TaskId) {
        if let Some(task) = self.tasks.read().await.get(task_id) {
            task.cancel.cancel();
        }
    }

    /// Cancel every poller and wait for them to wind down.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let mut tasks = self.tasks.write().await;
        for (task_id, task) in tasks.drain() {
            if let Err(e) = task.join.await {
                tracing::error!(task_id = %task_id, error = %e, "Poller task panicked");
            }
        }
        tracing::info!("Task manager shut down");
    }
}

impl TaskManager<ApimartApi> {
    /// Submit a generation request and start polling it.
    ///
    /// A submission error surfaces once, here; the task is never tracked.
    pub async fn submit(
        &self,
        request: &GenerationRequest,
    ) -> Result<(TaskId, watch::Receiver<TaskState>), ApimartApiError> {
        let task_id = self.source.submit(request).await?;
        tracing::info!(task_id = %task_id, model = %request.model, "Generation submitted");
        let rx = self.track(task_id.clone()).await;
        Ok((task_id, rx))
    }
}
