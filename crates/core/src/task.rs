//! Task state machine.
//!
//! Every poll response is normalized (at the wire boundary, in
//! `pictor-apimart`) into a [`TaskSnapshot`]; [`TaskState::apply`] folds
//! snapshots into the simplified client-side state machine. Once a task
//! reaches a terminal status its state never changes again.

use serde::{Deserialize, Serialize};

use crate::progress::ProgressEstimator;

// ---------------------------------------------------------------------------
// Reported status
// ---------------------------------------------------------------------------

/// The backend's own status claim, reduced to the three cases the client
/// distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportedStatus {
    /// Backend claims completion (`completed` or `succeeded`).
    Succeeded,
    /// Backend reports `failed` or `error`.
    Failed,
    /// Anything else, including an absent status field.
    Running,
}

impl ReportedStatus {
    /// Parse the vendor's status string, case-insensitively.
    ///
    /// Unknown or absent values map to [`Running`](Self::Running): the
    /// client only ever acts on the statuses it understands.
    pub fn parse(status: Option<&str>) -> Self {
        match status.map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("completed") | Some("succeeded") => Self::Succeeded,
            Some("failed") | Some("error") => Self::Failed,
            _ => Self::Running,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Canonical, shape-independent view of one status response.
///
/// Produced by the wire-normalization boundary; nothing past that boundary
/// ever branches on raw response shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    /// The backend's status claim.
    pub reported_status: ReportedStatus,
    /// Backend-reported progress percentage, if present.
    pub progress: Option<u8>,
    /// First resolvable result image URL, if any.
    pub image_url: Option<String>,
    /// Vendor error message, if the response carried one.
    pub error_message: Option<String>,
}

impl TaskSnapshot {
    /// A snapshot that claims nothing: running, no progress, no image.
    pub fn running() -> Self {
        Self {
            reported_status: ReportedStatus::Running,
            progress: None,
            image_url: None,
            error_message: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Task status
// ---------------------------------------------------------------------------

/// Simplified client-side task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet polled.
    Idle,
    /// Polling in progress.
    Running,
    /// Terminal: a result image is available.
    Success,
    /// Terminal: the vendor reported failure.
    Failed,
}

impl TaskStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

// ---------------------------------------------------------------------------
// Task state
// ---------------------------------------------------------------------------

/// Mutable record for one in-flight task.
///
/// Invariants, per [`apply`](Self::apply):
/// - `display_progress` never decreases;
/// - `display_progress == 100` exactly when status becomes [`TaskStatus::Success`];
/// - once terminal, no field changes again.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskState {
    pub status: TaskStatus,
    /// Percentage shown to the user, 0–100.
    pub display_progress: u8,
    /// Set only on success.
    pub result_image_url: Option<String>,
    /// Vendor error message captured on terminal failure.
    pub failure_message: Option<String>,
    estimator: ProgressEstimator,
}

impl Default for TaskState {
    fn default() -> Self {
        Self {
            status: TaskStatus::Idle,
            display_progress: 0,
            result_image_url: None,
            failure_message: None,
            estimator: ProgressEstimator::new(),
        }
    }
}

impl TaskState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one normalized status response into the state machine.
    ///
    /// Classification, in priority order:
    /// 1. a resolvable image URL means success, regardless of the status
    ///    string — compatibility shim for a vendor that sometimes labels
    ///    finished tasks `processing`;
    /// 2. a reported failure is terminal;
    /// 3. otherwise the task is still running and the synthetic progress
    ///    estimate advances by one tick.
    ///
    /// No-op once the state is terminal.
    pub fn apply(&mut self, snapshot: &TaskSnapshot) {
        if self.status.is_terminal() {
            return;
        }

        if let Some(url) = &snapshot.image_url {
            self.status = TaskStatus::Success;
            self.display_progress = 100;
            self.result_image_url = Some(url.clone());
            return;
        }

        if snapshot.reported_status == ReportedStatus::Failed {
            self.status = TaskStatus::Failed;
            self.failure_message = snapshot.error_message.clone();
            return;
        }

        // Still running. This covers a backend that claims completion
        // without delivering an image: not success until the image exists.
        self.status = TaskStatus::Running;
        self.estimator.tick();
        let candidate = self.estimator.display(snapshot.progress);
        self.display_progress = self.display_progress.max(candidate).min(100);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_snapshot() -> TaskSnapshot {
        TaskSnapshot {
            reported_status: ReportedStatus::Failed,
            progress: None,
            image_url: None,
            error_message: Some("content policy violation".to_string()),
        }
    }

    fn success_snapshot(url: &str) -> TaskSnapshot {
        TaskSnapshot {
            reported_status: ReportedStatus::Running,
            progress: None,
            image_url: Some(url.to_string()),
            error_message: None,
        }
    }

    #[test]
    fn parse_reported_status_case_insensitive() {
        assert_eq!(ReportedStatus::parse(Some("Completed")), ReportedStatus::Succeeded);
        assert_eq!(ReportedStatus::parse(Some("SUCCEEDED")), ReportedStatus::Succeeded);
        assert_eq!(ReportedStatus::parse(Some("Failed")), ReportedStatus::Failed);
        assert_eq!(ReportedStatus::parse(Some("ERROR")), ReportedStatus::Failed);
        assert_eq!(ReportedStatus::parse(Some("processing")), ReportedStatus::Running);
        assert_eq!(ReportedStatus::parse(Some("queued")), ReportedStatus::Running);
        assert_eq!(ReportedStatus::parse(None), ReportedStatus::Running);
    }

    #[test]
    fn display_progress_never_decreases() {
        let mut state = TaskState::new();
        let reported = [Some(5), Some(60), None, Some(20), None, Some(61), Some(0)];
        let mut previous = 0;
        for progress in reported {
            state.apply(&TaskSnapshot {
                progress,
                ..TaskSnapshot::running()
            });
            assert!(state.display_progress >= previous);
            previous = state.display_progress;
        }
    }

    #[test]
    fn success_pins_progress_and_sets_url() {
        let mut state = TaskState::new();
        state.apply(&TaskSnapshot::running());
        state.apply(&success_snapshot("https://x/img.png"));
        assert_eq!(state.status, TaskStatus::Success);
        assert_eq!(state.display_progress, 100);
        assert_eq!(state.result_image_url.as_deref(), Some("https://x/img.png"));
    }

    #[test]
    fn terminal_state_is_immutable() {
        let mut state = TaskState::new();
        state.apply(&success_snapshot("https://x/img.png"));
        let frozen = state.clone();

        state.apply(&failed_snapshot());
        state.apply(&TaskSnapshot::running());
        state.apply(&success_snapshot("https://x/other.png"));
        assert_eq!(state, frozen);
    }

    #[test]
    fn image_presence_overrides_processing_status() {
        let mut state = TaskState::new();
        state.apply(&TaskSnapshot {
            reported_status: ReportedStatus::Running,
            image_url: Some("https://x/img.png".to_string()),
            ..TaskSnapshot::running()
        });
        assert_eq!(state.status, TaskStatus::Success);
    }

    #[test]
    fn image_presence_overrides_failed_status() {
        let mut state = TaskState::new();
        state.apply(&TaskSnapshot {
            reported_status: ReportedStatus::Failed,
            image_url: Some("https://x/img.png".to_string()),
            ..TaskSnapshot::running()
        });
        assert_eq!(state.status, TaskStatus::Success);
        assert_eq!(state.display_progress, 100);
    }

    #[test]
    fn reported_failure_is_terminal_with_message() {
        let mut state = TaskState::new();
        state.apply(&TaskSnapshot::running());
        let progress_before = state.display_progress;
        state.apply(&failed_snapshot());
        assert_eq!(state.status, TaskStatus::Failed);
        assert_eq!(
            state.failure_message.as_deref(),
            Some("content policy violation")
        );
        // Failure does not touch the progress bar.
        assert_eq!(state.display_progress, progress_before);
        assert!(state.result_image_url.is_none());
    }

    #[test]
    fn completion_claim_without_image_stays_running() {
        let mut state = TaskState::new();
        state.apply(&TaskSnapshot {
            reported_status: ReportedStatus::Succeeded,
            progress: Some(100),
            image_url: None,
            error_message: None,
        });
        assert_eq!(state.status, TaskStatus::Running);
        assert_eq!(state.display_progress, 100);
    }

    #[test]
    fn absent_progress_uses_estimator() {
        let mut state = TaskState::new();
        state.apply(&TaskSnapshot::running());
        // One tick from the initial estimate of 10: floor(10 + 85*0.05) = 14.
        assert_eq!(state.display_progress, 14);
    }

    #[test]
    fn backend_progress_beats_estimator_when_higher() {
        let mut state = TaskState::new();
        state.apply(&TaskSnapshot {
            progress: Some(80),
            ..TaskSnapshot::running()
        });
        assert_eq!(state.display_progress, 80);
    }
}
