//! CLI worker: submit one generation request and poll it to completion.

mod config;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pictor_apimart::api::ApimartApi;
use pictor_apimart::manager::TaskManager;
use pictor_apimart::poller::{PollerConfig, BATCH_ATTEMPT_CEILING};
use pictor_core::generation::GenerationRequest;
use pictor_core::task::TaskStatus;

use crate::config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pictor_worker=info,pictor_apimart=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env()?;
    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.trim().is_empty() {
        anyhow::bail!("usage: pictor-worker <prompt>");
    }

    let api = Arc::new(ApimartApi::new(config.base_url, config.api_key));
    let manager = TaskManager::new(
        api,
        PollerConfig {
            interval: Duration::from_millis(config.poll_interval_ms),
            max_attempts: Some(BATCH_ATTEMPT_CEILING),
        },
    );

    let request = GenerationRequest::new(config.model, prompt);
    let (task_id, mut rx) = manager.submit(&request).await?;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                // The channel closes when the poller stops (terminal state
                // or attempt ceiling).
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow().clone();
                tracing::info!(
                    task_id = %task_id,
                    status = ?state.status,
                    progress = state.display_progress,
                    "Task update",
                );
                if state.status.is_terminal() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!(task_id = %task_id, "Interrupted; stopping poller");
                manager.stop(&task_id).await;
                break;
            }
        }
    }

    let state = rx.borrow().clone();
    manager.shutdown().await;

    match state.status {
        TaskStatus::Success => {
            tracing::info!(
                task_id = %task_id,
                url = %state.result_image_url.unwrap_or_default(),
                "Generation complete",
            );
            Ok(())
        }
        TaskStatus::Failed => anyhow::bail!(
            "generation failed: {}",
            state
                .failure_message
                .unwrap_or_else(|| "no vendor message".to_string())
        ),
        TaskStatus::Idle | TaskStatus::Running => {
            tracing::warn!(
                task_id = %task_id,
                progress = state.display_progress,
                "Polling stopped before a terminal state",
            );
            Ok(())
        }
    }
}
