use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use super::WorkerDeps;
use super::round_detector::detect_round;
use crate::core::orchestrator::aggregate_task;
use crate::core::orchestrator::poller::PollWorker;
use crate::core::orchestrator::types::TaskStatus;

/// Settles one task from its commands; on a terminal outcome the round of
/// its event is re-checked. Returns whether the task changed.
pub(super) async fn propagate_task(deps: &WorkerDeps, task_id: &str) -> Result<bool> {
    let store = &deps.store;
    let Some(task) = store.get_task(task_id).await? else {
        debug!("Task {} not found, skipping", task_id);
        return Ok(false);
    };
    if task.task_status.is_terminal() {
        return Ok(false);
    }

    let statuses: Vec<_> = store
        .list_commands_for_task(task_id)
        .await?
        .into_iter()
        .map(|c| c.command_status)
        .collect();
    let Some(next) = aggregate_task(&statuses) else {
        return Ok(false);
    };
    if !store.set_task_status(task_id, next).await? {
        return Ok(false);
    }
    info!("Task {} -> {}", task_id, next.as_str());

    detect_round(deps, &task.event_id, task.round_id).await?;
    Ok(true)
}

/// Sweeps `processing` tasks, catching anything a command-level trigger missed.
pub struct TaskStatusPropagator {
    deps: WorkerDeps,
}

impl TaskStatusPropagator {
    pub fn new(deps: WorkerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl PollWorker for TaskStatusPropagator {
    fn name(&self) -> &'static str {
        "task_status"
    }

    async fn poll_once(&self) -> Result<usize> {
        let tasks = self
            .deps
            .store
            .list_tasks_by_status(TaskStatus::Processing)
            .await?;

        let mut settled = 0;
        for task in tasks {
            if propagate_task(&self.deps, &task.task_id).await? {
                settled += 1;
            }
        }
        Ok(settled)
    }
}
