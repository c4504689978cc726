use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use super::WorkerDeps;
use crate::core::orchestrator::poller::PollWorker;
use crate::core::orchestrator::round_outcome;
use crate::core::orchestrator::types::EventStatus;

/// Closes the round of a `processing` event once every task and every
/// execution of that round is terminal. Returns whether the event moved.
pub(super) async fn detect_round(deps: &WorkerDeps, event_id: &str, round_id: u32) -> Result<bool> {
    let store = &deps.store;
    let Some(event) = store.get_event(event_id).await? else {
        debug!("Event {} not found, skipping", event_id);
        return Ok(false);
    };
    if event.status != EventStatus::Processing || event.current_round != round_id {
        return Ok(false);
    }

    let tasks: Vec<_> = store
        .list_tasks_for_round(event_id, round_id)
        .await?
        .into_iter()
        .map(|t| t.task_status)
        .collect();
    if tasks.is_empty() {
        debug!("Event {} round {} has no tasks yet", event_id, round_id);
        return Ok(false);
    }
    let executions: Vec<_> = store
        .list_executions_for_round(event_id, round_id)
        .await?
        .into_iter()
        .map(|e| e.execution_status)
        .collect();

    let Some(next) = round_outcome(&tasks, &executions) else {
        return Ok(false);
    };
    if !store
        .transition_event(event_id, EventStatus::Processing, next)
        .await?
    {
        info!(
            "Event {} left processing before round {} closed, skipping",
            event_id, round_id
        );
        return Ok(false);
    }
    info!("Event {} round {} -> {}", event_id, round_id, next.as_str());
    Ok(true)
}

pub struct RoundCompletionDetector {
    deps: WorkerDeps,
}

impl RoundCompletionDetector {
    pub fn new(deps: WorkerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl PollWorker for RoundCompletionDetector {
    fn name(&self) -> &'static str {
        "round_detector"
    }

    async fn poll_once(&self) -> Result<usize> {
        let events = self
            .deps
            .store
            .list_events_by_status(EventStatus::Processing)
            .await?;

        let mut closed = 0;
        for event in events {
            if detect_round(&self.deps, &event.event_id, event.current_round).await? {
                closed += 1;
            }
        }
        Ok(closed)
    }
}
