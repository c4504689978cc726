use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::WorkerDeps;
use crate::core::orchestrator::poller::PollWorker;
use crate::core::orchestrator::types::EventStatus;

/// Queues `tasks_completed` events for the event summarizer.
pub struct SummaryScheduler {
    deps: WorkerDeps,
}

impl SummaryScheduler {
    pub fn new(deps: WorkerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl PollWorker for SummaryScheduler {
    fn name(&self) -> &'static str {
        "summary_scheduler"
    }

    async fn poll_once(&self) -> Result<usize> {
        let store = &self.deps.store;
        let events = store
            .list_events_by_status(EventStatus::TasksCompleted)
            .await?;

        let mut queued = 0;
        for event in events {
            if store
                .transition_event(
                    &event.event_id,
                    EventStatus::TasksCompleted,
                    EventStatus::ToBeSummarized,
                )
                .await?
            {
                info!("Event {} queued for its round report", event.event_id);
                queued += 1;
            }
        }
        Ok(queued)
    }
}
