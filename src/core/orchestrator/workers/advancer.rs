use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use super::WorkerDeps;
use crate::core::orchestrator::poller::PollWorker;
use crate::core::orchestrator::types::EventStatus;

/// Opens the next round of `round_finished` events below the ceiling,
/// handing them back to the planner as `pending`.
pub struct RoundAdvancer {
    deps: WorkerDeps,
}

impl RoundAdvancer {
    pub fn new(deps: WorkerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl PollWorker for RoundAdvancer {
    fn name(&self) -> &'static str {
        "round_advancer"
    }

    async fn poll_once(&self) -> Result<usize> {
        let store = &self.deps.store;
        let max_round = self.deps.max_round;
        let events = store
            .list_events_by_status(EventStatus::RoundFinished)
            .await?;

        let mut advanced = 0;
        for event in events {
            if event.current_round >= max_round {
                debug!(
                    "Event {} already at round ceiling {}, not advancing",
                    event.event_id, max_round
                );
                continue;
            }
            if store.advance_event_round(&event.event_id, max_round).await? {
                info!(
                    "Event {} advanced to round {}",
                    event.event_id,
                    event.current_round + 1
                );
                advanced += 1;
            } else {
                info!("Event {} moved before it could advance, skipping", event.event_id);
            }
        }

        if advanced > 0 {
            debug!("Event status counts: {:?}", store.status_counts().await?);
        }
        Ok(advanced)
    }
}
