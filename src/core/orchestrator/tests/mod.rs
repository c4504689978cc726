mod round_report;
mod scenarios;

use std::sync::Arc;

use crate::core::audit::RecordingAudit;
use crate::core::config::WorkerPolls;
use crate::core::narrator::ScriptedNarrator;
use crate::core::orchestrator::poller::PollWorker;
use crate::core::orchestrator::{
    CommandStatus, EventStatus, ExecutionStatus, WorkerDeps, WorkerPool,
};
use crate::core::store::{EntityStore, EventRecord, ExecutionRecord, test_store};

/// All seven workers over one in-memory store, driven one poll at a time.
pub(super) struct Harness {
    pub deps: WorkerDeps,
    pub narrator: Arc<ScriptedNarrator>,
    pub audit: Arc<RecordingAudit>,
    workers: Vec<Arc<dyn PollWorker>>,
}

impl Harness {
    pub fn new(narrator: ScriptedNarrator, max_round: u32) -> Self {
        Self::with_store(test_store(), narrator, max_round)
    }

    pub fn with_store(store: EntityStore, narrator: ScriptedNarrator, max_round: u32) -> Self {
        let narrator = Arc::new(narrator);
        let audit = Arc::new(RecordingAudit::default());
        let deps = WorkerDeps {
            store,
            narrator: narrator.clone(),
            audit: audit.clone(),
            max_round,
        };
        let workers = WorkerPool::new(deps.clone(), WorkerPolls::default())
            .workers()
            .into_iter()
            .map(|(w, _)| w)
            .collect();
        Self {
            deps,
            narrator,
            audit,
            workers,
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.deps.store
    }

    /// Runs every worker once per cycle, in pipeline order. Poll errors are
    /// tolerated the way the loops tolerate them.
    pub async fn settle(&self, cycles: usize) {
        for _ in 0..cycles {
            for worker in &self.workers {
                let _ = worker.poll_once().await;
            }
        }
    }

    pub async fn event(&self, event_id: &str) -> EventRecord {
        self.store().get_event(event_id).await.unwrap().unwrap()
    }

    /// Intake plus the planner's hand-off: a `processing` event in round 1.
    pub async fn processing_event(&self) -> EventRecord {
        let ev = self
            .store()
            .create_event("ssh brute force", "500 failed logins on bastion-1", None)
            .await
            .unwrap();
        self.start_round(&ev.event_id).await;
        self.event(&ev.event_id).await
    }

    pub async fn start_round(&self, event_id: &str) {
        assert!(
            self.store()
                .transition_event(event_id, EventStatus::Pending, EventStatus::Processing)
                .await
                .unwrap()
        );
    }

    /// One task → one action → one command → one execution in the event's
    /// current round, the execution still `processing`.
    pub async fn plan_single_execution(&self, event: &EventRecord) -> ExecutionRecord {
        let store = self.store();
        let round = event.current_round;
        let task = store
            .add_task(&event.event_id, round, "contain source ip")
            .await
            .unwrap();
        let action = store
            .add_action(&task.task_id, &event.event_id, round, "block at edge")
            .await
            .unwrap();
        let command = store
            .add_command(
                &task.task_id,
                &event.event_id,
                round,
                "block 203.0.113.7",
                "firewall",
                CommandStatus::Processing,
            )
            .await
            .unwrap();
        store
            .add_execution(
                &command.command_id,
                Some(&action.action_id),
                Some(&task.task_id),
                &event.event_id,
                round,
                ExecutionStatus::Processing,
            )
            .await
            .unwrap()
    }

    pub async fn finish_execution(&self, exec: &ExecutionRecord, result: &str, status: ExecutionStatus) {
        assert!(
            self.store()
                .record_execution_result(&exec.execution_id, Some(result), status)
                .await
                .unwrap()
        );
    }
}
