//! The seven polling workers of the round orchestrator.
//!
//! Completion flows bottom-up (execution → command → task → event) and round
//! progression top-down (summarized → round_finished → pending). Workers only
//! coordinate through store state; every event write is a conditional update.

mod advancer;
mod command_status;
mod event_summarizer;
mod execution_summarizer;
mod round_detector;
mod scheduler;
mod task_status;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::poller::{PollWorker, run_poll_loop};
use crate::core::audit::AuditPublisher;
use crate::core::config::{PollConfig, WorkerPolls};
use crate::core::lifecycle::LifecycleComponent;
use crate::core::narrator::Narrator;
use crate::core::store::EntityStore;

pub use advancer::RoundAdvancer;
pub use command_status::CommandStatusPropagator;
pub use event_summarizer::EventSummarizer;
pub use execution_summarizer::ExecutionSummarizer;
pub use round_detector::RoundCompletionDetector;
pub use scheduler::SummaryScheduler;
pub use task_status::TaskStatusPropagator;

pub(crate) use event_summarizer::{finish_summarized_event, summarize_event};

/// Collaborators shared by every worker.
#[derive(Clone)]
pub struct WorkerDeps {
    pub store: EntityStore,
    pub narrator: Arc<dyn Narrator>,
    pub audit: Arc<dyn AuditPublisher>,
    pub max_round: u32,
}

/// Owns the worker loops: spawned on start, cancelled and joined on shutdown.
pub struct WorkerPool {
    deps: WorkerDeps,
    polls: WorkerPolls,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(deps: WorkerDeps, polls: WorkerPolls) -> Self {
        Self {
            deps,
            polls,
            cancel: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    pub fn workers(&self) -> Vec<(Arc<dyn PollWorker>, PollConfig)> {
        let d = &self.deps;
        vec![
            (
                Arc::new(ExecutionSummarizer::new(d.clone())) as Arc<dyn PollWorker>,
                self.polls.execution_summarizer,
            ),
            (
                Arc::new(CommandStatusPropagator::new(d.clone())) as Arc<dyn PollWorker>,
                self.polls.command_status,
            ),
            (
                Arc::new(TaskStatusPropagator::new(d.clone())) as Arc<dyn PollWorker>,
                self.polls.task_status,
            ),
            (
                Arc::new(RoundCompletionDetector::new(d.clone())) as Arc<dyn PollWorker>,
                self.polls.round_detector,
            ),
            (
                Arc::new(SummaryScheduler::new(d.clone())) as Arc<dyn PollWorker>,
                self.polls.summary_scheduler,
            ),
            (
                Arc::new(EventSummarizer::new(d.clone())) as Arc<dyn PollWorker>,
                self.polls.event_summarizer,
            ),
            (
                Arc::new(RoundAdvancer::new(d.clone())) as Arc<dyn PollWorker>,
                self.polls.round_advancer,
            ),
        ]
    }
}

#[async_trait]
impl LifecycleComponent for WorkerPool {
    async fn on_start(&mut self) -> Result<()> {
        for (worker, poll) in self.workers() {
            self.handles
                .push(tokio::spawn(run_poll_loop(worker, poll, self.cancel.clone())));
        }
        info!(
            "Worker pool started: {} workers, max_round={}",
            self.handles.len(),
            self.deps.max_round
        );
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        self.cancel.cancel();
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                warn!("Worker task ended abnormally: {}", e);
            }
        }
        info!("Worker pool stopped");
        Ok(())
    }
}
