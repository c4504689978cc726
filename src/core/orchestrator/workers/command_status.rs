use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use super::WorkerDeps;
use super::task_status::propagate_task;
use crate::core::orchestrator::aggregate_command;
use crate::core::orchestrator::poller::PollWorker;
use crate::core::orchestrator::types::CommandStatus;

/// Settles `processing` commands once all of their executions are terminal,
/// then re-checks the owning task.
pub struct CommandStatusPropagator {
    deps: WorkerDeps,
}

impl CommandStatusPropagator {
    pub fn new(deps: WorkerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl PollWorker for CommandStatusPropagator {
    fn name(&self) -> &'static str {
        "command_status"
    }

    async fn poll_once(&self) -> Result<usize> {
        let store = &self.deps.store;
        let commands = store
            .list_commands_by_status(CommandStatus::Processing)
            .await?;

        let mut settled = 0;
        for command in commands {
            let statuses: Vec<_> = store
                .list_executions_for_command(&command.command_id)
                .await?
                .into_iter()
                .map(|e| e.execution_status)
                .collect();

            let Some(next) = aggregate_command(&statuses) else {
                debug!(
                    "Command {} still waiting on {} execution(s)",
                    command.command_id,
                    statuses.len()
                );
                continue;
            };
            if !store.set_command_status(&command.command_id, next).await? {
                continue;
            }
            info!("Command {} -> {}", command.command_id, next.as_str());
            settled += 1;

            propagate_task(&self.deps, &command.task_id).await?;
        }
        Ok(settled)
    }
}
