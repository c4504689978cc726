use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::WorkerDeps;
use crate::core::audit::{AuditMessage, FROM_EXPERT, MessageType};
use crate::core::narrator::NarrationRequest;
use crate::core::orchestrator::poller::PollWorker;
use crate::core::orchestrator::prompts;
use crate::core::orchestrator::types::ExecutionStatus;
use crate::core::store::ExecutionRecord;

/// Turns `completed` executions into `summarized` ones by asking the narrator
/// for a digest of the raw result.
pub struct ExecutionSummarizer {
    deps: WorkerDeps,
}

impl ExecutionSummarizer {
    pub fn new(deps: WorkerDeps) -> Self {
        Self { deps }
    }

    async fn digest_context(&self, exec: &ExecutionRecord, raw: &str) -> Result<Value> {
        let store = &self.deps.store;
        let command = store.get_command(&exec.command_id).await?;
        let action = match &exec.action_id {
            Some(id) => store.get_action(id).await?,
            None => None,
        };
        let task = match &exec.task_id {
            Some(id) => store.get_task(id).await?,
            None => None,
        };

        // Structured results stay structured in the prompt.
        let result = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| json!(raw));

        Ok(json!({
            "execution_id": exec.execution_id,
            "command_id": exec.command_id,
            "command_name": command.as_ref().map_or("unknown command", |c| c.command_name.as_str()),
            "command_type": command.as_ref().map_or("unknown type", |c| c.command_type.as_str()),
            "action_id": exec.action_id,
            "action_name": action.as_ref().map_or("unknown action", |a| a.action_name.as_str()),
            "task_id": exec.task_id,
            "task_name": task.as_ref().map_or("unknown task", |t| t.task_name.as_str()),
            "event_id": exec.event_id,
            "round_id": exec.round_id,
            "execution_status": exec.execution_status,
            "execution_result": result,
            "req_id": uuid::Uuid::new_v4().to_string(),
            "res_id": uuid::Uuid::new_v4().to_string(),
        }))
    }

    /// Returns whether the execution moved to `summarized`.
    async fn summarize(&self, exec: &ExecutionRecord) -> Result<bool> {
        let raw = match exec.execution_result.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => {
                warn!(
                    "Execution {} has no result yet, leaving it completed",
                    exec.execution_id
                );
                return Ok(false);
            }
        };

        let context = self.digest_context(exec, raw).await?;
        let request = NarrationRequest {
            system_prompt: prompts::EXECUTION_DIGEST_SYSTEM.to_string(),
            user_prompt: prompts::execution_digest_prompt(&context),
            temperature: prompts::DIGEST_TEMPERATURE,
            long_text: true,
        };

        info!("Summarizing execution {}", exec.execution_id);
        self.deps
            .audit
            .publish(AuditMessage::notice(
                &exec.event_id,
                exec.round_id,
                MessageType::LlmRequest,
                prompts::EXECUTION_DIGEST_NOTICE,
            ))
            .await;

        let digest = self.deps.narrator.summarize(&request).await?;

        if !self
            .deps
            .store
            .finish_execution_summary(&exec.execution_id, &digest)
            .await?
        {
            info!(
                "Execution {} left completed before its digest landed, dropping it",
                exec.execution_id
            );
            return Ok(false);
        }
        info!("Execution {} summarized", exec.execution_id);

        self.deps
            .audit
            .publish(AuditMessage::new(
                &exec.event_id,
                exec.round_id,
                FROM_EXPERT,
                MessageType::ExecutionSummary,
                json!({
                    "execution_id": exec.execution_id,
                    "command_id": exec.command_id,
                    "action_id": exec.action_id,
                    "task_id": exec.task_id,
                    "ai_summary": digest,
                }),
            ))
            .await;
        Ok(true)
    }
}

#[async_trait]
impl PollWorker for ExecutionSummarizer {
    fn name(&self) -> &'static str {
        "execution_summarizer"
    }

    async fn poll_once(&self) -> Result<usize> {
        let pending = self
            .deps
            .store
            .list_executions_by_status(ExecutionStatus::Completed)
            .await?;
        if !pending.is_empty() {
            info!("Found {} execution(s) awaiting a digest", pending.len());
        }

        let mut done = 0;
        let mut failures = 0;
        for exec in &pending {
            match self.summarize(exec).await {
                Ok(true) => done += 1,
                Ok(false) => {}
                Err(e) => {
                    failures += 1;
                    error!("Failed to summarize execution {}: {:#}", exec.execution_id, e);
                }
            }
        }

        if failures > 0 && done == 0 {
            return Err(anyhow!("{} execution digest(s) failed", failures));
        }
        Ok(pending.len())
    }
}
