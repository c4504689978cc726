use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::WorkerDeps;
use crate::core::audit::{AuditMessage, FROM_EXPERT, MessageType};
use crate::core::narrator::NarrationRequest;
use crate::core::orchestrator::poller::PollWorker;
use crate::core::orchestrator::report::{ReportDecode, decode_round_report};
use crate::core::orchestrator::types::EventStatus;
use crate::core::orchestrator::{prompts, status_after_summary};
use crate::core::store::{EventRecord, SummaryRecord};

async fn round_context(deps: &WorkerDeps, event: &EventRecord) -> Result<(Value, bool)> {
    let store = &deps.store;
    let id = event.event_id.as_str();

    let tasks_data: Vec<Value> = store
        .list_tasks_for_event(id)
        .await?
        .into_iter()
        .map(|t| {
            json!({
                "task_id": t.task_id,
                "task_name": t.task_name,
                "task_status": t.task_status,
            })
        })
        .collect();
    let actions_data: Vec<Value> = store
        .list_actions_for_event(id)
        .await?
        .into_iter()
        .map(|a| {
            json!({
                "action_id": a.action_id,
                "action_name": a.action_name,
                "action_status": a.action_status,
            })
        })
        .collect();
    let commands_data: Vec<Value> = store
        .list_commands_for_event(id)
        .await?
        .into_iter()
        .map(|c| {
            json!({
                "command_id": c.command_id,
                "command_name": c.command_name,
                "command_status": c.command_status,
            })
        })
        .collect();
    let executions_data: Vec<Value> = store
        .list_executions_for_event(id)
        .await?
        .into_iter()
        .map(|e| {
            json!({
                "execution_id": e.execution_id,
                "execution_status": e.execution_status,
                "command_id": e.command_id,
                "round_id": e.round_id,
                "ai_summary": e.ai_summary,
            })
        })
        .collect();

    let mut context = json!({
        "from": "system",
        "to": FROM_EXPERT,
        "type": "generate_event_summary",
        "event_id": id,
        "event_name": event.event_name,
        "event_message": event.message,
        "round_id": event.current_round,
        "event_status": event.status,
        "tasks_data": tasks_data,
        "actions_data": actions_data,
        "commands_data": commands_data,
        "executions_data": executions_data,
        "req_id": uuid::Uuid::new_v4().to_string(),
        "res_id": uuid::Uuid::new_v4().to_string(),
    });

    let previous = store.latest_summary(id).await?;
    let has_previous = previous.is_some();
    if let (Some(prev), Some(obj)) = (previous, context.as_object_mut()) {
        obj.insert("previous_summary".into(), Value::String(prev.event_summary));
    }
    Ok((context, has_previous))
}

/// Produces and commits the round report of a `to_be_summarized` event.
/// `Ok(None)` means the event drifted out of `to_be_summarized` meanwhile.
/// A narrator failure is published as an `error` message and returned.
pub(crate) async fn summarize_event(
    deps: &WorkerDeps,
    event: &EventRecord,
) -> Result<Option<SummaryRecord>> {
    let id = event.event_id.as_str();
    let (context, has_previous) = round_context(deps, event).await?;
    let request = NarrationRequest {
        system_prompt: prompts::ROUND_REPORT_SYSTEM.to_string(),
        user_prompt: prompts::round_report_prompt(&context, has_previous, event.manually_resolved),
        temperature: prompts::DIGEST_TEMPERATURE,
        long_text: true,
    };

    info!("Requesting round {} report for event {}", event.current_round, id);
    deps.audit
        .publish(AuditMessage::notice(
            id,
            event.current_round,
            MessageType::LlmRequest,
            prompts::ROUND_REPORT_NOTICE,
        ))
        .await;

    let raw = match deps.narrator.summarize(&request).await {
        Ok(raw) => raw,
        Err(e) => {
            let text = format!("Failed to generate the round report: {:#}", e);
            deps.audit
                .publish(AuditMessage::notice(
                    id,
                    event.current_round,
                    MessageType::Error,
                    &text,
                ))
                .await;
            return Err(anyhow!(text));
        }
    };

    let decoded = decode_round_report(&raw, id);
    match &decoded {
        ReportDecode::Parsed { .. } => {}
        ReportDecode::FallbackRaw { .. } => {
            warn!("Round report for event {} is not structured, keeping raw text", id)
        }
        ReportDecode::Mismatch { found } => warn!(
            "Round report names event {:?} instead of {}, keeping raw text",
            found, id
        ),
    }
    let summary_text = decoded.into_summary_text(&raw);

    let Some(summary) = deps
        .store
        .commit_round_summary(id, event.current_round, &summary_text, "")
        .await?
    else {
        info!("Event {} left to_be_summarized, dropping its report", id);
        return Ok(None);
    };
    info!("Round {} report saved for event {}", event.current_round, id);

    deps.audit
        .publish(AuditMessage::new(
            id,
            event.current_round,
            FROM_EXPERT,
            MessageType::EventSummary,
            json!({
                "event_id": id,
                "event_name": event.event_name,
                "event_status": EventStatus::Summarized,
                "round_id": event.current_round,
                "event_summary": summary.event_summary,
                "event_suggestion": summary.event_suggestion,
            }),
        ))
        .await;
    Ok(Some(summary))
}

/// Moves a `summarized` event on: `completed` at the round ceiling or after a
/// manual resolution, `round_finished` otherwise.
pub(crate) async fn finish_summarized_event(deps: &WorkerDeps, event_id: &str) -> Result<bool> {
    let Some(event) = deps.store.get_event(event_id).await? else {
        return Ok(false);
    };
    if event.status != EventStatus::Summarized {
        return Ok(false);
    }
    let next = status_after_summary(event.current_round, deps.max_round, event.manually_resolved);
    let moved = deps
        .store
        .transition_event(event_id, EventStatus::Summarized, next)
        .await?;
    if moved {
        info!("Event {} -> {}", event_id, next.as_str());
    }
    Ok(moved)
}

pub struct EventSummarizer {
    deps: WorkerDeps,
}

impl EventSummarizer {
    pub fn new(deps: WorkerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl PollWorker for EventSummarizer {
    fn name(&self) -> &'static str {
        "event_summarizer"
    }

    async fn poll_once(&self) -> Result<usize> {
        let store = &self.deps.store;
        let mut handled = 0;

        // Heals events left at `summarized` by an interrupted previous pass.
        let stranded = store.list_events_by_status(EventStatus::Summarized).await?;
        for event in &stranded {
            if finish_summarized_event(&self.deps, &event.event_id).await? {
                handled += 1;
            }
        }

        let queued = store
            .list_events_by_status(EventStatus::ToBeSummarized)
            .await?;
        let mut failures = 0;
        for event in &queued {
            match summarize_event(&self.deps, event).await {
                Ok(Some(_)) => {
                    handled += 1;
                    finish_summarized_event(&self.deps, &event.event_id).await?;
                }
                Ok(None) => {}
                Err(e) => {
                    failures += 1;
                    error!("Round report for event {} failed: {:#}", event.event_id, e);
                }
            }
        }

        if failures > 0 && handled == 0 {
            return Err(anyhow!("{} round report(s) failed", failures));
        }
        Ok(stranded.len() + queued.len())
    }
}
