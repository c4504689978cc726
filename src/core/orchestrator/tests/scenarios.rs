//! End-to-end round flows through all workers, settled over several cycles.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::Harness;
use crate::core::audit::MessageType;
use crate::core::narrator::ScriptedNarrator;
use crate::core::orchestrator::poller::PollWorker;
use crate::core::orchestrator::workers::{RoundAdvancer, RoundCompletionDetector};
use crate::core::orchestrator::{
    CommandStatus, EventStatus, ExecutionStatus, TaskStatus, resolve_event,
};

#[tokio::test]
async fn single_execution_round_advances_to_next_round() {
    let h = Harness::new(ScriptedNarrator::always("blocked 203.0.113.7 at the edge"), 3);
    let event = h.processing_event().await;
    let exec = h.plan_single_execution(&event).await;
    h.finish_execution(&exec, r#"{"rule_id": 42, "status": "applied"}"#, ExecutionStatus::Completed)
        .await;

    h.settle(3).await;

    let store = h.store();
    let exec = store.get_execution(&exec.execution_id).await.unwrap().unwrap();
    assert_eq!(exec.execution_status, ExecutionStatus::Summarized);
    assert_eq!(exec.ai_summary.as_deref(), Some("blocked 203.0.113.7 at the edge"));

    let command = store.get_command(&exec.command_id).await.unwrap().unwrap();
    assert_eq!(command.command_status, CommandStatus::Completed);
    let task = store
        .get_task(exec.task_id.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task.task_status, TaskStatus::Completed);

    let event = h.event(&event.event_id).await;
    assert_eq!(event.status, EventStatus::Pending);
    assert_eq!(event.current_round, 2);

    let summaries = store.list_summaries(&event.event_id).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].round_id, 1);
    assert_eq!(summaries[0].event_suggestion, "");

    assert_eq!(h.audit.of_type(MessageType::ExecutionSummary).len(), 1);
    assert_eq!(h.audit.of_type(MessageType::EventSummary).len(), 1);
    assert_eq!(h.audit.of_type(MessageType::LlmRequest).len(), 2);
}

#[tokio::test]
async fn failed_execution_fails_the_event() {
    let h = Harness::new(ScriptedNarrator::always("unused"), 3);
    let event = h.processing_event().await;
    let exec = h.plan_single_execution(&event).await;
    h.finish_execution(&exec, "connection refused", ExecutionStatus::Failed)
        .await;

    h.settle(3).await;

    let store = h.store();
    let command = store.get_command(&exec.command_id).await.unwrap().unwrap();
    assert_eq!(command.command_status, CommandStatus::Failed);
    let event = h.event(&event.event_id).await;
    assert_eq!(event.status, EventStatus::Failed);
    assert!(store.list_summaries(&event.event_id).await.unwrap().is_empty());
    assert!(h.narrator.requests().is_empty());
}

#[tokio::test]
async fn failed_sibling_waits_for_the_rest() {
    let h = Harness::new(ScriptedNarrator::always("digest"), 3);
    let event = h.processing_event().await;
    let first = h.plan_single_execution(&event).await;
    let second = h
        .store()
        .add_execution(
            &first.command_id,
            first.action_id.as_deref(),
            first.task_id.as_deref(),
            &event.event_id,
            1,
            ExecutionStatus::Processing,
        )
        .await
        .unwrap();
    h.finish_execution(&first, "timeout", ExecutionStatus::Failed).await;

    h.settle(2).await;
    let command = h.store().get_command(&first.command_id).await.unwrap().unwrap();
    assert_eq!(command.command_status, CommandStatus::Processing);
    assert_eq!(h.event(&event.event_id).await.status, EventStatus::Processing);

    h.finish_execution(&second, "{\"hits\": 0}", ExecutionStatus::Completed)
        .await;
    h.settle(2).await;
    let command = h.store().get_command(&first.command_id).await.unwrap().unwrap();
    assert_eq!(command.command_status, CommandStatus::Failed);
    assert_eq!(h.event(&event.event_id).await.status, EventStatus::Failed);
}

#[tokio::test]
async fn resolve_bypasses_the_completion_gate() {
    let h = Harness::new(ScriptedNarrator::always("closed by analyst"), 3);
    let event = h.processing_event().await;
    h.plan_single_execution(&event).await;

    let resolved = resolve_event(&h.deps, &event.event_id, Some("false positive, scanner"))
        .await
        .unwrap();
    assert!(resolved);

    let after = h.event(&event.event_id).await;
    assert_eq!(after.status, EventStatus::Completed);
    assert!(after.manually_resolved);
    assert!(
        after
            .context
            .as_deref()
            .unwrap()
            .contains("false positive, scanner")
    );

    let summaries = h.store().list_summaries(&event.event_id).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].event_summary, "closed by analyst");

    let requests = h.narrator.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].user_prompt.contains("manually marked as resolved"));

    // The task never finished, yet nothing reopens the event.
    h.settle(2).await;
    assert_eq!(h.event(&event.event_id).await.status, EventStatus::Completed);
}

#[tokio::test]
async fn resolve_unknown_or_completed_event() {
    let h = Harness::new(ScriptedNarrator::always("report"), 1);
    assert!(!resolve_event(&h.deps, "ghost", None).await.unwrap());

    let event = h.processing_event().await;
    resolve_event(&h.deps, &event.event_id, None).await.unwrap();
    assert!(resolve_event(&h.deps, &event.event_id, None).await.is_err());
}

#[tokio::test]
async fn failed_resolution_summary_is_retried_by_the_poller() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let narrator = ScriptedNarrator::new(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            anyhow::bail!("upstream 503")
        }
        Ok("final report".to_string())
    });
    let h = Harness::new(narrator, 3);
    let event = h.processing_event().await;

    let err = resolve_event(&h.deps, &event.event_id, None).await.unwrap_err();
    assert!(err.to_string().contains("upstream 503"));
    let stuck = h.event(&event.event_id).await;
    assert_eq!(stuck.status, EventStatus::ToBeSummarized);
    assert!(stuck.manually_resolved);
    assert_eq!(h.audit.of_type(MessageType::Error).len(), 1);

    h.settle(1).await;
    let done = h.event(&event.event_id).await;
    assert_eq!(done.status, EventStatus::Completed);
    assert_eq!(done.current_round, 1);
    let requests = h.narrator.requests();
    assert!(requests[1].user_prompt.contains("manually marked as resolved"));
}

#[tokio::test]
async fn last_round_completes_instead_of_advancing() {
    let h = Harness::new(ScriptedNarrator::always("round report"), 1);
    let event = h.processing_event().await;
    let exec = h.plan_single_execution(&event).await;
    h.finish_execution(&exec, "ok", ExecutionStatus::Completed).await;

    h.settle(3).await;

    let event = h.event(&event.event_id).await;
    assert_eq!(event.status, EventStatus::Completed);
    assert_eq!(event.current_round, 1);

    let advancer = RoundAdvancer::new(h.deps.clone());
    assert_eq!(advancer.poll_once().await.unwrap(), 0);
    assert_eq!(h.event(&event.event_id).await.status, EventStatus::Completed);
}

#[tokio::test]
async fn rounds_stop_at_the_ceiling() {
    let h = Harness::new(ScriptedNarrator::always("round report"), 2);
    let event = h.processing_event().await;
    let exec = h.plan_single_execution(&event).await;
    h.finish_execution(&exec, "ok", ExecutionStatus::Completed).await;
    h.settle(2).await;

    let round_two = h.event(&event.event_id).await;
    assert_eq!(round_two.status, EventStatus::Pending);
    assert_eq!(round_two.current_round, 2);

    h.start_round(&event.event_id).await;
    let round_two = h.event(&event.event_id).await;
    let exec = h.plan_single_execution(&round_two).await;
    h.finish_execution(&exec, "ok", ExecutionStatus::Completed).await;
    h.settle(3).await;

    let done = h.event(&event.event_id).await;
    assert_eq!(done.status, EventStatus::Completed);
    assert_eq!(done.current_round, 2);
    assert_eq!(h.store().list_summaries(&event.event_id).await.unwrap().len(), 2);

    // The second report builds on the first.
    let last = h.narrator.requests().pop().unwrap();
    assert!(last.user_prompt.contains("previous_summary"));
}

#[tokio::test]
async fn detector_acts_once_per_round() {
    let h = Harness::new(ScriptedNarrator::always("unused"), 3);
    let event = h.processing_event().await;
    let exec = h.plan_single_execution(&event).await;
    h.finish_execution(&exec, "ok", ExecutionStatus::Failed).await;

    let store = h.store();
    store
        .set_command_status(&exec.command_id, CommandStatus::Completed)
        .await
        .unwrap();
    store
        .set_task_status(exec.task_id.as_deref().unwrap(), TaskStatus::Completed)
        .await
        .unwrap();

    let detector = RoundCompletionDetector::new(h.deps.clone());
    assert_eq!(detector.poll_once().await.unwrap(), 1);
    assert_eq!(h.event(&event.event_id).await.status, EventStatus::TasksCompleted);

    // Idempotent: the event is no longer processing.
    assert_eq!(detector.poll_once().await.unwrap(), 0);
    assert_eq!(h.event(&event.event_id).await.status, EventStatus::TasksCompleted);
}

#[tokio::test]
async fn empty_round_never_completes() {
    let h = Harness::new(ScriptedNarrator::always("unused"), 3);
    let event = h.processing_event().await;

    h.settle(3).await;
    assert_eq!(h.event(&event.event_id).await.status, EventStatus::Processing);
}

#[tokio::test]
async fn unsummarized_execution_blocks_the_gate() {
    let h = Harness::new(ScriptedNarrator::always("unused"), 3);
    let event = h.processing_event().await;
    let exec = h.plan_single_execution(&event).await;
    h.finish_execution(&exec, "ok", ExecutionStatus::Completed).await;

    let store = h.store();
    store
        .set_task_status(exec.task_id.as_deref().unwrap(), TaskStatus::Completed)
        .await
        .unwrap();

    let detector = RoundCompletionDetector::new(h.deps.clone());
    assert_eq!(detector.poll_once().await.unwrap(), 0);
    assert_eq!(h.event(&event.event_id).await.status, EventStatus::Processing);
}

#[tokio::test]
async fn command_without_executions_stays_processing() {
    let h = Harness::new(ScriptedNarrator::always("unused"), 3);
    let event = h.processing_event().await;
    let task = h.store().add_task(&event.event_id, 1, "triage mailbox").await.unwrap();
    let command = h
        .store()
        .add_command(
            &task.task_id,
            &event.event_id,
            1,
            "pull headers",
            "manual",
            CommandStatus::Processing,
        )
        .await
        .unwrap();

    h.settle(3).await;

    let command = h.store().get_command(&command.command_id).await.unwrap().unwrap();
    assert_eq!(command.command_status, CommandStatus::Processing);
    let task = h.store().get_task(&task.task_id).await.unwrap().unwrap();
    assert_eq!(task.task_status, TaskStatus::Processing);
    assert_eq!(h.event(&event.event_id).await.status, EventStatus::Processing);
}

#[tokio::test]
async fn settled_command_never_changes_again() {
    let h = Harness::new(ScriptedNarrator::always("digest"), 3);
    let event = h.processing_event().await;
    let exec = h.plan_single_execution(&event).await;
    h.finish_execution(&exec, "ok", ExecutionStatus::Completed).await;
    h.settle(1).await;

    // A late failing execution shows up for the already completed command.
    h.store()
        .add_execution(&exec.command_id, None, None, &event.event_id, 1, ExecutionStatus::Failed)
        .await
        .unwrap();
    h.settle(2).await;

    let command = h.store().get_command(&exec.command_id).await.unwrap().unwrap();
    assert_eq!(command.command_status, CommandStatus::Completed);
}
