use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::Harness;
use crate::core::audit::{MessageType, RecordingAudit};
use crate::core::narrator::{NarrationRequest, Narrator, ScriptedNarrator};
use crate::core::orchestrator::poller::PollWorker;
use crate::core::orchestrator::workers::EventSummarizer;
use crate::core::orchestrator::{EventStatus, WorkerDeps};
use crate::core::store::{EntityStore, test_store};

async fn event_ready_for_report(store: &EntityStore) -> String {
    let ev = store.create_event("phishing", "reported by finance", None).await.unwrap();
    let id = ev.event_id;
    for (from, to) in [
        (EventStatus::Pending, EventStatus::Processing),
        (EventStatus::Processing, EventStatus::TasksCompleted),
        (EventStatus::TasksCompleted, EventStatus::ToBeSummarized),
    ] {
        assert!(store.transition_event(&id, from, to).await.unwrap());
    }
    id
}

#[tokio::test]
async fn structured_report_for_the_event_is_unwrapped() {
    let store = test_store();
    let id = event_ready_for_report(&store).await;
    let reply = format!(
        "```json\n{{\"event_id\": \"{}\", \"summary\": \"mail purged from 12 inboxes\"}}\n```",
        id
    );
    let h = Harness::with_store(store, ScriptedNarrator::always(&reply), 3);

    assert_eq!(EventSummarizer::new(h.deps.clone()).poll_once().await.unwrap(), 1);

    let summary = h.store().latest_summary(&id).await.unwrap().unwrap();
    assert_eq!(summary.event_summary, "mail purged from 12 inboxes");
    assert_eq!(h.event(&id).await.status, EventStatus::RoundFinished);

    let published = h.audit.of_type(MessageType::EventSummary);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].content["event_status"], "summarized");
    assert_eq!(published[0].content["event_summary"], "mail purged from 12 inboxes");
}

#[tokio::test]
async fn report_for_another_event_keeps_raw_text() {
    let store = test_store();
    let id = event_ready_for_report(&store).await;
    let reply = "{\"event_id\": \"someone-else\", \"summary\": \"wrong\"}";
    let h = Harness::with_store(store, ScriptedNarrator::always(reply), 3);

    EventSummarizer::new(h.deps.clone()).poll_once().await.unwrap();

    let summary = h.store().latest_summary(&id).await.unwrap().unwrap();
    assert_eq!(summary.event_summary, reply);
}

#[tokio::test]
async fn narrator_failure_leaves_event_queued() {
    let store = test_store();
    let id = event_ready_for_report(&store).await;
    let h = Harness::with_store(store, ScriptedNarrator::failing("context too long"), 3);

    assert!(EventSummarizer::new(h.deps.clone()).poll_once().await.is_err());

    assert_eq!(h.event(&id).await.status, EventStatus::ToBeSummarized);
    assert!(h.store().latest_summary(&id).await.unwrap().is_none());
    let errors = h.audit.of_type(MessageType::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].content.as_str().unwrap().contains("context too long"));
}

#[tokio::test]
async fn summarized_event_left_behind_is_finished_next_poll() {
    let store = test_store();
    let id = event_ready_for_report(&store).await;
    assert!(store.commit_round_summary(&id, 1, "report", "").await.unwrap().is_some());
    let h = Harness::with_store(store, ScriptedNarrator::always("unused"), 3);

    assert_eq!(EventSummarizer::new(h.deps.clone()).poll_once().await.unwrap(), 1);
    assert_eq!(h.event(&id).await.status, EventStatus::RoundFinished);
    assert!(h.narrator.requests().is_empty());
}

/// Narrator during whose call the event is manually taken elsewhere.
struct DriftingNarrator {
    store: EntityStore,
    event_id: String,
}

#[async_trait]
impl Narrator for DriftingNarrator {
    async fn summarize(&self, _request: &NarrationRequest) -> Result<String> {
        self.store
            .mark_resolved(&self.event_id, EventStatus::ToBeSummarized, None)
            .await?;
        Ok("stale report".into())
    }
}

#[tokio::test]
async fn report_is_dropped_when_event_drifted() {
    let store = test_store();
    let id = event_ready_for_report(&store).await;
    let audit = Arc::new(RecordingAudit::default());
    let deps = WorkerDeps {
        store: store.clone(),
        narrator: Arc::new(DriftingNarrator {
            store: store.clone(),
            event_id: id.clone(),
        }),
        audit: audit.clone(),
        max_round: 3,
    };

    assert_eq!(EventSummarizer::new(deps).poll_once().await.unwrap(), 1);

    assert!(store.list_summaries(&id).await.unwrap().is_empty());
    let ev = store.get_event(&id).await.unwrap().unwrap();
    assert_eq!(ev.status, EventStatus::Resolved);
    assert!(audit.of_type(MessageType::EventSummary).is_empty());
}
