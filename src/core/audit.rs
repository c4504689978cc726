use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::core::store::EntityStore;

pub const FROM_SYSTEM: &str = "system";
pub const FROM_EXPERT: &str = "_expert";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    LlmRequest,
    ExecutionSummary,
    EventSummary,
    Error,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::LlmRequest => "llm_request",
            MessageType::ExecutionSummary => "execution_summary",
            MessageType::EventSummary => "event_summary",
            MessageType::Error => "error",
        }
    }
}

/// One audit/notification record about an event's round.
#[derive(Debug, Clone, Serialize)]
pub struct AuditMessage {
    pub event_id: String,
    pub round_id: u32,
    pub message_from: String,
    pub message_type: MessageType,
    pub content: Value,
}

impl AuditMessage {
    pub fn new(
        event_id: &str,
        round_id: u32,
        message_from: &str,
        message_type: MessageType,
        content: Value,
    ) -> Self {
        Self {
            event_id: event_id.to_string(),
            round_id,
            message_from: message_from.to_string(),
            message_type,
            content,
        }
    }

    /// System notice, e.g. "waiting for the narrator".
    pub fn notice(event_id: &str, round_id: u32, message_type: MessageType, text: &str) -> Self {
        Self::new(
            event_id,
            round_id,
            FROM_SYSTEM,
            message_type,
            Value::String(text.to_string()),
        )
    }
}

/// Fire-and-forget: implementations log their own failures.
#[async_trait]
pub trait AuditPublisher: Send + Sync {
    async fn publish(&self, message: AuditMessage);
}

/// Persists messages into the store and fans them out to live subscribers.
pub struct StoreAuditPublisher {
    store: EntityStore,
    sender: broadcast::Sender<AuditMessage>,
}

impl StoreAuditPublisher {
    pub fn new(store: EntityStore) -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { store, sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditMessage> {
        self.sender.subscribe()
    }

    fn broadcast(&self, message: AuditMessage) {
        if self.sender.send(message).is_err() {
            debug!("No audit subscribers");
        }
    }
}

#[async_trait]
impl AuditPublisher for StoreAuditPublisher {
    async fn publish(&self, message: AuditMessage) {
        let content = message.content.to_string();
        match self
            .store
            .add_message(
                &message.event_id,
                message.round_id,
                &message.message_from,
                message.message_type.as_str(),
                &content,
            )
            .await
        {
            Ok(_) => self.broadcast(message),
            Err(e) => {
                warn!(
                    "Failed to persist {} message for event {}: {}; broadcasting directly",
                    message.message_type.as_str(),
                    message.event_id,
                    e
                );
                self.broadcast(message);
            }
        }
    }
}

#[cfg(test)]
pub use recording::RecordingAudit;
