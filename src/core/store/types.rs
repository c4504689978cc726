use crate::core::orchestrator::{CommandStatus, EventStatus, ExecutionStatus, TaskStatus};

#[derive(Debug, Clone, serde::Serialize)]
pub struct EventRecord {
    pub event_id: String,
    pub event_name: String,
    pub message: String,
    /// Free-form JSON blob; resolution notes are merged into it.
    pub context: Option<String>,
    pub status: EventStatus,
    pub current_round: u32,
    pub manually_resolved: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub event_id: String,
    pub round_id: u32,
    pub task_name: String,
    pub task_status: TaskStatus,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ActionRecord {
    pub action_id: String,
    pub task_id: String,
    pub event_id: String,
    pub round_id: u32,
    pub action_name: String,
    pub action_status: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CommandRecord {
    pub command_id: String,
    pub task_id: String,
    pub event_id: String,
    pub round_id: u32,
    pub command_name: String,
    pub command_type: String,
    pub command_status: CommandStatus,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub command_id: String,
    pub action_id: Option<String>,
    pub task_id: Option<String>,
    pub event_id: String,
    pub round_id: u32,
    pub execution_result: Option<String>,
    pub ai_summary: Option<String>,
    pub execution_status: ExecutionStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SummaryRecord {
    pub summary_id: String,
    pub event_id: String,
    pub round_id: u32,
    pub event_summary: String,
    pub event_suggestion: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageRecord {
    pub message_id: String,
    pub event_id: String,
    pub round_id: u32,
    pub message_from: String,
    pub message_type: String,
    pub content_json: String,
    pub created_at: String,
}
