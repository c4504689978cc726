/// Lifecycle of one incident. Rounds loop through
/// `pending → processing → tasks_completed → to_be_summarized → summarized → round_finished`
/// until the round ceiling turns `summarized` into `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Processing,
    TasksCompleted,
    ToBeSummarized,
    Summarized,
    RoundFinished,
    Completed,
    Failed,
    Resolved,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Processing => "processing",
            EventStatus::TasksCompleted => "tasks_completed",
            EventStatus::ToBeSummarized => "to_be_summarized",
            EventStatus::Summarized => "summarized",
            EventStatus::RoundFinished => "round_finished",
            EventStatus::Completed => "completed",
            EventStatus::Failed => "failed",
            EventStatus::Resolved => "resolved",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(EventStatus::Pending),
            "processing" => Some(EventStatus::Processing),
            "tasks_completed" => Some(EventStatus::TasksCompleted),
            "to_be_summarized" => Some(EventStatus::ToBeSummarized),
            "summarized" => Some(EventStatus::Summarized),
            "round_finished" => Some(EventStatus::RoundFinished),
            "completed" => Some(EventStatus::Completed),
            "failed" => Some(EventStatus::Failed),
            "resolved" => Some(EventStatus::Resolved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "processing" => Some(TaskStatus::Processing),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl CommandStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Processing => "processing",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(CommandStatus::Pending),
            "processing" => Some(CommandStatus::Processing),
            "completed" => Some(CommandStatus::Completed),
            "failed" => Some(CommandStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CommandStatus::Completed | CommandStatus::Failed)
    }
}

/// `completed` means the raw result is in but not yet digested; only
/// `summarized` and `failed` count as terminal for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Processing,
    Completed,
    Summarized,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Processing => "processing",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Summarized => "summarized",
            ExecutionStatus::Failed => "failed",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ExecutionStatus::Pending),
            "processing" => Some(ExecutionStatus::Processing),
            "completed" => Some(ExecutionStatus::Completed),
            "summarized" => Some(ExecutionStatus::Summarized),
            "failed" => Some(ExecutionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Summarized | ExecutionStatus::Failed)
    }
}
