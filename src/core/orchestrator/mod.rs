mod poller;
mod prompts;
mod report;
mod resolution;
pub mod types;
mod workers;

pub use resolution::resolve_event;
pub use types::{CommandStatus, EventStatus, ExecutionStatus, TaskStatus};
pub use workers::{WorkerDeps, WorkerPool};

/// Event transitions the orchestrator and its collaborators may perform.
/// The store refuses any conditional update that is not listed here.
pub fn can_transition(from: EventStatus, to: EventStatus) -> bool {
    if to == EventStatus::Resolved {
        return !matches!(from, EventStatus::Completed | EventStatus::Resolved);
    }
    match from {
        EventStatus::Pending => matches!(to, EventStatus::Processing),
        EventStatus::Processing => {
            matches!(to, EventStatus::TasksCompleted | EventStatus::Failed)
        }
        EventStatus::TasksCompleted => matches!(to, EventStatus::ToBeSummarized),
        EventStatus::ToBeSummarized => matches!(to, EventStatus::Summarized),
        EventStatus::Summarized => {
            matches!(to, EventStatus::RoundFinished | EventStatus::Completed)
        }
        EventStatus::RoundFinished => matches!(to, EventStatus::Pending),
        EventStatus::Resolved => matches!(to, EventStatus::ToBeSummarized),
        EventStatus::Completed | EventStatus::Failed => false,
    }
}

/// Command status implied by its executions, or `None` while it must stay
/// `processing`. Failure only wins once every sibling is terminal.
pub fn aggregate_command(executions: &[ExecutionStatus]) -> Option<CommandStatus> {
    if executions.is_empty() || !executions.iter().all(|s| s.is_terminal()) {
        return None;
    }
    if executions.contains(&ExecutionStatus::Failed) {
        Some(CommandStatus::Failed)
    } else {
        Some(CommandStatus::Completed)
    }
}

/// Task status implied by its commands. A task without commands is never
/// completed here.
pub fn aggregate_task(commands: &[CommandStatus]) -> Option<TaskStatus> {
    if commands.is_empty() || !commands.iter().all(|s| s.is_terminal()) {
        return None;
    }
    if commands.contains(&CommandStatus::Failed) {
        Some(TaskStatus::Failed)
    } else {
        Some(TaskStatus::Completed)
    }
}

/// Outcome of the round-completion gate: `tasks_completed`, `failed`, or
/// `None` when the round is empty or still running. Executions are the
/// stricter gate since tasks can finish before their executions are digested.
pub fn round_outcome(tasks: &[TaskStatus], executions: &[ExecutionStatus]) -> Option<EventStatus> {
    if tasks.is_empty() || !tasks.iter().all(|s| s.is_terminal()) {
        return None;
    }
    if !executions.iter().all(|s| s.is_terminal()) {
        return None;
    }
    if tasks.contains(&TaskStatus::Failed) {
        Some(EventStatus::Failed)
    } else {
        Some(EventStatus::TasksCompleted)
    }
}

/// Where a `summarized` event goes next.
pub fn status_after_summary(current_round: u32, max_round: u32, manually_resolved: bool) -> EventStatus {
    if manually_resolved || current_round >= max_round {
        EventStatus::Completed
    } else {
        EventStatus::RoundFinished
    }
}

#[cfg(test)]
mod tests;
