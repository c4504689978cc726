use anyhow::Result;
use rusqlite::{OptionalExtension, params};

use super::types::{ActionRecord, CommandRecord, ExecutionRecord, TaskRecord};
use super::{EntityStore, status_column};
use crate::core::orchestrator::{CommandStatus, ExecutionStatus, TaskStatus};

const TASK_COLUMNS: &str = "task_id, event_id, round_id, task_name, task_status";
const ACTION_COLUMNS: &str =
    "action_id, task_id, event_id, round_id, action_name, action_status";
const COMMAND_COLUMNS: &str =
    "command_id, task_id, event_id, round_id, command_name, command_type, command_status";
const EXECUTION_COLUMNS: &str = "execution_id, command_id, action_id, task_id, event_id, round_id, \
     execution_result, ai_summary, execution_status, created_at";

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRecord> {
    Ok(TaskRecord {
        task_id: row.get(0)?,
        event_id: row.get(1)?,
        round_id: row.get(2)?,
        task_name: row.get(3)?,
        task_status: status_column(row, 4, TaskStatus::from_status)?,
    })
}

fn action_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActionRecord> {
    Ok(ActionRecord {
        action_id: row.get(0)?,
        task_id: row.get(1)?,
        event_id: row.get(2)?,
        round_id: row.get(3)?,
        action_name: row.get(4)?,
        action_status: row.get(5)?,
    })
}

fn command_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommandRecord> {
    Ok(CommandRecord {
        command_id: row.get(0)?,
        task_id: row.get(1)?,
        event_id: row.get(2)?,
        round_id: row.get(3)?,
        command_name: row.get(4)?,
        command_type: row.get(5)?,
        command_status: status_column(row, 6, CommandStatus::from_status)?,
    })
}

fn execution_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExecutionRecord> {
    Ok(ExecutionRecord {
        execution_id: row.get(0)?,
        command_id: row.get(1)?,
        action_id: row.get(2)?,
        task_id: row.get(3)?,
        event_id: row.get(4)?,
        round_id: row.get(5)?,
        execution_result: row.get(6)?,
        ai_summary: row.get(7)?,
        execution_status: status_column(row, 8, ExecutionStatus::from_status)?,
        created_at: row.get(9)?,
    })
}

impl EntityStore {
    fn collect<T>(
        db: &rusqlite::Connection,
        sql: &str,
        params: impl rusqlite::Params,
        map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let mut stmt = db.prepare(sql)?;
        let rows = stmt.query_map(params, map)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // --- Tasks ---

    /// Planner entry point: tasks are born `processing` at round start.
    pub async fn add_task(&self, event_id: &str, round_id: u32, task_name: &str) -> Result<TaskRecord> {
        let task_id = uuid::Uuid::new_v4().to_string();
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO tasks (task_id, event_id, round_id, task_name, task_status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                task_id,
                event_id,
                round_id,
                task_name,
                TaskStatus::Processing.as_str()
            ],
        )?;
        Ok(TaskRecord {
            task_id,
            event_id: event_id.to_string(),
            round_id,
            task_name: task_name.to_string(),
            task_status: TaskStatus::Processing,
        })
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        let db = self.db.lock().await;
        let rec = db
            .query_row(
                &format!("SELECT {} FROM tasks WHERE task_id = ?1", TASK_COLUMNS),
                params![task_id],
                task_from_row,
            )
            .optional()?;
        Ok(rec)
    }

    pub async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<TaskRecord>> {
        let db = self.db.lock().await;
        Self::collect(
            &db,
            &format!(
                "SELECT {} FROM tasks WHERE task_status = ?1 ORDER BY created_at ASC, rowid ASC",
                TASK_COLUMNS
            ),
            params![status.as_str()],
            task_from_row,
        )
    }

    pub async fn list_tasks_for_round(&self, event_id: &str, round_id: u32) -> Result<Vec<TaskRecord>> {
        let db = self.db.lock().await;
        Self::collect(
            &db,
            &format!(
                "SELECT {} FROM tasks WHERE event_id = ?1 AND round_id = ?2 ORDER BY rowid ASC",
                TASK_COLUMNS
            ),
            params![event_id, round_id],
            task_from_row,
        )
    }

    pub async fn list_tasks_for_event(&self, event_id: &str) -> Result<Vec<TaskRecord>> {
        let db = self.db.lock().await;
        Self::collect(
            &db,
            &format!(
                "SELECT {} FROM tasks WHERE event_id = ?1 ORDER BY round_id ASC, rowid ASC",
                TASK_COLUMNS
            ),
            params![event_id],
            task_from_row,
        )
    }

    /// Terminal task statuses never change again.
    pub async fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE tasks SET task_status = ?1, updated_at = CURRENT_TIMESTAMP
             WHERE task_id = ?2 AND task_status NOT IN ('completed', 'failed')",
            params![status.as_str(), task_id],
        )?;
        Ok(rows > 0)
    }

    // --- Actions ---

    pub async fn add_action(
        &self,
        task_id: &str,
        event_id: &str,
        round_id: u32,
        action_name: &str,
    ) -> Result<ActionRecord> {
        let action_id = uuid::Uuid::new_v4().to_string();
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO actions (action_id, task_id, event_id, round_id, action_name, action_status)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending')",
            params![action_id, task_id, event_id, round_id, action_name],
        )?;
        Ok(ActionRecord {
            action_id,
            task_id: task_id.to_string(),
            event_id: event_id.to_string(),
            round_id,
            action_name: action_name.to_string(),
            action_status: "pending".to_string(),
        })
    }

    pub async fn get_action(&self, action_id: &str) -> Result<Option<ActionRecord>> {
        let db = self.db.lock().await;
        let rec = db
            .query_row(
                &format!("SELECT {} FROM actions WHERE action_id = ?1", ACTION_COLUMNS),
                params![action_id],
                action_from_row,
            )
            .optional()?;
        Ok(rec)
    }

    pub async fn list_actions_for_event(&self, event_id: &str) -> Result<Vec<ActionRecord>> {
        let db = self.db.lock().await;
        Self::collect(
            &db,
            &format!(
                "SELECT {} FROM actions WHERE event_id = ?1 ORDER BY round_id ASC, rowid ASC",
                ACTION_COLUMNS
            ),
            params![event_id],
            action_from_row,
        )
    }

    // --- Commands ---

    pub async fn add_command(
        &self,
        task_id: &str,
        event_id: &str,
        round_id: u32,
        command_name: &str,
        command_type: &str,
        status: CommandStatus,
    ) -> Result<CommandRecord> {
        let command_id = uuid::Uuid::new_v4().to_string();
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO commands (command_id, task_id, event_id, round_id, command_name, command_type, command_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                command_id,
                task_id,
                event_id,
                round_id,
                command_name,
                command_type,
                status.as_str()
            ],
        )?;
        Ok(CommandRecord {
            command_id,
            task_id: task_id.to_string(),
            event_id: event_id.to_string(),
            round_id,
            command_name: command_name.to_string(),
            command_type: command_type.to_string(),
            command_status: status,
        })
    }

    pub async fn get_command(&self, command_id: &str) -> Result<Option<CommandRecord>> {
        let db = self.db.lock().await;
        let rec = db
            .query_row(
                &format!("SELECT {} FROM commands WHERE command_id = ?1", COMMAND_COLUMNS),
                params![command_id],
                command_from_row,
            )
            .optional()?;
        Ok(rec)
    }

    pub async fn list_commands_by_status(&self, status: CommandStatus) -> Result<Vec<CommandRecord>> {
        let db = self.db.lock().await;
        Self::collect(
            &db,
            &format!(
                "SELECT {} FROM commands WHERE command_status = ?1 ORDER BY created_at ASC, rowid ASC",
                COMMAND_COLUMNS
            ),
            params![status.as_str()],
            command_from_row,
        )
    }

    pub async fn list_commands_for_task(&self, task_id: &str) -> Result<Vec<CommandRecord>> {
        let db = self.db.lock().await;
        Self::collect(
            &db,
            &format!(
                "SELECT {} FROM commands WHERE task_id = ?1 ORDER BY rowid ASC",
                COMMAND_COLUMNS
            ),
            params![task_id],
            command_from_row,
        )
    }

    pub async fn list_commands_for_event(&self, event_id: &str) -> Result<Vec<CommandRecord>> {
        let db = self.db.lock().await;
        Self::collect(
            &db,
            &format!(
                "SELECT {} FROM commands WHERE event_id = ?1 ORDER BY round_id ASC, rowid ASC",
                COMMAND_COLUMNS
            ),
            params![event_id],
            command_from_row,
        )
    }

    /// Terminal command statuses never change again.
    pub async fn set_command_status(&self, command_id: &str, status: CommandStatus) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE commands SET command_status = ?1, updated_at = CURRENT_TIMESTAMP
             WHERE command_id = ?2 AND command_status NOT IN ('completed', 'failed')",
            params![status.as_str(), command_id],
        )?;
        Ok(rows > 0)
    }

    // --- Executions ---

    pub async fn add_execution(
        &self,
        command_id: &str,
        action_id: Option<&str>,
        task_id: Option<&str>,
        event_id: &str,
        round_id: u32,
        status: ExecutionStatus,
    ) -> Result<ExecutionRecord> {
        let execution_id = uuid::Uuid::new_v4().to_string();
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO executions (execution_id, command_id, action_id, task_id, event_id, round_id, execution_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                execution_id,
                command_id,
                action_id,
                task_id,
                event_id,
                round_id,
                status.as_str()
            ],
        )?;
        let rec = db.query_row(
            &format!(
                "SELECT {} FROM executions WHERE execution_id = ?1",
                EXECUTION_COLUMNS
            ),
            params![execution_id],
            execution_from_row,
        )?;
        Ok(rec)
    }

    /// Execution-producer entry point: records the raw result and its status
    /// (`completed` or `failed`).
    pub async fn record_execution_result(
        &self,
        execution_id: &str,
        result: Option<&str>,
        status: ExecutionStatus,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE executions
             SET execution_result = COALESCE(?1, execution_result), execution_status = ?2, updated_at = CURRENT_TIMESTAMP
             WHERE execution_id = ?3 AND execution_status NOT IN ('summarized', 'failed')",
            params![result, status.as_str(), execution_id],
        )?;
        Ok(rows > 0)
    }

    /// Stores the digest and marks the execution `summarized`, only while it
    /// is still `completed`.
    pub async fn finish_execution_summary(&self, execution_id: &str, ai_summary: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE executions
             SET ai_summary = ?1, execution_status = ?2, updated_at = CURRENT_TIMESTAMP
             WHERE execution_id = ?3 AND execution_status = ?4",
            params![
                ai_summary,
                ExecutionStatus::Summarized.as_str(),
                execution_id,
                ExecutionStatus::Completed.as_str()
            ],
        )?;
        Ok(rows > 0)
    }

    pub async fn get_execution(&self, execution_id: &str) -> Result<Option<ExecutionRecord>> {
        let db = self.db.lock().await;
        let rec = db
            .query_row(
                &format!(
                    "SELECT {} FROM executions WHERE execution_id = ?1",
                    EXECUTION_COLUMNS
                ),
                params![execution_id],
                execution_from_row,
            )
            .optional()?;
        Ok(rec)
    }

    /// Oldest first.
    pub async fn list_executions_by_status(
        &self,
        status: ExecutionStatus,
    ) -> Result<Vec<ExecutionRecord>> {
        let db = self.db.lock().await;
        Self::collect(
            &db,
            &format!(
                "SELECT {} FROM executions WHERE execution_status = ?1 ORDER BY created_at ASC, rowid ASC",
                EXECUTION_COLUMNS
            ),
            params![status.as_str()],
            execution_from_row,
        )
    }

    pub async fn list_executions_for_command(&self, command_id: &str) -> Result<Vec<ExecutionRecord>> {
        let db = self.db.lock().await;
        Self::collect(
            &db,
            &format!(
                "SELECT {} FROM executions WHERE command_id = ?1 ORDER BY rowid ASC",
                EXECUTION_COLUMNS
            ),
            params![command_id],
            execution_from_row,
        )
    }

    pub async fn list_executions_for_round(
        &self,
        event_id: &str,
        round_id: u32,
    ) -> Result<Vec<ExecutionRecord>> {
        let db = self.db.lock().await;
        Self::collect(
            &db,
            &format!(
                "SELECT {} FROM executions WHERE event_id = ?1 AND round_id = ?2 ORDER BY rowid ASC",
                EXECUTION_COLUMNS
            ),
            params![event_id, round_id],
            execution_from_row,
        )
    }

    pub async fn list_executions_for_event(&self, event_id: &str) -> Result<Vec<ExecutionRecord>> {
        let db = self.db.lock().await;
        Self::collect(
            &db,
            &format!(
                "SELECT {} FROM executions WHERE event_id = ?1 ORDER BY round_id ASC, rowid ASC",
                EXECUTION_COLUMNS
            ),
            params![event_id],
            execution_from_row,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::core::orchestrator::{CommandStatus, ExecutionStatus, TaskStatus};
    use crate::core::store::test_store;

    #[tokio::test]
    async fn terminal_command_status_is_sticky() {
        let store = test_store();
        let cmd = store
            .add_command("t1", "e1", 1, "block ip", "firewall", CommandStatus::Processing)
            .await
            .unwrap();
        assert!(store.set_command_status(&cmd.command_id, CommandStatus::Completed).await.unwrap());
        assert!(!store.set_command_status(&cmd.command_id, CommandStatus::Failed).await.unwrap());
        let got = store.get_command(&cmd.command_id).await.unwrap().unwrap();
        assert_eq!(got.command_status, CommandStatus::Completed);
    }

    #[tokio::test]
    async fn terminal_task_status_is_sticky() {
        let store = test_store();
        let task = store.add_task("e1", 1, "contain host").await.unwrap();
        assert!(store.set_task_status(&task.task_id, TaskStatus::Failed).await.unwrap());
        assert!(!store.set_task_status(&task.task_id, TaskStatus::Completed).await.unwrap());
    }

    #[tokio::test]
    async fn finish_summary_requires_completed_execution() {
        let store = test_store();
        let exec = store
            .add_execution("c1", None, None, "e1", 1, ExecutionStatus::Processing)
            .await
            .unwrap();
        assert!(!store.finish_execution_summary(&exec.execution_id, "digest").await.unwrap());

        store
            .record_execution_result(&exec.execution_id, Some("{\"hits\":3}"), ExecutionStatus::Completed)
            .await
            .unwrap();
        assert!(store.finish_execution_summary(&exec.execution_id, "digest").await.unwrap());

        let got = store.get_execution(&exec.execution_id).await.unwrap().unwrap();
        assert_eq!(got.execution_status, ExecutionStatus::Summarized);
        assert_eq!(got.ai_summary.as_deref(), Some("digest"));
        assert_eq!(got.execution_result.as_deref(), Some("{\"hits\":3}"));
    }

    #[tokio::test]
    async fn round_queries_filter_by_round() {
        let store = test_store();
        store.add_task("e1", 1, "r1").await.unwrap();
        store.add_task("e1", 2, "r2").await.unwrap();
        store.add_task("e2", 1, "other").await.unwrap();
        let r1 = store.list_tasks_for_round("e1", 1).await.unwrap();
        assert_eq!(r1.len(), 1);
        assert_eq!(r1[0].task_name, "r1");
        assert_eq!(store.list_tasks_for_event("e1").await.unwrap().len(), 2);
    }
}
