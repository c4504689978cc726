mod events;
mod messages;
mod summaries;
pub mod types;
mod work;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::core::lifecycle::LifecycleComponent;

pub use types::{EventRecord, ExecutionRecord, SummaryRecord};

const TABLES: &[&str] = &[
    "events",
    "tasks",
    "actions",
    "commands",
    "executions",
    "summaries",
    "messages",
];

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS events (
        event_id TEXT PRIMARY KEY,
        event_name TEXT NOT NULL,
        message TEXT NOT NULL,
        context TEXT,
        status TEXT NOT NULL,
        current_round INTEGER NOT NULL DEFAULT 1,
        manually_resolved INTEGER NOT NULL DEFAULT 0,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS tasks (
        task_id TEXT PRIMARY KEY,
        event_id TEXT NOT NULL,
        round_id INTEGER NOT NULL,
        task_name TEXT NOT NULL,
        task_status TEXT NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS actions (
        action_id TEXT PRIMARY KEY,
        task_id TEXT NOT NULL,
        event_id TEXT NOT NULL,
        round_id INTEGER NOT NULL,
        action_name TEXT NOT NULL,
        action_status TEXT NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS commands (
        command_id TEXT PRIMARY KEY,
        task_id TEXT NOT NULL,
        event_id TEXT NOT NULL,
        round_id INTEGER NOT NULL,
        command_name TEXT NOT NULL,
        command_type TEXT NOT NULL,
        command_status TEXT NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS executions (
        execution_id TEXT PRIMARY KEY,
        command_id TEXT NOT NULL,
        action_id TEXT,
        task_id TEXT,
        event_id TEXT NOT NULL,
        round_id INTEGER NOT NULL,
        execution_result TEXT,
        ai_summary TEXT,
        execution_status TEXT NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS summaries (
        summary_id TEXT PRIMARY KEY,
        event_id TEXT NOT NULL,
        round_id INTEGER NOT NULL,
        event_summary TEXT NOT NULL,
        event_suggestion TEXT NOT NULL DEFAULT '',
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        message_id TEXT PRIMARY KEY,
        event_id TEXT NOT NULL,
        round_id INTEGER NOT NULL,
        message_from TEXT NOT NULL,
        message_type TEXT NOT NULL,
        content_json TEXT NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE INDEX IF NOT EXISTS idx_events_status ON events(status)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_event_round ON tasks(event_id, round_id)",
    "CREATE INDEX IF NOT EXISTS idx_commands_task ON commands(task_id)",
    "CREATE INDEX IF NOT EXISTS idx_executions_command ON executions(command_id)",
    "CREATE INDEX IF NOT EXISTS idx_executions_event_round ON executions(event_id, round_id)",
    "CREATE INDEX IF NOT EXISTS idx_summaries_event_created ON summaries(event_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_messages_event ON messages(event_id, created_at)",
];

/// Durable home of events and their round work. Every write that moves an
/// event is a conditional update so concurrent workers never double-transition.
#[derive(Clone)]
pub struct EntityStore {
    db: Arc<Mutex<Connection>>,
}

impl EntityStore {
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let db = Connection::open(db_path)
            .with_context(|| format!("opening store at {}", db_path.display()))?;
        Self::with_connection(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(db: Connection) -> Result<Self> {
        db.busy_timeout(std::time::Duration::from_secs(5))?;
        for stmt in SCHEMA {
            db.execute(stmt, [])?;
        }
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }
}

/// In-memory store for tests.
#[cfg(test)]
pub fn test_store() -> EntityStore {
    EntityStore::open_in_memory().expect("open in-memory store")
}

#[async_trait]
impl LifecycleComponent for EntityStore {
    /// Refuses to start against a database missing any orchestrator table.
    async fn on_init(&mut self) -> Result<()> {
        let db = self.db.lock().await;
        let mut missing = Vec::new();
        for table in TABLES {
            let found: bool = db.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
                [*table],
                |row| row.get(0),
            )?;
            if !found {
                missing.push(*table);
            }
        }
        if !missing.is_empty() {
            bail!("entity store is missing table(s): {}", missing.join(", "));
        }
        info!("Entity store ready ({} tables)", TABLES.len());
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        self.db
            .lock()
            .await
            .execute_batch("PRAGMA optimize;")
            .context("optimizing store on shutdown")?;
        info!("Entity store closed");
        Ok(())
    }
}

/// Maps a TEXT status column through one of the `from_status` parsers.
pub(crate) fn status_column<T>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown status '{}'", raw).into(),
        )
    })
}
