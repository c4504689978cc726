use anyhow::{Result, bail};
use rusqlite::{OptionalExtension, params};

use super::types::EventRecord;
use super::{EntityStore, status_column};
use crate::core::orchestrator::{EventStatus, can_transition};

const EVENT_COLUMNS: &str = "event_id, event_name, message, context, status, current_round, \
     manually_resolved, created_at, updated_at";

fn event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRecord> {
    Ok(EventRecord {
        event_id: row.get(0)?,
        event_name: row.get(1)?,
        message: row.get(2)?,
        context: row.get(3)?,
        status: status_column(row, 4, EventStatus::from_status)?,
        current_round: row.get(5)?,
        manually_resolved: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl EntityStore {
    /// Intake: a new incident starts `pending` in round 1, waiting for the planner.
    pub async fn create_event(
        &self,
        event_name: &str,
        message: &str,
        context: Option<&str>,
    ) -> Result<EventRecord> {
        let event_id = uuid::Uuid::new_v4().to_string();
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO events (event_id, event_name, message, context, status, current_round)
             VALUES (?1, ?2, ?3, ?4, ?5, 1)",
            params![
                event_id,
                event_name,
                message,
                context,
                EventStatus::Pending.as_str()
            ],
        )?;
        let rec = db.query_row(
            &format!("SELECT {} FROM events WHERE event_id = ?1", EVENT_COLUMNS),
            params![event_id],
            event_from_row,
        )?;
        Ok(rec)
    }

    pub async fn get_event(&self, event_id: &str) -> Result<Option<EventRecord>> {
        let db = self.db.lock().await;
        let rec = db
            .query_row(
                &format!("SELECT {} FROM events WHERE event_id = ?1", EVENT_COLUMNS),
                params![event_id],
                event_from_row,
            )
            .optional()?;
        Ok(rec)
    }

    pub async fn list_events_by_status(&self, status: EventStatus) -> Result<Vec<EventRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM events WHERE status = ?1 ORDER BY created_at ASC, rowid ASC",
            EVENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![status.as_str()], event_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// `UPDATE ... WHERE status = expected`. Returns false when another
    /// worker moved the event first (or it no longer exists).
    pub async fn transition_event(
        &self,
        event_id: &str,
        expected: EventStatus,
        next: EventStatus,
    ) -> Result<bool> {
        if !can_transition(expected, next) {
            bail!(
                "illegal event transition {} -> {} for {}",
                expected.as_str(),
                next.as_str(),
                event_id
            );
        }
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE events SET status = ?1, updated_at = CURRENT_TIMESTAMP
             WHERE event_id = ?2 AND status = ?3",
            params![next.as_str(), event_id, expected.as_str()],
        )?;
        Ok(rows > 0)
    }

    /// `round_finished` → `pending` with the round counter bumped, only while
    /// the counter is still below `max_round`.
    pub async fn advance_event_round(&self, event_id: &str, max_round: u32) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE events
             SET status = ?1, current_round = current_round + 1, updated_at = CURRENT_TIMESTAMP
             WHERE event_id = ?2 AND status = ?3 AND current_round < ?4",
            params![
                EventStatus::Pending.as_str(),
                event_id,
                EventStatus::RoundFinished.as_str(),
                max_round
            ],
        )?;
        Ok(rows > 0)
    }

    /// Moves the event to `resolved` and flags it as manually resolved,
    /// guarded on the status the caller observed. `context`, when given,
    /// replaces the context blob.
    pub async fn mark_resolved(
        &self,
        event_id: &str,
        expected: EventStatus,
        context: Option<&str>,
    ) -> Result<bool> {
        if !can_transition(expected, EventStatus::Resolved) {
            bail!(
                "event {} cannot be resolved from {}",
                event_id,
                expected.as_str()
            );
        }
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE events
             SET status = ?1, manually_resolved = 1, context = COALESCE(?2, context), updated_at = CURRENT_TIMESTAMP
             WHERE event_id = ?3 AND status = ?4",
            params![
                EventStatus::Resolved.as_str(),
                context,
                event_id,
                expected.as_str()
            ],
        )?;
        Ok(rows > 0)
    }

    /// Number of events per status, for diagnostics.
    pub async fn status_counts(&self) -> Result<Vec<(String, i64)>> {
        let db = self.db.lock().await;
        let mut stmt =
            db.prepare("SELECT status, COUNT(*) FROM events GROUP BY status ORDER BY status ASC")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
