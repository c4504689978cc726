use anyhow::Result;
use rusqlite::{OptionalExtension, params};

use super::EntityStore;
use super::types::SummaryRecord;
use crate::core::orchestrator::EventStatus;

const SUMMARY_COLUMNS: &str =
    "summary_id, event_id, round_id, event_summary, event_suggestion, created_at, updated_at";

fn summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SummaryRecord> {
    Ok(SummaryRecord {
        summary_id: row.get(0)?,
        event_id: row.get(1)?,
        round_id: row.get(2)?,
        event_summary: row.get(3)?,
        event_suggestion: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl EntityStore {
    /// Inserts the round report and flips the event `to_be_summarized` →
    /// `summarized` in one transaction. Returns `None` (and inserts nothing)
    /// when the event has already left `to_be_summarized`.
    pub async fn commit_round_summary(
        &self,
        event_id: &str,
        round_id: u32,
        summary: &str,
        suggestion: &str,
    ) -> Result<Option<SummaryRecord>> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;

        let moved = tx.execute(
            "UPDATE events SET status = ?1, updated_at = CURRENT_TIMESTAMP
             WHERE event_id = ?2 AND status = ?3",
            params![
                EventStatus::Summarized.as_str(),
                event_id,
                EventStatus::ToBeSummarized.as_str()
            ],
        )?;
        if moved == 0 {
            // Dropping the transaction rolls it back.
            return Ok(None);
        }

        let summary_id = uuid::Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO summaries (summary_id, event_id, round_id, event_summary, event_suggestion)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![summary_id, event_id, round_id, summary, suggestion],
        )?;
        let rec = tx.query_row(
            &format!(
                "SELECT {} FROM summaries WHERE summary_id = ?1",
                SUMMARY_COLUMNS
            ),
            params![summary_id],
            summary_from_row,
        )?;
        tx.commit()?;
        Ok(Some(rec))
    }

    /// Most recent report for the event, if any round has been summarized.
    pub async fn latest_summary(&self, event_id: &str) -> Result<Option<SummaryRecord>> {
        let db = self.db.lock().await;
        let rec = db
            .query_row(
                &format!(
                    "SELECT {} FROM summaries WHERE event_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    SUMMARY_COLUMNS
                ),
                params![event_id],
                summary_from_row,
            )
            .optional()?;
        Ok(rec)
    }

    pub async fn list_summaries(&self, event_id: &str) -> Result<Vec<SummaryRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM summaries WHERE event_id = ?1 ORDER BY created_at ASC, rowid ASC",
            SUMMARY_COLUMNS
        ))?;
        let rows = stmt.query_map(params![event_id], summary_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
