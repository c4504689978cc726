use anyhow::Result;
use rusqlite::params;

use super::EntityStore;
use super::types::MessageRecord;

impl EntityStore {
    pub async fn add_message(
        &self,
        event_id: &str,
        round_id: u32,
        message_from: &str,
        message_type: &str,
        content_json: &str,
    ) -> Result<MessageRecord> {
        let message_id = uuid::Uuid::new_v4().to_string();
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO messages (message_id, event_id, round_id, message_from, message_type, content_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message_id,
                event_id,
                round_id,
                message_from,
                message_type,
                content_json
            ],
        )?;
        let rec = db.query_row(
            "SELECT message_id, event_id, round_id, message_from, message_type, content_json, created_at
             FROM messages WHERE message_id = ?1",
            params![message_id],
            |row| {
                Ok(MessageRecord {
                    message_id: row.get(0)?,
                    event_id: row.get(1)?,
                    round_id: row.get(2)?,
                    message_from: row.get(3)?,
                    message_type: row.get(4)?,
                    content_json: row.get(5)?,
                    created_at: row.get(6)?,
                })
            },
        )?;
        Ok(rec)
    }

    pub async fn list_messages(&self, event_id: &str) -> Result<Vec<MessageRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT message_id, event_id, round_id, message_from, message_type, content_json, created_at
             FROM messages WHERE event_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![event_id], |row| {
            Ok(MessageRecord {
                message_id: row.get(0)?,
                event_id: row.get(1)?,
                round_id: row.get(2)?,
                message_from: row.get(3)?,
                message_type: row.get(4)?,
                content_json: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
