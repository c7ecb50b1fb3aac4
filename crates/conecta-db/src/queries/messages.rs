use anyhow::Result;
use conecta_types::models::ConnectionStatus;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::connections::query_pair;
use crate::models::MessageRow;
use crate::{Database, OptionalExt, now_ts};

const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, content, created_at, read_at";

/// Position of the oldest message already seen. Pages are ordered by
/// `(created_at, id)` descending; without `id` every message in the
/// `created_at` microsecond is skipped.
#[derive(Debug, Clone)]
pub struct MessageCursor {
    pub created_at: String,
    pub id: Option<String>,
}

impl Database {
    // -- Messages --

    /// Stores a direct message. Returns `None` unless the two users have an
    /// accepted connection.
    pub fn send_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: &str,
    ) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let connected = query_pair(conn, sender_id, recipient_id)?
                .is_some_and(|c| c.status == ConnectionStatus::Accepted);
            if !connected {
                return Ok(None);
            }

            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO messages (id, sender_id, recipient_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, sender_id, recipient_id, content, now_ts()],
            )?;
            query_message(conn, &id)
        })
    }

    /// Conversation between two users, newest first, strictly after
    /// `before` in that order. Marks everything `reader_id` received from
    /// `other_id` as read.
    pub fn get_conversation(
        &self,
        reader_id: &str,
        other_id: &str,
        limit: u32,
        before: Option<&MessageCursor>,
    ) -> Result<Vec<MessageRow>> {
        let before_at = before.map(|c| c.created_at.as_str());
        let before_id = before.and_then(|c| c.id.as_deref());

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages
                 WHERE ((sender_id = ?1 AND recipient_id = ?2)
                     OR (sender_id = ?2 AND recipient_id = ?1))
                   AND (?3 IS NULL OR created_at < ?3 OR (created_at = ?3 AND id < ?4))
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?5",
                MESSAGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![reader_id, other_id, before_at, before_id, limit],
                    map_message,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            conn.execute(
                "UPDATE messages SET read_at = ?3
                 WHERE recipient_id = ?1 AND sender_id = ?2 AND read_at IS NULL",
                rusqlite::params![reader_id, other_id, now_ts()],
            )?;

            Ok(rows)
        })
    }

    pub fn unread_count(&self, user_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND read_at IS NULL",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
    conn.query_row(&sql, [id], map_message).optional()
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        read_at: row.get(5)?,
    })
}
