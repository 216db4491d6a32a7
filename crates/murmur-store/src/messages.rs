use chrono::{DateTime, Utc};
use murmur_shared::{AuthorId, ChatroomId, MessageId};
use rusqlite::params;

use crate::chatrooms::{chatroom_exists, row_count, sql_timestamp};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{AppendOutcome, RawMessage, RawTimestamp};

impl Database {
    /// Append one message to a chatroom's list, stamped with `committed_at`.
    ///
    /// The chatroom check and the insert run in one transaction, so a missing
    /// chatroom leaves nothing behind. An id that already exists is ignored.
    pub fn append_message(
        &mut self,
        chatroom_id: ChatroomId,
        message: &RawMessage,
        committed_at: DateTime<Utc>,
    ) -> Result<AppendOutcome> {
        let tx = self.conn_mut().transaction()?;

        if !chatroom_exists(&tx, chatroom_id)? {
            return Err(StoreError::NotFound(chatroom_id));
        }

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO messages (id, chatroom_id, author_id, author_name, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id.map(|id| id.to_string()),
                chatroom_id.to_string(),
                message.author_id.as_ref().map(|a| a.as_str()),
                message.author_name,
                message.text,
                sql_timestamp(committed_at),
            ],
        )?;
        tx.commit()?;

        Ok(if inserted == 0 {
            AppendOutcome::Duplicate
        } else {
            AppendOutcome::Appended
        })
    }

    /// All messages of a chatroom in list (append) order.
    pub fn get_messages_for_chatroom(&self, chatroom_id: ChatroomId) -> Result<Vec<RawMessage>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, author_id, author_name, text, created_at
             FROM messages
             WHERE chatroom_id = ?1
             ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![chatroom_id.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn count_messages(&self, chatroom_id: ChatroomId) -> Result<usize> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE chatroom_id = ?1",
            params![chatroom_id.to_string()],
            |row| row_count(row, 0),
        )?)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawMessage> {
    let id_str: Option<String> = row.get(0)?;
    let author_id: Option<String> = row.get(1)?;
    let author_name: Option<String> = row.get(2)?;
    let text: Option<String> = row.get(3)?;
    let ts_str: String = row.get(4)?;

    let id = id_str
        .map(|s| s.parse::<MessageId>())
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

    // Timestamps stay raw; normalizing them is the projector's job.
    Ok(RawMessage {
        id,
        text,
        author_id: author_id.map(AuthorId::from),
        author_name,
        created_at: Some(RawTimestamp::Rfc3339(ts_str)),
    })
}
