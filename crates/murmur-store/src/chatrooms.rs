//! CRUD operations for chatroom rows.

use chrono::{DateTime, SecondsFormat, Utc};
use murmur_shared::ChatroomId;
use rusqlite::{params, Connection, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{ChatroomDocument, ChatroomSummary, RawTimestamp};

/// A chatroom row without its messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatroomRow {
    pub id: ChatroomId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new chatroom.
    pub fn insert_chatroom(&self, row: &ChatroomRow) -> Result<()> {
        self.conn().execute(
            "INSERT INTO chatrooms (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![row.id.to_string(), row.name, sql_timestamp(row.created_at)],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single chatroom row by id.
    pub fn get_chatroom(&self, id: ChatroomId) -> Result<ChatroomRow> {
        self.conn()
            .query_row(
                "SELECT id, name, created_at FROM chatrooms WHERE id = ?1",
                params![id.to_string()],
                row_to_chatroom,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(id),
                other => StoreError::Sqlite(other),
            })
    }

    /// Materialize the full document: chatroom row plus its message list in
    /// list order.
    pub fn load_document(&self, id: ChatroomId) -> Result<ChatroomDocument> {
        let row = self.get_chatroom(id)?;
        let messages = self.get_messages_for_chatroom(id)?;
        Ok(ChatroomDocument {
            id: row.id,
            name: row.name,
            created_at: RawTimestamp::Rfc3339(sql_timestamp(row.created_at)),
            messages,
        })
    }

    /// List all chatrooms, oldest first, with their message counts.
    pub fn list_chatrooms(&self) -> Result<Vec<ChatroomSummary>> {
        let mut stmt = self.conn().prepare(
            "SELECT c.id, c.name, c.created_at, COUNT(m.seq)
             FROM chatrooms c
             LEFT JOIN messages m ON m.chatroom_id = c.id
             GROUP BY c.id
             ORDER BY c.created_at ASC, c.id ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            let chatroom = row_to_chatroom(row)?;
            Ok(ChatroomSummary {
                id: chatroom.id,
                name: chatroom.name,
                created_at: chatroom.created_at,
                message_count: row_count(row, 3)?,
            })
        })?;

        let mut chatrooms = Vec::new();
        for row in rows {
            chatrooms.push(row?);
        }
        Ok(chatrooms)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Whether a chatroom row exists. Takes a bare connection so it can run
/// inside a transaction.
pub(crate) fn chatroom_exists(conn: &Connection, id: ChatroomId) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM chatrooms WHERE id = ?1",
            params![id.to_string()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Read a `COUNT(*)` column as `usize`.
pub(crate) fn row_count(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<usize> {
    let count: i64 = row.get(idx)?;
    usize::try_from(count).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
    })
}

/// Fixed-width RFC 3339 so that text order matches time order.
pub(crate) fn sql_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Map a `rusqlite::Row` to a [`ChatroomRow`].
fn row_to_chatroom(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatroomRow> {
    let id_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let created_str: String = row.get(2)?;

    let id = id_str.parse::<ChatroomId>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ChatroomRow {
        id,
        name,
        created_at,
    })
}
