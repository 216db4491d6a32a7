//! v001 -- Initial schema creation.
//!
//! Creates the two core tables: `chatrooms` and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Chatrooms
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chatrooms (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    name       TEXT NOT NULL,
    created_at TEXT NOT NULL                  -- RFC-3339, server clock
);

CREATE INDEX IF NOT EXISTS idx_chatrooms_created_at ON chatrooms(created_at);

-- ----------------------------------------------------------------
-- Messages (the embedded list of a chatroom document)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,  -- list position
    id          TEXT UNIQUE,                        -- UUID v4, NULL for legacy entries
    chatroom_id TEXT NOT NULL,                      -- FK -> chatrooms(id)
    author_id   TEXT,
    text        TEXT,
    created_at  TEXT NOT NULL,                      -- RFC-3339, server clock

    FOREIGN KEY (chatroom_id) REFERENCES chatrooms(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_chatroom_seq
    ON messages(chatroom_id, seq);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
