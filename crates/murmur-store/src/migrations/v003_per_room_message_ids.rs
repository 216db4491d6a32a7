//! v003 -- Scope message id uniqueness to a chatroom.
//!
//! SQLite cannot drop a column constraint, so `messages` is rebuilt with a
//! composite `UNIQUE (chatroom_id, id)` in place of `id TEXT UNIQUE`. List
//! order (`seq`) is carried over unchanged.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE messages_v003 (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    id          TEXT,                               -- UUID v4, NULL for legacy entries
    chatroom_id TEXT NOT NULL,
    author_id   TEXT,
    text        TEXT,
    created_at  TEXT NOT NULL,
    author_name TEXT,

    FOREIGN KEY (chatroom_id) REFERENCES chatrooms(id) ON DELETE CASCADE,
    UNIQUE (chatroom_id, id)
);

INSERT INTO messages_v003 (seq, id, chatroom_id, author_id, text, created_at, author_name)
    SELECT seq, id, chatroom_id, author_id, text, created_at, author_name FROM messages;

DROP TABLE messages;
ALTER TABLE messages_v003 RENAME TO messages;

CREATE INDEX IF NOT EXISTS idx_messages_chatroom_seq
    ON messages(chatroom_id, seq);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(&format!("BEGIN;\n{UP_SQL}\nCOMMIT;"))
}
