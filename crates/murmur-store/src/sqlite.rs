//! SQLite-backed document backend.
//!
//! The connection and the subscriber hubs share one lock, so a commit and the
//! snapshot it produces are published before any later commit. Every call
//! runs on tokio's blocking pool.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use murmur_shared::ChatroomId;
use tracing::{debug, info};

use crate::backend::{system_clock, DocumentBackend, ServerClock};
use crate::chatrooms::ChatroomRow;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::hub::{SnapshotFeed, SnapshotHub};
use crate::models::{AppendOutcome, ChatroomDocument, ChatroomSummary, RawMessage};

struct Inner {
    db: Database,
    rooms: HashMap<ChatroomId, SnapshotHub<ChatroomDocument>>,
    directory: SnapshotHub<Vec<ChatroomSummary>>,
}

impl Inner {
    fn publish_room(&mut self, chatroom: ChatroomId) -> Result<()> {
        let Some(hub) = self.rooms.get_mut(&chatroom) else {
            return Ok(());
        };
        if hub.is_empty() {
            self.rooms.remove(&chatroom);
            return Ok(());
        }
        let doc = self.db.load_document(chatroom)?;
        let delivered = hub.publish(&doc);
        debug!(chatroom = %chatroom, delivered, "Published snapshot");
        Ok(())
    }

    fn publish_directory(&mut self) -> Result<()> {
        if self.directory.is_empty() {
            return Ok(());
        }
        let summaries = self.db.list_chatrooms()?;
        self.directory.publish(&summaries);
        Ok(())
    }
}

#[derive(Clone)]
pub struct SqliteBackend {
    inner: Arc<Mutex<Inner>>,
    clock: ServerClock,
}

impl SqliteBackend {
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, system_clock())
    }

    pub fn with_clock(db: Database, clock: ServerClock) -> Self {
        if let Some(path) = db.path() {
            info!(path = %path.display(), "SQLite document backend ready");
        }
        Self {
            inner: Arc::new(Mutex::new(Inner {
                db,
                rooms: HashMap::new(),
                directory: SnapshotHub::new(),
            })),
            clock,
        }
    }

    /// Open the database in the platform data directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Database::new()?))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Run `f` against the locked state on the blocking pool.
    async fn with_inner<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Inner) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut guard = inner
                .lock()
                .map_err(|e| StoreError::Internal(format!("Lock poisoned: {e}")))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("Blocking task failed: {e}")))?
    }
}

impl DocumentBackend for SqliteBackend {
    async fn create(&self, name: &str) -> Result<ChatroomDocument> {
        let row = ChatroomRow {
            id: ChatroomId::new(),
            name: name.to_string(),
            created_at: (self.clock)(),
        };
        self.with_inner(move |inner| {
            inner.db.insert_chatroom(&row)?;
            inner.publish_directory()?;
            inner.db.load_document(row.id)
        })
        .await
    }

    async fn append(&self, chatroom: ChatroomId, message: RawMessage) -> Result<AppendOutcome> {
        let committed_at = (self.clock)();
        self.with_inner(move |inner| {
            let outcome = inner.db.append_message(chatroom, &message, committed_at)?;
            if outcome == AppendOutcome::Appended {
                inner.publish_room(chatroom)?;
                inner.publish_directory()?;
            }
            Ok(outcome)
        })
        .await
    }

    async fn fetch(&self, chatroom: ChatroomId) -> Result<ChatroomDocument> {
        self.with_inner(move |inner| inner.db.load_document(chatroom)).await
    }

    async fn list(&self) -> Result<Vec<ChatroomSummary>> {
        self.with_inner(|inner| inner.db.list_chatrooms()).await
    }

    async fn watch(&self, chatroom: ChatroomId) -> Result<SnapshotFeed<ChatroomDocument>> {
        self.with_inner(move |inner| {
            let current = inner.db.load_document(chatroom)?;
            Ok(inner.rooms.entry(chatroom).or_default().attach(current))
        })
        .await
    }

    async fn watch_directory(&self) -> Result<SnapshotFeed<Vec<ChatroomSummary>>> {
        self.with_inner(|inner| {
            let current = inner.db.list_chatrooms()?;
            Ok(inner.directory.attach(current))
        })
        .await
    }
}
