//! The document backend seam.
//!
//! A backend stores chatroom documents, appends messages to their embedded
//! list without a client-side read-modify-write, and pushes full snapshots to
//! subscribers. [`crate::ChatroomStore`] is written against this trait only.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use murmur_shared::ChatroomId;

use crate::error::Result;
use crate::hub::SnapshotFeed;
use crate::memory::MemoryBackend;
use crate::models::{AppendOutcome, ChatroomDocument, ChatroomSummary, RawMessage};
use crate::sqlite::SqliteBackend;

/// Source of commit timestamps. Backends stamp every appended message with
/// this clock, ignoring whatever the client sent.
pub type ServerClock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> ServerClock {
    Arc::new(Utc::now)
}

pub trait DocumentBackend: Send + Sync + 'static {
    /// Create an empty chatroom and return its initial document.
    fn create(&self, name: &str) -> impl Future<Output = Result<ChatroomDocument>> + Send;

    /// Append one message as a single atomic list operation. The stored copy
    /// carries the backend's commit timestamp. Appending an id that is
    /// already present is a no-op reported as [`AppendOutcome::Duplicate`].
    fn append(
        &self,
        chatroom: ChatroomId,
        message: RawMessage,
    ) -> impl Future<Output = Result<AppendOutcome>> + Send;

    fn fetch(&self, chatroom: ChatroomId) -> impl Future<Output = Result<ChatroomDocument>> + Send;

    fn list(&self) -> impl Future<Output = Result<Vec<ChatroomSummary>>> + Send;

    /// Subscribe to one chatroom. The feed yields the current document first,
    /// then one snapshot per committed change.
    fn watch(
        &self,
        chatroom: ChatroomId,
    ) -> impl Future<Output = Result<SnapshotFeed<ChatroomDocument>>> + Send;

    /// Subscribe to the chatroom listing. Same delivery rules as [`watch`].
    ///
    /// [`watch`]: DocumentBackend::watch
    fn watch_directory(
        &self,
    ) -> impl Future<Output = Result<SnapshotFeed<Vec<ChatroomSummary>>>> + Send;
}

/// Backend chosen at runtime from configuration.
pub enum AnyBackend {
    Memory(MemoryBackend),
    Sqlite(SqliteBackend),
}

impl AnyBackend {
    pub fn name(&self) -> &'static str {
        match self {
            AnyBackend::Memory(_) => "memory",
            AnyBackend::Sqlite(_) => "sqlite",
        }
    }
}

impl DocumentBackend for AnyBackend {
    async fn create(&self, name: &str) -> Result<ChatroomDocument> {
        match self {
            AnyBackend::Memory(b) => b.create(name).await,
            AnyBackend::Sqlite(b) => b.create(name).await,
        }
    }

    async fn append(&self, chatroom: ChatroomId, message: RawMessage) -> Result<AppendOutcome> {
        match self {
            AnyBackend::Memory(b) => b.append(chatroom, message).await,
            AnyBackend::Sqlite(b) => b.append(chatroom, message).await,
        }
    }

    async fn fetch(&self, chatroom: ChatroomId) -> Result<ChatroomDocument> {
        match self {
            AnyBackend::Memory(b) => b.fetch(chatroom).await,
            AnyBackend::Sqlite(b) => b.fetch(chatroom).await,
        }
    }

    async fn list(&self) -> Result<Vec<ChatroomSummary>> {
        match self {
            AnyBackend::Memory(b) => b.list().await,
            AnyBackend::Sqlite(b) => b.list().await,
        }
    }

    async fn watch(&self, chatroom: ChatroomId) -> Result<SnapshotFeed<ChatroomDocument>> {
        match self {
            AnyBackend::Memory(b) => b.watch(chatroom).await,
            AnyBackend::Sqlite(b) => b.watch(chatroom).await,
        }
    }

    async fn watch_directory(&self) -> Result<SnapshotFeed<Vec<ChatroomSummary>>> {
        match self {
            AnyBackend::Memory(b) => b.watch_directory().await,
            AnyBackend::Sqlite(b) => b.watch_directory().await,
        }
    }
}
