//! In-process document backend.
//!
//! Keeps every chatroom in a map behind a tokio lock. Commit and fan-out
//! happen under the same lock, so every subscriber observes snapshots in
//! commit order. Faults can be injected to exercise the unavailable path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use murmur_shared::ChatroomId;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::backend::{system_clock, DocumentBackend, ServerClock};
use crate::error::{Result, StoreError};
use crate::hub::{SnapshotFeed, SnapshotHub};
use crate::models::{AppendOutcome, ChatroomDocument, ChatroomSummary, RawMessage, RawTimestamp};

struct Room {
    name: String,
    created_at: DateTime<Utc>,
    messages: Vec<RawMessage>,
    hub: SnapshotHub<ChatroomDocument>,
}

impl Room {
    fn document(&self, id: ChatroomId) -> ChatroomDocument {
        ChatroomDocument {
            id,
            name: self.name.clone(),
            created_at: RawTimestamp::from_datetime(self.created_at),
            messages: self.messages.clone(),
        }
    }

    fn summary(&self, id: ChatroomId) -> ChatroomSummary {
        ChatroomSummary {
            id,
            name: self.name.clone(),
            created_at: self.created_at,
            message_count: self.messages.len(),
        }
    }
}

#[derive(Default)]
struct State {
    rooms: HashMap<ChatroomId, Room>,
    directory: SnapshotHub<Vec<ChatroomSummary>>,
}

impl State {
    fn summaries(&self) -> Vec<ChatroomSummary> {
        let mut out: Vec<_> = self.rooms.iter().map(|(id, room)| room.summary(*id)).collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }

    fn publish_directory(&mut self) {
        if self.directory.is_empty() {
            return;
        }
        let summaries = self.summaries();
        self.directory.publish(&summaries);
    }
}

pub struct MemoryBackend {
    state: Mutex<State>,
    clock: ServerClock,
    online: AtomicBool,
    fail_next: AtomicU32,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: ServerClock) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
            online: AtomicBool::new(true),
            fail_next: AtomicU32::new(0),
        }
    }

    /// While offline every operation fails with [`StoreError::Unavailable`].
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        info!(online, "Memory backend availability changed");
    }

    /// Make the next `count` operations fail with [`StoreError::Unavailable`].
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of live subscribers on one chatroom.
    pub async fn subscriber_count(&self, chatroom: ChatroomId) -> usize {
        self.state
            .lock()
            .await
            .rooms
            .get(&chatroom)
            .map(|r| r.hub.subscriber_count())
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<()> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("backend offline".into()));
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected fault".into()));
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBackend for MemoryBackend {
    async fn create(&self, name: &str) -> Result<ChatroomDocument> {
        self.check_available()?;

        let id = ChatroomId::new();
        let room = Room {
            name: name.to_string(),
            created_at: (self.clock)(),
            messages: Vec::new(),
            hub: SnapshotHub::new(),
        };
        let doc = room.document(id);

        let mut state = self.state.lock().await;
        state.rooms.insert(id, room);
        state.publish_directory();

        debug!(chatroom = %id, "Created chatroom in memory");
        Ok(doc)
    }

    async fn append(&self, chatroom: ChatroomId, message: RawMessage) -> Result<AppendOutcome> {
        self.check_available()?;

        let mut state = self.state.lock().await;
        let room = state
            .rooms
            .get_mut(&chatroom)
            .ok_or(StoreError::NotFound(chatroom))?;

        if let Some(id) = message.id {
            if room.messages.iter().any(|m| m.id == Some(id)) {
                return Ok(AppendOutcome::Duplicate);
            }
        }

        let committed = message.committed(RawTimestamp::from_datetime((self.clock)()));
        room.messages.push(committed);

        let doc = room.document(chatroom);
        let delivered = room.hub.publish(&doc);
        debug!(
            chatroom = %chatroom,
            messages = room.messages.len(),
            delivered,
            "Appended message"
        );

        state.publish_directory();
        Ok(AppendOutcome::Appended)
    }

    async fn fetch(&self, chatroom: ChatroomId) -> Result<ChatroomDocument> {
        self.check_available()?;

        let state = self.state.lock().await;
        state
            .rooms
            .get(&chatroom)
            .map(|room| room.document(chatroom))
            .ok_or(StoreError::NotFound(chatroom))
    }

    async fn list(&self) -> Result<Vec<ChatroomSummary>> {
        self.check_available()?;
        Ok(self.state.lock().await.summaries())
    }

    async fn watch(&self, chatroom: ChatroomId) -> Result<SnapshotFeed<ChatroomDocument>> {
        self.check_available()?;

        let mut state = self.state.lock().await;
        let room = state
            .rooms
            .get_mut(&chatroom)
            .ok_or(StoreError::NotFound(chatroom))?;
        let current = room.document(chatroom);
        Ok(room.hub.attach(current))
    }

    async fn watch_directory(&self) -> Result<SnapshotFeed<Vec<ChatroomSummary>>> {
        self.check_available()?;

        let mut state = self.state.lock().await;
        let current = state.summaries();
        Ok(state.directory.attach(current))
    }
}
