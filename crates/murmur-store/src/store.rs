//! The chatroom store: the only path through which chatroom state is created,
//! mutated and observed.

use std::sync::Arc;

use murmur_shared::constants::MAX_CHATROOM_NAME_LEN;
use murmur_shared::ChatroomId;
use tracing::{debug, info, warn};

use crate::backend::DocumentBackend;
use crate::error::{Result, StoreError};
use crate::hub::SnapshotFeed;
use crate::models::{AppendOutcome, ChatroomDocument, ChatroomSummary, RawMessage};
use crate::subscription::SubscriptionHandle;

/// Front door to a [`DocumentBackend`]. Cheap to clone; clones share the
/// backend.
pub struct ChatroomStore<B> {
    backend: Arc<B>,
}

impl<B> Clone for ChatroomStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: DocumentBackend> ChatroomStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_shared(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Create an empty chatroom. The name is trimmed and must not be blank.
    pub async fn create(&self, name: &str) -> Result<ChatroomId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidInput("chatroom name is blank".into()));
        }
        if name.chars().count() > MAX_CHATROOM_NAME_LEN {
            return Err(StoreError::InvalidInput(format!(
                "chatroom name longer than {MAX_CHATROOM_NAME_LEN} characters"
            )));
        }

        let doc = self
            .backend
            .create(name)
            .await
            .map_err(|e| {
                warn!(kind = %e.kind(), error = %e, "Failed to create chatroom");
                e
            })?;

        info!(chatroom = %doc.id, name = %doc.name, "Chatroom created");
        Ok(doc.id)
    }

    /// Append one message. The backend stamps it with its own clock.
    pub async fn append(&self, chatroom: ChatroomId, message: RawMessage) -> Result<AppendOutcome> {
        let message_id = message.id;
        let outcome = self
            .backend
            .append(chatroom, message)
            .await
            .map_err(|e| {
                warn!(chatroom = %chatroom, kind = %e.kind(), error = %e, "Append failed");
                e
            })?;

        match outcome {
            AppendOutcome::Appended => {
                debug!(chatroom = %chatroom, message = ?message_id, "Message appended")
            }
            AppendOutcome::Duplicate => {
                debug!(chatroom = %chatroom, message = ?message_id, "Message already present")
            }
        }
        Ok(outcome)
    }

    pub async fn fetch(&self, chatroom: ChatroomId) -> Result<ChatroomDocument> {
        self.backend.fetch(chatroom).await
    }

    pub async fn list(&self) -> Result<Vec<ChatroomSummary>> {
        self.backend.list().await
    }

    /// Raw snapshot feed for one chatroom: current state first, then one
    /// document per committed change.
    pub async fn watch(&self, chatroom: ChatroomId) -> Result<SnapshotFeed<ChatroomDocument>> {
        self.backend.watch(chatroom).await.map_err(|e| {
            warn!(chatroom = %chatroom, kind = %e.kind(), error = %e, "Subscribe failed");
            e
        })
    }

    /// Invoke `on_change` with the full document now and after every change,
    /// until the returned handle is closed or dropped.
    pub async fn subscribe<F>(&self, chatroom: ChatroomId, on_change: F) -> Result<SubscriptionHandle>
    where
        F: FnMut(ChatroomDocument) + Send + 'static,
    {
        let feed = self.watch(chatroom).await?;
        debug!(chatroom = %chatroom, "Subscribed to chatroom");
        Ok(SubscriptionHandle::spawn(feed, on_change, "chatroom"))
    }

    pub async fn watch_directory(&self) -> Result<SnapshotFeed<Vec<ChatroomSummary>>> {
        self.backend
            .watch_directory()
            .await
            .map_err(|e| {
                warn!(kind = %e.kind(), error = %e, "Directory subscribe failed");
                e
            })
    }

    /// Like [`subscribe`](Self::subscribe) for the chatroom listing.
    pub async fn subscribe_directory<F>(&self, on_change: F) -> Result<SubscriptionHandle>
    where
        F: FnMut(Vec<ChatroomSummary>) + Send + 'static,
    {
        let feed = self.watch_directory().await?;
        Ok(SubscriptionHandle::spawn(feed, on_change, "directory"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use murmur_shared::{AuthorId, MessageId};

    use super::*;
    use crate::memory::MemoryBackend;
    use crate::sqlite::SqliteBackend;

    async fn concurrent_appends_are_all_kept<B: DocumentBackend>(store: ChatroomStore<B>) {
        const N: usize = 64;
        let room = store.create("busy").await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..N {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let author = AuthorId::from(format!("user-{}", i % 4));
                let msg = RawMessage::new(MessageId::new(), author, format!("msg {i}"));
                store.append(room, msg).await
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), AppendOutcome::Appended);
        }

        let doc = store.fetch(room).await.unwrap();
        assert_eq!(doc.messages.len(), N);
        let mut texts: Vec<_> = doc.messages.iter().filter_map(|m| m.text.clone()).collect();
        texts.sort();
        texts.dedup();
        assert_eq!(texts.len(), N);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn no_lost_updates_in_memory() {
        concurrent_appends_are_all_kept(ChatroomStore::new(MemoryBackend::new())).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn no_lost_updates_in_sqlite() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        concurrent_appends_are_all_kept(ChatroomStore::new(backend)).await;
    }

    async fn message_ids_are_scoped_to_a_chatroom<B: DocumentBackend>(store: ChatroomStore<B>) {
        let a = store.create("a").await.unwrap();
        let b = store.create("b").await.unwrap();
        let msg = RawMessage::new(MessageId::new(), AuthorId::from("ada"), "hi");

        assert_eq!(store.append(a, msg.clone()).await.unwrap(), AppendOutcome::Appended);
        assert_eq!(store.append(b, msg.clone()).await.unwrap(), AppendOutcome::Appended);
        assert_eq!(store.append(b, msg.clone()).await.unwrap(), AppendOutcome::Duplicate);

        let in_b = store.fetch(b).await.unwrap().messages;
        assert_eq!(in_b.len(), 1);
        assert_eq!(in_b[0].id, msg.id);
        assert_eq!(store.fetch(a).await.unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn same_message_id_in_two_chatrooms_in_memory() {
        message_ids_are_scoped_to_a_chatroom(ChatroomStore::new(MemoryBackend::new())).await;
    }

    #[tokio::test]
    async fn same_message_id_in_two_chatrooms_in_sqlite() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        message_ids_are_scoped_to_a_chatroom(ChatroomStore::new(backend)).await;
    }

    #[tokio::test]
    async fn create_trims_and_rejects_blank_names() {
        let store = ChatroomStore::new(MemoryBackend::new());
        assert!(matches!(store.create("   ").await, Err(StoreError::InvalidInput(_))));
        assert!(matches!(
            store.create(&"x".repeat(MAX_CHATROOM_NAME_LEN + 1)).await,
            Err(StoreError::InvalidInput(_))
        ));

        let id = store.create("  Team A  ").await.unwrap();
        assert_eq!(store.fetch(id).await.unwrap().name, "Team A");
    }

    #[tokio::test]
    async fn create_surfaces_unavailable() {
        let store = ChatroomStore::new(MemoryBackend::new());
        store.backend().set_online(false);
        let err = store.create("Team A").await.unwrap_err();
        assert_eq!(err.kind(), murmur_shared::ErrorKind::StoreUnavailable);
    }

    #[tokio::test]
    async fn append_to_unknown_chatroom_leaves_no_state() {
        let store = ChatroomStore::new(MemoryBackend::new());
        let real = store.create("real").await.unwrap();
        let ghost = ChatroomId::new();

        let msg = RawMessage::new(MessageId::new(), AuthorId::from("a@x.com"), "hi");
        let err = store.append(ghost, msg).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == ghost));

        assert!(store.fetch(real).await.unwrap().messages.is_empty());
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(matches!(store.fetch(ghost).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn subscribe_fires_immediately_then_on_change() {
        let store = ChatroomStore::new(MemoryBackend::new());
        let room = store.create("Team A").await.unwrap();

        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        let handle = store
            .subscribe(room, move |doc| sink.lock().unwrap().push(doc.messages.len()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*seen.lock().unwrap(), vec![0]);

        let msg = RawMessage::new(MessageId::new(), AuthorId::from("a@x.com"), "hi");
        store.append(room, msg).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);

        handle.close();
        let msg = RawMessage::new(MessageId::new(), AuthorId::from("a@x.com"), "after");
        store.append(room, msg).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn directory_subscription_tracks_creates() {
        let store = ChatroomStore::new(MemoryBackend::new());
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        let _handle = store
            .subscribe_directory(move |rooms| sink.lock().unwrap().push(rooms.len()))
            .await
            .unwrap();

        store.create("one").await.unwrap();
        store.create("two").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }
}
