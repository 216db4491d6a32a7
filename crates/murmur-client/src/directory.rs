//! Live list of chatrooms.

use murmur_shared::ChatroomId;
use murmur_store::{ChatroomStore, ChatroomSummary, DocumentBackend, SubscriptionHandle};
use tokio::sync::watch;
use tracing::debug;

use crate::error::Result;

/// Chatroom summaries sorted oldest first, kept current by a directory
/// subscription.
pub struct ChatroomDirectory<B> {
    store: ChatroomStore<B>,
    rooms: watch::Receiver<Vec<ChatroomSummary>>,
    subscription: SubscriptionHandle,
}

impl<B: DocumentBackend> ChatroomDirectory<B> {
    pub async fn open(store: ChatroomStore<B>) -> Result<Self> {
        let (tx, rooms) = watch::channel(Vec::new());
        let subscription = store
            .subscribe_directory(move |mut summaries: Vec<ChatroomSummary>| {
                summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
                debug!(chatrooms = summaries.len(), "Directory updated");
                tx.send_replace(summaries);
            })
            .await?;

        Ok(Self {
            store,
            rooms,
            subscription,
        })
    }

    /// Latest known listing. Empty until the first snapshot arrives.
    pub fn rooms(&self) -> Vec<ChatroomSummary> {
        self.rooms.borrow().clone()
    }

    /// Receiver notified on every listing change.
    pub fn updates(&self) -> watch::Receiver<Vec<ChatroomSummary>> {
        self.rooms.clone()
    }

    /// Create a chatroom. It appears in the listing with the next snapshot.
    pub async fn create_chatroom(&self, name: &str) -> Result<ChatroomId> {
        Ok(self.store.create(name).await?)
    }

    pub fn close(&self) {
        self.subscription.close();
    }
}
