//! Sync channel: a live feed of full chatroom snapshots.
//!
//! The first item is always the state at subscribe time. After that every
//! committed append produces one snapshot, in commit order. Ordering across
//! clients is whatever the backend provides.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use murmur_shared::ChatroomId;
use murmur_store::{ChatroomDocument, ChatroomStore, DocumentBackend, SnapshotFeed, SubscriptionHandle};
use tracing::debug;

use crate::error::Result;

pub struct SyncChannel {
    chatroom: ChatroomId,
    feed: SnapshotFeed<ChatroomDocument>,
    closed: bool,
}

impl SyncChannel {
    /// Subscribe to `chatroom` and hand back the snapshots as a pull-based
    /// channel.
    pub async fn open<B: DocumentBackend>(store: &ChatroomStore<B>, chatroom: ChatroomId) -> Result<Self> {
        let feed = store.watch(chatroom).await?;
        debug!(chatroom = %chatroom, "Sync channel opened");
        Ok(Self {
            chatroom,
            feed,
            closed: false,
        })
    }

    /// Subscribe with a callback run on a spawned task. The mutating caller
    /// is never blocked by the listener.
    pub async fn listen<B, F>(
        store: &ChatroomStore<B>,
        chatroom: ChatroomId,
        on_change: F,
    ) -> Result<SubscriptionHandle>
    where
        B: DocumentBackend,
        F: FnMut(ChatroomDocument) + Send + 'static,
    {
        Ok(store.subscribe(chatroom, on_change).await?)
    }

    pub fn chatroom(&self) -> ChatroomId {
        self.chatroom
    }

    /// Next snapshot, or `None` once the channel is closed or the backend
    /// stopped publishing.
    pub async fn next(&mut self) -> Option<ChatroomDocument> {
        if self.closed {
            return None;
        }
        self.feed.recv().await
    }

    /// Stop receiving. Snapshots already queued are discarded. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.feed.close();
        while self.feed.try_recv().is_ok() {}
        debug!(chatroom = %self.chatroom, "Sync channel closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Turn the channel into a callback subscription.
    pub fn into_subscription<F>(self, on_change: F) -> SubscriptionHandle
    where
        F: FnMut(ChatroomDocument) + Send + 'static,
    {
        let SyncChannel { feed, closed, .. } = self;
        let handle = SubscriptionHandle::spawn(feed, on_change, "sync");
        if closed {
            handle.close();
        }
        handle
    }
}

impl Stream for SyncChannel {
    type Item = ChatroomDocument;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.closed {
            return Poll::Ready(None);
        }
        self.feed.poll_recv(cx)
    }
}
