//! Per-chatroom view state.
//!
//! `Loading` until the first snapshot, `Ready` for every snapshot after that,
//! `Error` when the chatroom cannot be opened or its feed ends, `Closed` once
//! the view is closed. `Closed` is final. State is published on a watch
//! channel for renderers.

use std::sync::Arc;

use murmur_shared::{ChatroomId, ErrorKind};
use murmur_store::{ChatroomDocument, ChatroomStore, DocumentBackend, SnapshotFeed};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::projector::{project_detailed, Message};

/// Projected state of one chatroom at one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub chatroom: ChatroomId,
    pub name: String,
    pub messages: Vec<Message>,
    /// Raw entries that could not be projected.
    pub skipped: usize,
}

impl Transcript {
    fn from_document(doc: &ChatroomDocument) -> Self {
        let projection = project_detailed(doc);
        for e in &projection.skipped {
            warn!(chatroom = %doc.id, kind = %e.kind(), error = %e, "Skipped malformed message");
        }
        Self {
            chatroom: doc.id,
            name: doc.name.clone(),
            messages: projection.messages,
            skipped: projection.skipped.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    Ready(Transcript),
    Error {
        kind: ErrorKind,
        message: String,
        /// Transcript of the last snapshot received before the failure.
        last_good: Option<Transcript>,
    },
    Closed,
}

impl ViewState {
    pub fn status(&self) -> &'static str {
        match self {
            ViewState::Loading => "loading",
            ViewState::Ready(_) => "ready",
            ViewState::Error { .. } => "error",
            ViewState::Closed => "closed",
        }
    }

    /// Transcript to render: the current one, or the last good one after an
    /// error.
    pub fn transcript(&self) -> Option<&Transcript> {
        match self {
            ViewState::Ready(t) => Some(t),
            ViewState::Error { last_good, .. } => last_good.as_ref(),
            ViewState::Loading | ViewState::Closed => None,
        }
    }
}

/// Publish `next` unless the view was closed meanwhile.
fn publish(state: &watch::Sender<ViewState>, next: ViewState) -> bool {
    state.send_if_modified(move |current| {
        if *current == ViewState::Closed {
            return false;
        }
        *current = next;
        true
    })
}

/// Drain `feed` into `state` until the feed ends or the view closes.
async fn follow(chatroom: ChatroomId, mut feed: SnapshotFeed<ChatroomDocument>, state: &watch::Sender<ViewState>) {
    let mut last_good = None;
    while let Some(doc) = feed.recv().await {
        let transcript = Transcript::from_document(&doc);
        debug!(chatroom = %chatroom, messages = transcript.messages.len(), "Transcript updated");
        last_good = Some(transcript.clone());
        if !publish(state, ViewState::Ready(transcript)) {
            return;
        }
    }

    warn!(chatroom = %chatroom, kind = %ErrorKind::StoreUnavailable, "Snapshot feed ended");
    publish(
        state,
        ViewState::Error {
            kind: ErrorKind::StoreUnavailable,
            message: "snapshot feed ended".into(),
            last_good,
        },
    );
}

/// A live view of one chatroom.
pub struct ChatroomView {
    chatroom: ChatroomId,
    state: Arc<watch::Sender<ViewState>>,
    task: JoinHandle<()>,
}

impl ChatroomView {
    /// Start loading `chatroom`. Failures are reported through the state,
    /// never returned.
    pub fn open<B: DocumentBackend>(store: &ChatroomStore<B>, chatroom: ChatroomId) -> Self {
        let (tx, _) = watch::channel(ViewState::Loading);
        let state = Arc::new(tx);

        let store = store.clone();
        let worker = Arc::clone(&state);
        let task = tokio::spawn(async move {
            match store.watch(chatroom).await {
                Ok(feed) => follow(chatroom, feed, &worker).await,
                Err(e) => {
                    publish(
                        &worker,
                        ViewState::Error {
                            kind: e.kind(),
                            message: e.to_string(),
                            last_good: None,
                        },
                    );
                }
            }
        });

        info!(chatroom = %chatroom, "Chatroom view opened");
        Self {
            chatroom,
            state,
            task,
        }
    }

    pub fn chatroom(&self) -> ChatroomId {
        self.chatroom
    }

    pub fn state(&self) -> ViewState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        *self.state.borrow() == ViewState::Closed
    }

    /// Move to `Closed` and stop following the chatroom. Idempotent.
    pub fn close(&self) {
        if self.is_closed() {
            return;
        }
        self.state.send_replace(ViewState::Closed);
        self.task.abort();
        info!(chatroom = %self.chatroom, "Chatroom view closed");
    }
}

impl Drop for ChatroomView {
    fn drop(&mut self) {
        self.close();
    }
}
