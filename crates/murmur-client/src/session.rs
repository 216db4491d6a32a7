//! Session state shared by a renderer.
//!
//! A [`ChatSession`] owns the store handle, the identity provider and the
//! currently open chatroom view, and routes renderer intents to them.

use std::sync::Arc;

use murmur_shared::{ChatroomId, IdentityProvider, MessageId};
use murmur_store::{ChatroomStore, DocumentBackend};
use tracing::{debug, info};

use crate::error::{ClientError, Result};
use crate::events::{Intent, IntentOutcome};
use crate::retry::RetryPolicy;
use crate::submitter::MessageSubmitter;
use crate::view::ChatroomView;

pub struct ChatSession<B> {
    store: ChatroomStore<B>,
    identity: Arc<dyn IdentityProvider>,
    submitter: MessageSubmitter<B>,
    /// At most one chatroom is open at a time.
    view: Option<ChatroomView>,
}

impl<B: DocumentBackend> ChatSession<B> {
    pub fn new(store: ChatroomStore<B>, identity: Arc<dyn IdentityProvider>, retry: RetryPolicy) -> Self {
        let submitter = MessageSubmitter::with_retry(store.clone(), retry);
        Self {
            store,
            identity,
            submitter,
            view: None,
        }
    }

    pub fn store(&self) -> &ChatroomStore<B> {
        &self.store
    }

    pub fn view(&self) -> Option<&ChatroomView> {
        self.view.as_ref()
    }

    pub async fn handle(&mut self, intent: Intent) -> Result<IntentOutcome> {
        debug!(?intent, "Handling intent");
        match intent {
            Intent::OpenChatroom(id) => {
                self.open_chatroom(id);
                Ok(IntentOutcome::Opened(id))
            }
            Intent::Submit(text) => self.submit(&text).await.map(IntentOutcome::Submitted),
            Intent::CreateChatroom(name) => {
                Ok(IntentOutcome::Created(self.store.create(&name).await?))
            }
        }
    }

    /// Close the current view, if any, and open `chatroom`.
    pub fn open_chatroom(&mut self, chatroom: ChatroomId) -> &ChatroomView {
        if let Some(previous) = self.view.take() {
            previous.close();
        }
        self.view.insert(ChatroomView::open(&self.store, chatroom))
    }

    /// Submit `text` to the open chatroom as the current identity.
    pub async fn submit(&self, text: &str) -> Result<MessageId> {
        let chatroom = self
            .view
            .as_ref()
            .map(ChatroomView::chatroom)
            .ok_or_else(|| ClientError::InvalidInput("no chatroom is open".into()))?;
        self.submitter
            .submit_as(self.identity.as_ref(), chatroom, text)
            .await
    }

    pub fn close(&mut self) {
        if let Some(view) = self.view.take() {
            view.close();
            info!(chatroom = %view.chatroom(), "Session closed chatroom");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use murmur_shared::{ErrorKind, SessionIdentity, SessionSlot, StaticIdentity};
    use murmur_store::MemoryBackend;
    use tokio::sync::watch;

    use super::*;
    use crate::view::ViewState;

    fn session(identity: Arc<dyn IdentityProvider>) -> ChatSession<MemoryBackend> {
        ChatSession::new(
            ChatroomStore::new(MemoryBackend::new()),
            identity,
            RetryPolicy::disabled(),
        )
    }

    async fn wait_ready(rx: &mut watch::Receiver<ViewState>, n: usize) -> ViewState {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                {
                    let state = rx.borrow_and_update();
                    if matches!(&*state, ViewState::Ready(t) if t.messages.len() == n) {
                        return state.clone();
                    }
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn create_open_submit_roundtrip() {
        let me = SessionIdentity::generate(Some("Ada".into()));
        let mut session = session(Arc::new(StaticIdentity(me.clone())));

        let IntentOutcome::Created(room) = session
            .handle(Intent::CreateChatroom("Team A".into()))
            .await
            .unwrap()
        else {
            panic!("expected Created");
        };
        session.handle(Intent::OpenChatroom(room)).await.unwrap();
        let mut rx = session.view().unwrap().watch();
        wait_ready(&mut rx, 0).await;

        let outcome = session.handle(Intent::Submit("hello".into())).await.unwrap();
        let state = wait_ready(&mut rx, 1).await;
        let message = &state.transcript().unwrap().messages[0];
        assert_eq!(outcome, IntentOutcome::Submitted(message.id.unwrap()));
        assert_eq!(message.author_id, me.author_id);
        assert_eq!(message.author_label(), "Ada");
    }

    #[tokio::test]
    async fn submit_without_open_chatroom_is_rejected() {
        let session = session(Arc::new(StaticIdentity(SessionIdentity::generate(None))));
        let err = session.submit("hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn submit_without_identity_is_rejected() {
        let mut session = session(Arc::new(SessionSlot::new()));
        let room = session.store().create("Team A").await.unwrap();
        session.open_chatroom(room);

        let err = session.handle(Intent::Submit("hi".into())).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoIdentity);
    }

    #[tokio::test]
    async fn opening_another_chatroom_closes_the_previous_view() {
        let mut session = session(Arc::new(StaticIdentity(SessionIdentity::generate(None))));
        let first = session.store().create("one").await.unwrap();
        let second = session.store().create("two").await.unwrap();

        let old = session.open_chatroom(first).watch();
        session.open_chatroom(second);

        assert_eq!(*old.borrow(), ViewState::Closed);
        assert_eq!(session.view().unwrap().chatroom(), second);

        session.close();
        assert!(session.view().is_none());
    }
}
