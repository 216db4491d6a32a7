//! Message submission: build a message, append it, retry transient failures.
//!
//! Submission never waits for a snapshot. The committed message shows up
//! through the sync channel like any other change.

use murmur_shared::constants::MAX_MESSAGE_LEN;
use murmur_shared::{AuthorId, ChatroomId, IdentityProvider, MessageId};
use murmur_store::{AppendOutcome, ChatroomStore, DocumentBackend, RawMessage};
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::retry::RetryPolicy;

pub struct MessageSubmitter<B> {
    store: ChatroomStore<B>,
    retry: RetryPolicy,
}

impl<B> Clone for MessageSubmitter<B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<B: DocumentBackend> MessageSubmitter<B> {
    pub fn new(store: ChatroomStore<B>) -> Self {
        Self::with_retry(store, RetryPolicy::default())
    }

    pub fn with_retry(store: ChatroomStore<B>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Append `text` by `author` to `chatroom` and return the new message id.
    pub async fn submit(&self, chatroom: ChatroomId, author: AuthorId, text: &str) -> Result<MessageId> {
        self.send(chatroom, author, None, text).await
    }

    /// Like [`submit`](Self::submit), with the author taken from the current
    /// session identity.
    pub async fn submit_as(
        &self,
        identity: &dyn IdentityProvider,
        chatroom: ChatroomId,
        text: &str,
    ) -> Result<MessageId> {
        let who = identity.require().map_err(|e| {
            warn!(chatroom = %chatroom, kind = %e.kind(), "Submit without identity");
            e
        })?;
        self.send(chatroom, who.author_id.clone(), Some(who.label()), text)
            .await
    }

    async fn send(
        &self,
        chatroom: ChatroomId,
        author: AuthorId,
        author_name: Option<String>,
        text: &str,
    ) -> Result<MessageId> {
        validate_text(text)?;

        // The id is fixed before the first attempt so a retry after a lost
        // acknowledgement lands on the same entry.
        let id = MessageId::new();
        let message = RawMessage::new(id, author, text).with_author_name(author_name);

        let store = &self.store;
        let outcome = self
            .retry
            .run("append", move |attempt| {
                if attempt > 1 {
                    debug!(chatroom = %chatroom, message = %id, attempt, "Re-sending message");
                }
                store.append(chatroom, message.clone())
            })
            .await
            .map_err(|e| {
                warn!(chatroom = %chatroom, message = %id, kind = %e.kind(), error = %e, "Submit failed");
                ClientError::from(e)
            })?;

        if outcome == AppendOutcome::Duplicate {
            debug!(chatroom = %chatroom, message = %id, "Earlier attempt had already committed");
        }
        info!(chatroom = %chatroom, message = %id, "Message submitted");
        Ok(id)
    }
}

fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(ClientError::InvalidInput("message text is blank".into()));
    }
    if text.len() > MAX_MESSAGE_LEN {
        return Err(ClientError::InvalidInput(format!(
            "message text is {} bytes, limit is {MAX_MESSAGE_LEN}",
            text.len()
        )));
    }
    Ok(())
}
