//! # murmur-client
//!
//! Client side of Murmur chatroom sync.
//!
//! - [`SyncChannel`] streams full chatroom snapshots from the store
//! - [`MessageSubmitter`] appends messages with bounded retry
//! - [`projector`] turns each snapshot into an ordered, deduplicated transcript
//! - [`ChatroomView`] and [`ChatroomDirectory`] keep renderer-facing state
//!   current, and [`ChatSession`] routes renderer intents

pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod logging;
pub mod projector;
pub mod retry;
pub mod session;
pub mod submitter;
pub mod sync;
pub mod view;

pub use config::ClientConfig;
pub use directory::ChatroomDirectory;
pub use error::{ClientError, Result};
pub use events::{Intent, IntentOutcome, ViewStatePayload};
pub use logging::init_tracing;
pub use projector::{project, project_detailed, Message, Projection, ProjectionError};
pub use retry::RetryPolicy;
pub use session::ChatSession;
pub use submitter::MessageSubmitter;
pub use sync::SyncChannel;
pub use view::{ChatroomView, Transcript, ViewState};

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use murmur_shared::{AuthorId, ChatroomId, MessageId};
    use murmur_store::{ChatroomStore, MemoryBackend, RawMessage, SqliteBackend};

    use super::*;

    #[tokio::test]
    async fn team_a_first_transcript_shows_prior_message() {
        let store = ChatroomStore::new(MemoryBackend::new());
        let room = store.create("Team A").await.unwrap();
        let msg = RawMessage::new(MessageId::new(), AuthorId::from("a@x.com"), "hi");
        store.append(room, msg).await.unwrap();

        let transcripts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&transcripts);
        let handle = SyncChannel::listen(&store, room, move |doc| {
            sink.lock().unwrap().push(project(&doc));
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let transcripts = transcripts.lock().unwrap();
        let first: Vec<_> = transcripts[0]
            .iter()
            .map(|m| (m.text.as_str(), m.author_id.as_str()))
            .collect();
        assert_eq!(first, vec![("hi", "a@x.com")]);
        handle.close();
    }

    #[tokio::test]
    async fn closed_handle_sees_no_callback_under_concurrent_appends() {
        let store = ChatroomStore::new(MemoryBackend::new());
        let room = store.create("Team A").await.unwrap();

        let calls = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&calls);
        let handle = SyncChannel::listen(&store, room, move |_| *sink.lock().unwrap() += 1)
            .await
            .unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    let msg = RawMessage::new(MessageId::new(), AuthorId::from("w"), format!("{i}"));
                    store.append(room, msg).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(1)).await;
        handle.close();
        let at_close = *calls.lock().unwrap();

        writer.await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*calls.lock().unwrap(), at_close);
    }

    #[tokio::test]
    async fn sqlite_backed_session_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatroomStore::new(SqliteBackend::open_at(&dir.path().join("murmur.db")).unwrap());
        let room: ChatroomId = store.create("Team A").await.unwrap();

        let mut channel = SyncChannel::open(&store, room).await.unwrap();
        assert!(project(&channel.next().await.unwrap()).is_empty());

        let submitter = MessageSubmitter::with_retry(store.clone(), RetryPolicy::disabled());
        let id = submitter.submit(room, AuthorId::from("a@x.com"), "persisted").await.unwrap();

        let transcript = project(&channel.next().await.unwrap());
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].id, Some(id));
        channel.close();
    }
}
