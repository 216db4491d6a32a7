//! # murmur-store
//!
//! Chatroom document storage for Murmur.
//!
//! A chatroom is one document: a name, a creation time and an append-only
//! embedded list of messages. Backends implement [`DocumentBackend`]
//! (conflict-free append plus full-snapshot subscriptions); the
//! [`ChatroomStore`] wraps one injected backend and is what the client layer
//! talks to. Two backends ship here: an in-process [`MemoryBackend`] and a
//! [`SqliteBackend`] on top of a migrated `rusqlite` [`Database`].

pub mod backend;
pub mod chatrooms;
pub mod database;
pub mod hub;
pub mod memory;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod sqlite;
pub mod store;
pub mod subscription;

mod error;

pub use backend::{system_clock, AnyBackend, DocumentBackend, ServerClock};
pub use database::Database;
pub use error::{Result, StoreError};
pub use hub::SnapshotFeed;
pub use memory::MemoryBackend;
pub use models::*;
pub use sqlite::SqliteBackend;
pub use store::ChatroomStore;
pub use subscription::SubscriptionHandle;
