use murmur_shared::{ChatroomId, ErrorKind};
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The referenced chatroom does not exist.
    #[error("Chatroom not found: {0}")]
    NotFound(ChatroomId),

    /// The backend could not be reached or refused the request for now.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The request can never succeed as given.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Lock poisoning, task join failures and similar.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Sqlite(e) => match e.sqlite_error_code() {
                Some(rusqlite::ErrorCode::DatabaseBusy)
                | Some(rusqlite::ErrorCode::DatabaseLocked) => ErrorKind::StoreUnavailable,
                _ => ErrorKind::Internal,
            },
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Unavailable(_) => ErrorKind::StoreUnavailable,
            StoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            StoreError::NoDataDir
            | StoreError::Io(_)
            | StoreError::Migration(_)
            | StoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
