use murmur_shared::{ErrorKind, IdentityError};
use murmur_store::StoreError;
use thiserror::Error;

/// Errors surfaced to callers of the client layer.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Rejected before reaching the store.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Store(e) => e.kind(),
            ClientError::Identity(e) => e.kind(),
            ClientError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
