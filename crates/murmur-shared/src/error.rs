use serde::Serialize;
use thiserror::Error;

/// Coarse error classification shared by every layer.
///
/// Concrete error enums (`StoreError`, `ClientError`, `ProjectionError`) map
/// onto one of these so that logs and retry decisions can be made without
/// matching on crate-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient backend failure (network, throttling, locked database).
    StoreUnavailable,
    /// The referenced chatroom does not exist.
    NotFound,
    /// A document entry could not be turned into a transcript message.
    Projection,
    /// The caller supplied a value that can never succeed (blank name, empty text).
    InvalidInput,
    /// No identity is available for the current session.
    NoIdentity,
    /// Anything else; not retryable.
    Internal,
}

impl ErrorKind {
    /// Whether an operation failing with this kind may succeed if repeated
    /// unchanged.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::StoreUnavailable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Projection => "projection",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NoIdentity => "no_identity",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("No identity for the current session")]
    Missing,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
}

impl IdentityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IdentityError::Missing => ErrorKind::NoIdentity,
            IdentityError::InvalidEmail(_) => ErrorKind::InvalidInput,
        }
    }
}
