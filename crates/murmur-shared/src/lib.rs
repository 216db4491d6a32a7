//! # murmur-shared
//!
//! Identifiers, constants, error kinds and the identity seam shared by the
//! store and client crates.

pub mod constants;
pub mod error;
pub mod identity;
pub mod types;

pub use error::{ErrorKind, IdentityError};
pub use identity::{IdentityProvider, SessionIdentity, SessionSlot, StaticIdentity};
pub use types::{AuthorId, ChatroomId, MessageId};
