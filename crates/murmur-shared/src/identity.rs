use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;
use crate::types::AuthorId;

/// The identity of the signed-in user, as handed to the core by whatever
/// authentication layer sits above it.
///
/// The author id is the only key. Email and display name are attributes and
/// may change without affecting message authorship.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    pub author_id: AuthorId,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl SessionIdentity {
    /// Create an identity with a freshly generated author id.
    pub fn generate(display_name: Option<String>) -> Self {
        Self {
            author_id: AuthorId::generate(),
            email: None,
            display_name,
        }
    }

    /// Attach an email attribute. Only a minimal shape check is done here;
    /// verification belongs to the authentication layer.
    pub fn with_email(mut self, email: &str) -> Result<Self, IdentityError> {
        let email = email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
                self.email = Some(email.to_string());
                Ok(self)
            }
            _ => Err(IdentityError::InvalidEmail(email.to_string())),
        }
    }

    /// Name shown next to messages: display name, then email, then a short id.
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.author_id.short().to_string())
    }
}

/// Source of the current session identity. The core treats it as opaque.
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<SessionIdentity>;

    fn require(&self) -> Result<SessionIdentity, IdentityError> {
        self.current().ok_or(IdentityError::Missing)
    }
}

/// A fixed identity, e.g. for tests or single-user embeddings.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub SessionIdentity);

impl IdentityProvider for StaticIdentity {
    fn current(&self) -> Option<SessionIdentity> {
        Some(self.0.clone())
    }
}

/// An identity slot that the authentication layer fills on sign-in and
/// clears on sign-out.
#[derive(Debug, Clone, Default)]
pub struct SessionSlot {
    inner: Arc<RwLock<Option<SessionIdentity>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, identity: SessionIdentity) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some(identity);
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = None;
        }
    }
}

impl IdentityProvider for SessionSlot {
    fn current(&self) -> Option<SessionIdentity> {
        self.inner.read().ok().and_then(|guard| guard.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_an_attribute_not_the_key() {
        let identity = SessionIdentity::generate(Some("Ada".into()))
            .with_email("ada@example.com")
            .unwrap();
        assert_eq!(identity.email.as_deref(), Some("ada@example.com"));
        assert_ne!(identity.author_id.as_str(), "ada@example.com");
    }

    #[test]
    fn rejects_malformed_email() {
        let err = SessionIdentity::generate(None).with_email("nope").unwrap_err();
        assert_eq!(err, IdentityError::InvalidEmail("nope".into()));
    }

    #[test]
    fn label_falls_back_in_order() {
        let mut identity = SessionIdentity::generate(Some("Ada".into()));
        assert_eq!(identity.label(), "Ada");
        identity.display_name = None;
        identity.email = Some("ada@example.com".into());
        assert_eq!(identity.label(), "ada@example.com");
        identity.email = None;
        assert_eq!(identity.label(), identity.author_id.short());
    }

    #[test]
    fn session_slot_tracks_sign_in_and_out() {
        let slot = SessionSlot::new();
        assert_eq!(slot.require().unwrap_err(), IdentityError::Missing);

        let identity = SessionIdentity::generate(None);
        slot.sign_in(identity.clone());
        assert_eq!(slot.current(), Some(identity));

        slot.sign_out();
        assert!(slot.current().is_none());
    }
}
