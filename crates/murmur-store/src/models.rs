//! Raw chatroom documents as delivered by a document backend.
//!
//! These mirror the shape a hosted document database hands out: a chatroom
//! document embedding an ordered list of message maps whose fields may be
//! missing or carry timestamps in several encodings. Nothing here is
//! validated; turning a document into a transcript is the projector's job.
//!
//! Decoding is lenient per entry: a message field of the wrong type reads as
//! absent, and a message entry that is not a map reads as an empty message,
//! so one bad entry never costs the rest of the document.

use chrono::{DateTime, Utc};
use murmur_shared::{AuthorId, ChatroomId, MessageId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// A timestamp in one of the encodings backends are known to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Seconds and nanoseconds since the Unix epoch, the document-database
    /// native form.
    Epoch {
        seconds: i64,
        #[serde(rename = "nanoseconds", default)]
        nanos: u32,
    },
    /// Milliseconds since the Unix epoch.
    Millis(i64),
    /// RFC 3339 text.
    Rfc3339(String),
    /// Anything else a writer left in the field.
    Invalid(Value),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("timestamp out of range")]
    OutOfRange,

    #[error("unparseable timestamp {0:?}")]
    Unparseable(String),

    #[error("unrecognized timestamp encoding {0}")]
    Unrecognized(String),
}

impl RawTimestamp {
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        RawTimestamp::Epoch {
            seconds: dt.timestamp(),
            nanos: dt.timestamp_subsec_nanos(),
        }
    }

    pub fn to_datetime(&self) -> Result<DateTime<Utc>, TimestampError> {
        match self {
            RawTimestamp::Epoch { seconds, nanos } => {
                if *nanos >= 1_000_000_000 {
                    return Err(TimestampError::OutOfRange);
                }
                DateTime::from_timestamp(*seconds, *nanos).ok_or(TimestampError::OutOfRange)
            }
            RawTimestamp::Millis(ms) => {
                DateTime::from_timestamp_millis(*ms).ok_or(TimestampError::OutOfRange)
            }
            RawTimestamp::Rfc3339(text) => DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| TimestampError::Unparseable(text.clone())),
            RawTimestamp::Invalid(value) => Err(TimestampError::Unrecognized(value.to_string())),
        }
    }
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(dt)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One entry of a chatroom's embedded message list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    /// Present for everything written by this crate; older or foreign
    /// writers may omit it.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    #[serde(default, deserialize_with = "lenient")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub author_id: Option<AuthorId>,
    /// Display name of the author at the time of writing.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    /// Provisional when submitted, replaced by the backend clock on commit.
    #[serde(default)]
    pub created_at: Option<RawTimestamp>,
}

impl RawMessage {
    pub fn new(id: MessageId, author_id: AuthorId, text: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            text: Some(text.into()),
            author_id: Some(author_id),
            author_name: None,
            created_at: Some(RawTimestamp::from_datetime(Utc::now())),
        }
    }

    pub fn with_author_name(mut self, name: Option<String>) -> Self {
        self.author_name = name;
        self
    }

    /// Copy of this message stamped with the commit time.
    pub(crate) fn committed(&self, created_at: RawTimestamp) -> Self {
        Self {
            created_at: Some(created_at),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Chatroom
// ---------------------------------------------------------------------------

/// Full state of one chatroom, as pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatroomDocument {
    pub id: ChatroomId,
    pub name: String,
    pub created_at: RawTimestamp,
    #[serde(default, deserialize_with = "lenient_messages")]
    pub messages: Vec<RawMessage>,
}

impl ChatroomDocument {
    pub fn contains_message(&self, id: MessageId) -> bool {
        self.messages.iter().any(|m| m.id == Some(id))
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_messages<'de, D>(deserializer: D) -> Result<Vec<RawMessage>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .map(|entry| serde_json::from_value(entry).unwrap_or_default())
        .collect())
}

/// Lightweight listing entry used by the chatroom directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatroomSummary {
    pub id: ChatroomId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
}

/// Result of a successful append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The message was added to the end of the list.
    Appended,
    /// A message with the same id was already present; nothing changed.
    Duplicate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_document_database_shape() {
        let json = r#"{
            "id": "6f1c1d3e-2a8b-4f5e-9a55-0c6a1d1b2c3d",
            "name": "Team A",
            "createdAt": { "seconds": 1700000000, "nanoseconds": 5 },
            "messages": [
                { "text": "hi", "authorId": "a@x.com", "createdAt": { "seconds": 1700000001, "nanoseconds": 0 } },
                { "text": "late", "authorId": "b@x.com", "createdAt": 1700000002000 },
                { "text": "iso", "authorId": "c@x.com", "createdAt": "2023-11-14T22:13:23Z" },
                { "text": "pending", "authorId": "d@x.com" }
            ]
        }"#;
        let doc: ChatroomDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.name, "Team A");
        assert_eq!(doc.messages.len(), 4);
        assert_eq!(
            doc.messages[0].created_at,
            Some(RawTimestamp::Epoch { seconds: 1_700_000_001, nanos: 0 })
        );
        assert_eq!(doc.messages[1].created_at, Some(RawTimestamp::Millis(1_700_000_002_000)));
        assert!(matches!(doc.messages[2].created_at, Some(RawTimestamp::Rfc3339(_))));
        assert!(doc.messages[3].created_at.is_none());
        assert!(doc.messages[0].id.is_none());
    }

    #[test]
    fn malformed_entries_do_not_poison_the_document() {
        let json = r#"{
            "id": "6f1c1d3e-2a8b-4f5e-9a55-0c6a1d1b2c3d",
            "name": "Team A",
            "createdAt": 1700000000000,
            "messages": [
                { "text": "ok", "authorId": "a@x.com", "createdAt": 1700000001000 },
                { "text": 42, "authorId": "e@x.com", "createdAt": true },
                7,
                { "id": "not-a-uuid", "text": "kept", "authorId": ["x"], "createdAt": 1.5 }
            ]
        }"#;
        let doc: ChatroomDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.messages.len(), 4);
        assert_eq!(doc.messages[0].text.as_deref(), Some("ok"));

        let wrong_types = &doc.messages[1];
        assert!(wrong_types.text.is_none());
        assert_eq!(wrong_types.author_id, Some(AuthorId::from("e@x.com")));
        assert_eq!(wrong_types.created_at, Some(RawTimestamp::Invalid(Value::Bool(true))));
        assert!(matches!(
            wrong_types.created_at.as_ref().unwrap().to_datetime(),
            Err(TimestampError::Unrecognized(_))
        ));

        assert_eq!(doc.messages[2], RawMessage::default());

        let partial = &doc.messages[3];
        assert!(partial.id.is_none());
        assert!(partial.author_id.is_none());
        assert_eq!(partial.text.as_deref(), Some("kept"));
        assert!(partial.created_at.as_ref().unwrap().to_datetime().is_err());
    }

    #[test]
    fn all_encodings_normalize_to_the_same_instant() {
        let dt = DateTime::parse_from_rfc3339("2024-03-01T12:00:00.250Z")
            .unwrap()
            .with_timezone(&Utc);
        let encodings = [
            RawTimestamp::from_datetime(dt),
            RawTimestamp::Millis(dt.timestamp_millis()),
            RawTimestamp::Rfc3339(dt.to_rfc3339()),
        ];
        for raw in encodings {
            assert_eq!(raw.to_datetime().unwrap(), dt);
        }
    }

    #[test]
    fn rejects_bad_timestamps() {
        assert_eq!(
            RawTimestamp::Epoch { seconds: 0, nanos: 2_000_000_000 }.to_datetime(),
            Err(TimestampError::OutOfRange)
        );
        assert!(matches!(
            RawTimestamp::Rfc3339("yesterday".into()).to_datetime(),
            Err(TimestampError::Unparseable(_))
        ));
    }
}
