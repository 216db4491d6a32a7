//! Turns raw chatroom documents into an ordered, deduplicated transcript.
//!
//! Projection is a pure function of one snapshot. Entries that cannot be
//! turned into a [`Message`] are skipped and reported; they never fail the
//! whole transcript.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use murmur_shared::{AuthorId, ErrorKind, MessageId};
use murmur_store::{ChatroomDocument, RawMessage, TimestampError};
use serde::Serialize;
use thiserror::Error;

/// One transcript entry, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    pub author_id: AuthorId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Author display label: the stored name if any, otherwise the id.
    pub fn author_label(&self) -> &str {
        self.author_name.as_deref().unwrap_or(self.author_id.as_str())
    }
}

/// Why a raw entry was left out of the transcript. `index` is its position in
/// the document's message list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("message {index} has no text")]
    MissingText { index: usize },

    #[error("message {index} has no author")]
    MissingAuthor { index: usize },

    #[error("message {index} has no timestamp")]
    MissingTimestamp { index: usize },

    #[error("message {index}: {source}")]
    BadTimestamp {
        index: usize,
        #[source]
        source: TimestampError,
    },
}

impl ProjectionError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Projection
    }

    pub fn index(&self) -> usize {
        match self {
            ProjectionError::MissingText { index }
            | ProjectionError::MissingAuthor { index }
            | ProjectionError::MissingTimestamp { index }
            | ProjectionError::BadTimestamp { index, .. } => *index,
        }
    }
}

/// Full projection result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub messages: Vec<Message>,
    pub skipped: Vec<ProjectionError>,
    /// Entries dropped as repeats of an earlier one.
    pub duplicates: usize,
}

/// Ordered transcript of `doc`. See [`project_detailed`].
pub fn project(doc: &ChatroomDocument) -> Vec<Message> {
    project_detailed(doc).messages
}

/// Normalize, deduplicate and sort the messages of `doc`.
///
/// Messages with an id are deduplicated by id. Messages without one are only
/// dropped when author, timestamp and text all match an earlier entry. The
/// first occurrence in list order wins. The sort is stable, so messages with
/// equal timestamps keep their list order.
pub fn project_detailed(doc: &ChatroomDocument) -> Projection {
    let mut out = Projection::default();
    let mut seen_ids: HashSet<MessageId> = HashSet::new();
    let mut seen_anonymous: HashSet<(AuthorId, DateTime<Utc>, String)> = HashSet::new();

    for (index, raw) in doc.messages.iter().enumerate() {
        let message = match normalize(index, raw) {
            Ok(m) => m,
            Err(e) => {
                out.skipped.push(e);
                continue;
            }
        };

        let fresh = match message.id {
            Some(id) => seen_ids.insert(id),
            None => seen_anonymous.insert((
                message.author_id.clone(),
                message.created_at,
                message.text.clone(),
            )),
        };
        if fresh {
            out.messages.push(message);
        } else {
            out.duplicates += 1;
        }
    }

    out.messages.sort_by_key(|m| m.created_at);
    out
}

fn normalize(index: usize, raw: &RawMessage) -> Result<Message, ProjectionError> {
    let text = raw
        .text
        .clone()
        .ok_or(ProjectionError::MissingText { index })?;
    let author_id = raw
        .author_id
        .clone()
        .ok_or(ProjectionError::MissingAuthor { index })?;
    let created_at = raw
        .created_at
        .as_ref()
        .ok_or(ProjectionError::MissingTimestamp { index })?
        .to_datetime()
        .map_err(|source| ProjectionError::BadTimestamp { index, source })?;

    Ok(Message {
        id: raw.id,
        author_id,
        author_name: raw.author_name.clone(),
        text,
        created_at,
    })
}
