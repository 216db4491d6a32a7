//! Renderer-facing messages: intents coming in, state payloads going out.

use murmur_shared::{ChatroomId, ErrorKind, MessageId};
use serde::{Deserialize, Serialize};

use crate::view::{Transcript, ViewState};

/// User intent emitted by a renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Intent {
    OpenChatroom(ChatroomId),
    Submit(String),
    CreateChatroom(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum IntentOutcome {
    Opened(ChatroomId),
    Submitted(MessageId),
    Created(ChatroomId),
}

/// Serializable snapshot of a [`ViewState`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStatePayload {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Transcript>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ViewState> for ViewStatePayload {
    fn from(state: &ViewState) -> Self {
        let (error_kind, error) = match state {
            ViewState::Error { kind, message, .. } => (Some(*kind), Some(message.clone())),
            _ => (None, None),
        };
        Self {
            status: state.status(),
            transcript: state.transcript().cloned(),
            error_kind,
            error,
        }
    }
}
